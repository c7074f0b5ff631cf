//! End-to-end runs of the controller: real sampler and dispatch threads,
//! in-memory pointer, outputs and notifier.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use panel_autohide::actor::autohide::{Autohide, Shared};
use panel_autohide::actor::channel;
use panel_autohide::actor::panel::{self, Panel, Request};
use panel_autohide::actor::sink::RenderSink;
use panel_autohide::common::config::Settings;
use panel_autohide::model::{MonitorGeometry, VisibilityState};
use panel_autohide::sys::event::{
    CursorPosition, GeometryProvider, PointerError, PointerSource, Subscriptions,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// `None` makes every query fail.
#[derive(Clone, Default)]
struct Pointer(Arc<Mutex<Option<(i32, i32)>>>);

impl Pointer {
    fn set(&self, pos: Option<(i32, i32)>) { *self.0.lock() = pos; }
}

impl PointerSource for Pointer {
    fn cursor_position(&self) -> Result<CursorPosition, PointerError> {
        match *self.0.lock() {
            Some((x, y)) => Ok(CursorPosition { x, y }),
            None => Err(PointerError::Malformed("unavailable".into())),
        }
    }
}

#[derive(Clone)]
struct Outputs(Arc<Mutex<Option<MonitorGeometry>>>);

impl GeometryProvider for Outputs {
    fn output_geometry(&self, _output: Option<&str>) -> Option<MonitorGeometry> {
        self.0.lock().clone()
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(bool, VisibilityState)>>>);

impl RenderSink for Recorder {
    fn set_visible(&mut self, visible: bool, state: VisibilityState) {
        self.0.lock().push((visible, state));
    }
}

impl Recorder {
    fn calls(&self) -> Vec<(bool, VisibilityState)> { self.0.lock().clone() }

    fn last(&self) -> Option<(bool, VisibilityState)> { self.0.lock().last().copied() }
}

struct Rig {
    pointer: Pointer,
    outputs: Outputs,
    recorder: Recorder,
    notifier: Arc<Subscriptions>,
    tx: panel::Sender,
    autohide: Autohide,
    panel: Option<JoinHandle<Recorder>>,
}

impl Rig {
    fn start(settings: Settings, pos: Option<(i32, i32)>) -> Self {
        let pointer = Pointer::default();
        pointer.set(pos);
        let outputs = Outputs(Arc::new(Mutex::new(Some(MonitorGeometry::new(
            "DP-1", 0, 0, 1920, 1080,
        )))));
        let recorder = Recorder::default();
        let notifier = Arc::new(Subscriptions::new());
        let (tx, rx) = channel();

        let autohide =
            Autohide::start(settings, pointer.clone(), notifier.clone(), tx.clone()).unwrap();
        let panel = {
            let panel = Panel::new(
                rx,
                autohide.shared(),
                recorder.clone(),
                outputs.clone(),
                Some("DP-1".into()),
            );
            thread::spawn(move || panel.run())
        };

        let rig = Self {
            pointer,
            outputs,
            recorder,
            notifier,
            tx,
            autohide,
            panel: Some(panel),
        };
        assert!(wait_until(|| rig.shared().geometry.read().is_some()));
        rig
    }

    fn shared(&self) -> Arc<Shared> { self.autohide.shared() }

    fn state(&self) -> VisibilityState { self.autohide.state() }

    fn wait_for_state(&self, state: VisibilityState) -> bool { wait_until(|| self.state() == state) }

    fn shutdown(mut self) -> Vec<(bool, VisibilityState)> {
        self.tx.send(Request::Shutdown).unwrap();
        let recorder = self.panel.take().unwrap().join().unwrap();
        self.autohide.stop();
        assert!(self.notifier.is_empty());
        recorder.calls()
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn fast() -> Settings {
    Settings {
        check_interval: 5,
        delay_hide: 40,
        ..Settings::default()
    }
}

#[test_log::test]
fn pointer_away_hides_then_top_edge_shows() {
    let rig = Rig::start(fast(), Some((500, 600)));
    assert!(rig.wait_for_state(VisibilityState::Hidden));
    assert!(wait_until(|| rig.recorder.last() == Some((false, VisibilityState::Hidden))));

    rig.pointer.set(Some((500, 0)));
    assert!(rig.wait_for_state(VisibilityState::Visible));
    assert!(wait_until(|| rig.recorder.last() == Some((true, VisibilityState::Visible))));

    let calls = rig.shutdown();
    // the initial render may already see the hide pending
    assert_eq!(calls.first().map(|(visible, _)| *visible), Some(true));
}

#[test_log::test]
fn override_cancels_pending_hide() {
    let rig = Rig::start(
        Settings { delay_hide: 60_000, ..fast() },
        Some((500, 600)),
    );
    assert!(rig.wait_for_state(VisibilityState::PendingHidden));

    // Freeze the sampler so nothing re-arms the hide.
    rig.pointer.set(None);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(rig.notifier.publish("workspacev2>>3,web"), 1);

    assert!(rig.wait_for_state(VisibilityState::Visible));
    assert!(wait_until(|| rig.recorder.calls().len() >= 2));
    let calls = rig.shutdown();
    assert!(calls.iter().all(|(visible, _)| *visible));
}

#[test_log::test]
fn override_while_hidden_shows_immediately() {
    let rig = Rig::start(fast(), Some((500, 600)));
    assert!(rig.wait_for_state(VisibilityState::Hidden));
    rig.pointer.set(None);
    thread::sleep(Duration::from_millis(20));

    rig.notifier.publish("focusedmonv2>>HDMI-A-1,2");
    assert!(rig.wait_for_state(VisibilityState::Visible));
    assert!(wait_until(|| rig.recorder.last() == Some((true, VisibilityState::Visible))));
    rig.shutdown();
}

#[test_log::test]
fn repeated_overrides_while_visible_stay_visible() {
    let rig = Rig::start(fast(), None);
    rig.notifier.publish("workspacev2>>1,1");
    rig.notifier.publish("workspacev2>>1,1");
    assert!(wait_until(|| rig.recorder.calls().len() >= 2));
    assert_eq!(rig.state(), VisibilityState::Visible);

    let calls = rig.shutdown();
    assert!(calls.iter().all(|call| *call == (true, VisibilityState::Visible)));
    assert!(calls.len() <= 3);
}

#[test_log::test]
fn malformed_override_is_ignored() {
    let rig = Rig::start(fast(), Some((500, 600)));
    assert!(rig.wait_for_state(VisibilityState::Hidden));
    rig.pointer.set(None);
    thread::sleep(Duration::from_millis(20));
    let rendered = rig.recorder.calls().len();

    rig.notifier.publish("workspacev2>>3");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(rig.state(), VisibilityState::Hidden);
    assert_eq!(rig.recorder.calls().len(), rendered);
    rig.shutdown();
}

#[test_log::test]
fn unavailable_pointer_freezes_the_panel() {
    let rig = Rig::start(fast(), None);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.state(), VisibilityState::Visible);
    assert_eq!(rig.shutdown(), vec![(true, VisibilityState::Visible)]);
}

#[test_log::test]
fn pointer_on_another_output_changes_nothing() {
    let rig = Rig::start(fast(), Some((2500, 600)));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.state(), VisibilityState::Visible);
    rig.shutdown();
}

#[test_log::test]
fn removed_output_stops_decisions_until_it_returns() {
    let rig = Rig::start(fast(), None);
    *rig.outputs.0.lock() = None;
    rig.notifier.publish("monitorremovedv2>>1,DP-1,Dell");
    assert!(wait_until(|| rig.shared().geometry.read().is_none()));

    rig.pointer.set(Some((500, 600)));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.state(), VisibilityState::Visible);

    *rig.outputs.0.lock() = Some(MonitorGeometry::new("DP-1", 0, 0, 1920, 1080));
    rig.notifier.publish("monitoraddedv2>>1,DP-1,Dell");
    assert!(rig.wait_for_state(VisibilityState::Hidden));
    rig.shutdown();
}

#[test]
fn stop_is_prompt_with_long_interval() {
    let rig = Rig::start(
        Settings { check_interval: 30_000, ..Settings::default() },
        None,
    );
    let start = Instant::now();
    rig.shutdown();
    assert!(start.elapsed() < Duration::from_secs(5));
}
