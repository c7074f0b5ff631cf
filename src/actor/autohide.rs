//! The autohide controller: owns the sampler thread and the notifier
//! subscription for one panel.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::panel::{self, Request};
use super::sampler::Sampler;
use crate::common::config::Settings;
use crate::model::{GeometryCache, StateSlot, VisibilityState};
use crate::sys::event::{
    CompositorEvent, EventHandler, EventNotifier, PointerSource, SubscriptionId,
};

/// Layout changes that force the panel visible.
pub const OVERRIDE_EVENTS: [&str; 2] = ["workspacev2", "focusedmonv2"];

/// Output hot-plug notifications.
pub const OUTPUT_EVENTS: [&str; 4] =
    ["monitoraddedv2", "monitorremovedv2", "monitoradded", "monitorremoved"];

#[derive(Debug, Error)]
pub enum AutohideError {
    #[error("failed to start sampler thread: {0}")]
    SpawnSampler(#[source] io::Error),
}

/// State shared between the sampler and the dispatch thread.
#[derive(Debug, Default)]
pub struct Shared {
    pub state: StateSlot,
    pub geometry: GeometryCache,
}

struct SamplerHandle {
    exit: Arc<AtomicBool>,
    stop_tx: crossbeam_channel::Sender<()>,
    thread: JoinHandle<()>,
}

pub struct Autohide {
    shared: Arc<Shared>,
    settings: Settings,
    notifier: Arc<dyn EventNotifier>,
    subscription: Option<SubscriptionId>,
    sampler: Option<SamplerHandle>,
}

impl Autohide {
    /// Subscribes to layout events and starts sampling. Only a failure to
    /// spawn the sampler thread is an error; bad settings are clamped.
    pub fn start<P: PointerSource>(
        settings: Settings,
        pointer: P,
        notifier: Arc<dyn EventNotifier>,
        dispatch: panel::Sender,
    ) -> Result<Self, AutohideError> {
        let settings = settings.validated();
        info!(
            hidden_y = settings.threshold_hidden_y,
            visible_y = settings.threshold_visible_y,
            delay_show_ms = settings.delay_show,
            delay_hide_ms = settings.delay_hide,
            interval_ms = settings.check_interval,
            checks = settings.consecutive_checks_before_visible,
            "autohide initialized"
        );

        let shared = Arc::new(Shared::default());

        let events: Vec<&str> = OVERRIDE_EVENTS.iter().chain(&OUTPUT_EVENTS).copied().collect();
        let subscription = notifier.subscribe(&events, event_handler(dispatch.clone()));

        let exit = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let sampler = Sampler::new(&settings, pointer, shared.clone(), dispatch);
        let spawned = {
            let exit = exit.clone();
            thread::Builder::new()
                .name("autohide-sampler".into())
                .spawn(move || sampler.run(exit, stop_rx))
        };
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                notifier.unsubscribe(subscription);
                return Err(AutohideError::SpawnSampler(err));
            }
        };
        debug!("sampler thread started");

        Ok(Self {
            shared,
            settings,
            notifier,
            subscription: Some(subscription),
            sampler: Some(SamplerHandle { exit, stop_tx, thread }),
        })
    }

    pub fn shared(&self) -> Arc<Shared> { self.shared.clone() }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn state(&self) -> VisibilityState { self.shared.state.load() }

    pub fn is_running(&self) -> bool { self.sampler.is_some() }

    /// Stops and joins the sampler, then drops the notifier subscription.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        if let Some(SamplerHandle { exit, stop_tx, thread }) = self.sampler.take() {
            debug!("stopping sampler thread");
            exit.store(true, Ordering::Release);
            drop(stop_tx);
            if thread.join().is_err() {
                warn!("sampler thread panicked");
            }
        }
        if let Some(id) = self.subscription.take() {
            self.notifier.unsubscribe(id);
        }
    }
}

impl Drop for Autohide {
    fn drop(&mut self) { self.stop(); }
}

/// Maps a compositor event to the dispatch request it calls for, if any.
pub fn request_for(event: &CompositorEvent<'_>) -> Option<Request> {
    if OVERRIDE_EVENTS.contains(&event.name) {
        // both carry "a,b" payloads
        if !event.data.contains(',') {
            debug!(name = event.name, data = event.data, "ignoring malformed event");
            return None;
        }
        return Some(Request::Override { event: event.name.to_owned() });
    }
    if OUTPUT_EVENTS.contains(&event.name) {
        return Some(Request::OutputsChanged);
    }
    None
}

fn event_handler(dispatch: panel::Sender) -> EventHandler {
    Arc::new(move |event: &CompositorEvent<'_>| {
        if let Some(request) = request_for(event) {
            if dispatch.send(request).is_err() {
                debug!("dispatch thread gone, event dropped");
            }
        }
    })
}
