//! Background pointer sampling.
//!
//! Polls the pointer source once per check interval, classifies the pointer
//! against the cached output geometry and feeds the result to the visibility
//! machine. It never touches the render sink; committed transitions are
//! handed to the dispatch thread as [`Request::Render`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, trace};

use super::autohide::Shared;
use super::panel::{self, Request};
use crate::common::config::Settings;
use crate::model::{Step, VisibilityMachine, VisibilityState};
use crate::sys::event::PointerSource;

/// What a single sample did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    PointerUnavailable,
    NoGeometry,
    /// The pointer is on an output this panel does not own.
    OffOutput,
    Observed(Step),
    /// Another writer changed the state while the sample was evaluated; the
    /// sample's transition was dropped.
    Superseded(VisibilityState),
}

pub struct Sampler<P> {
    pointer: P,
    shared: Arc<Shared>,
    machine: VisibilityMachine,
    interval: Duration,
    dispatch: panel::Sender,
}

impl<P: PointerSource> Sampler<P> {
    pub fn new(
        settings: &Settings,
        pointer: P,
        shared: Arc<Shared>,
        dispatch: panel::Sender,
    ) -> Self {
        Self {
            pointer,
            shared,
            machine: VisibilityMachine::new(settings, Instant::now()),
            interval: settings.check_interval(),
            dispatch,
        }
    }

    pub fn machine(&self) -> &VisibilityMachine { &self.machine }

    /// Takes one sample as of `now`.
    pub fn tick(&mut self, now: Instant) -> SampleOutcome {
        // Any write to the slot after this load makes the sample stale.
        let current = self.shared.state.load();

        let position = match self.pointer.cursor_position() {
            Ok(position) => position,
            Err(err) => {
                debug!(%err, "failed to get cursor position");
                return SampleOutcome::PointerUnavailable;
            }
        };

        let Some(geometry) = self.shared.geometry.read() else {
            debug!("no output geometry available");
            return SampleOutcome::NoGeometry;
        };

        let Some(relative_y) = geometry.relative_y(position.x, position.y) else {
            debug!(
                x = position.x,
                y = position.y,
                output = %geometry.label,
                "pointer not on this output"
            );
            return SampleOutcome::OffOutput;
        };

        let step = self.machine.observe(current, relative_y, now);
        trace!(
            x = position.x,
            y = position.y,
            relative_y,
            zone = %step.zone,
            %current,
            "pointer sample"
        );
        if step.next == current {
            return SampleOutcome::Observed(step);
        }

        if let Err(actual) = self.shared.state.compare_exchange(current, step.next) {
            debug!(%current, next = %step.next, %actual, "state changed during sample, dropping");
            return SampleOutcome::Superseded(actual);
        }

        if step.committed && self.dispatch.send(Request::Render).is_err() {
            debug!("dispatch thread gone, render request dropped");
        }
        SampleOutcome::Observed(step)
    }

    /// Samples until `exit` is set or `stop` disconnects. The sleep between
    /// samples ends early on stop, so shutdown waits at most one interval.
    pub fn run(mut self, exit: Arc<AtomicBool>, stop: crossbeam_channel::Receiver<()>) {
        debug!(interval = ?self.interval, "sampler started");
        while !exit.load(Ordering::Acquire) {
            self.tick(Instant::now());
            match stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("sampler stopped");
    }
}
