//! The dispatch thread. It owns every externally visible side effect:
//! writing the geometry cache and applying visibility to the render sink.
//! Other threads only queue [`Request`]s for it.

use std::iter;
use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use super::autohide::Shared;
use super::sink::RenderSink;
use crate::actor;
use crate::model::VisibilityState;
use crate::sys::event::GeometryProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A pending transition committed; apply whatever the state is now.
    Render,
    /// A layout change happened; force the panel visible.
    Override { event: String },
    /// Outputs were added or removed; re-resolve the owning output.
    OutputsChanged,
    Shutdown,
}

pub type Sender = actor::Sender<Request>;
pub type Receiver = actor::Receiver<Request>;

pub struct Panel<R, G> {
    rx: Receiver,
    shared: Arc<Shared>,
    sink: R,
    geometry: G,
    output: Option<String>,
    last_applied: Option<VisibilityState>,
}

impl<R: RenderSink, G: GeometryProvider> Panel<R, G> {
    pub fn new(
        rx: Receiver,
        shared: Arc<Shared>,
        sink: R,
        geometry: G,
        output: Option<String>,
    ) -> Self {
        Self {
            rx,
            shared,
            sink,
            geometry,
            output,
            last_applied: None,
        }
    }

    pub fn sink(&self) -> &R { &self.sink }

    /// Resolves the owning output and applies the initial state, then serves
    /// requests until shutdown or until every sender is gone. Returns the sink.
    pub fn run(mut self) -> R {
        self.refresh_geometry();
        self.render();

        while let Some((span, request)) = self.rx.recv() {
            let _guard = span.enter();
            if self.handle(request).is_break() {
                break;
            }
        }
        debug!("dispatch loop finished");
        self.sink
    }

    /// Handles `first` plus everything already queued behind it, rendering at
    /// most once for the whole batch.
    #[instrument(name = "panel::handle", skip(self))]
    pub fn handle(&mut self, first: Request) -> ControlFlow<()> {
        let queued = iter::from_fn(|| self.rx.try_recv().map(|(_, request)| request));
        let batch: Vec<Request> = iter::once(first).chain(queued).collect();

        let mut render = false;
        let mut flow = ControlFlow::Continue(());
        for request in batch {
            match request {
                Request::Render => render = true,
                Request::Override { event } => {
                    trace!(%event, "layout changed, forcing panel visible");
                    self.shared.state.store(VisibilityState::Visible);
                    render = true;
                }
                Request::OutputsChanged => self.refresh_geometry(),
                Request::Shutdown => {
                    flow = ControlFlow::Break(());
                    break;
                }
            }
        }

        if render {
            self.render();
        }
        flow
    }

    /// Re-reads the current state, never a value captured at request time.
    pub fn render(&mut self) {
        let state = self.shared.state.load();
        if self.last_applied != Some(state) {
            debug!(%state, "applying visibility");
        }
        self.last_applied = Some(state);
        self.sink.set_visible(state.panel_visible(), state);
    }

    pub fn refresh_geometry(&mut self) {
        match self.geometry.output_geometry(self.output.as_deref()) {
            Some(geometry) => {
                info!(
                    output = %geometry.label,
                    x = geometry.x,
                    y = geometry.y,
                    width = geometry.width,
                    height = geometry.height,
                    "tracking output"
                );
                // Without a configured name, stay on the output picked at
                // startup even if focus moves before a hot-plug.
                if self.output.is_none() {
                    self.output = Some(geometry.label.clone());
                }
                self.shared.geometry.write(geometry);
            }
            None => {
                warn!(output = ?self.output, "owning output unavailable");
                self.shared.geometry.invalidate();
            }
        }
    }
}
