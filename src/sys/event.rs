//! Interfaces of the collaborators the autohide core consumes: where the
//! pointer is, where the output is, and what the compositor just did.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::hyprland::IpcError;
use crate::common::collections::HashMap;
use crate::model::MonitorGeometry;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct CursorPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Error)]
pub enum PointerError {
    #[error("pointer source unreachable: {0}")]
    Ipc(#[from] IpcError),
    #[error("malformed cursor reply {0:?}")]
    Malformed(String),
}

/// Global pointer coordinates. Failures are expected to be transient.
pub trait PointerSource: Send + 'static {
    fn cursor_position(&self) -> Result<CursorPosition, PointerError>;
}

impl<P: PointerSource + Sync> PointerSource for Arc<P> {
    fn cursor_position(&self) -> Result<CursorPosition, PointerError> {
        (**self).cursor_position()
    }
}

/// Parses an `"X, Y"` (or `"X,Y"`) reply.
pub fn parse_cursor_reply(reply: &str) -> Result<CursorPosition, PointerError> {
    let malformed = || PointerError::Malformed(reply.to_owned());
    let (x, y) = reply.trim().split_once(',').ok_or_else(malformed)?;
    let x = x.trim().parse().map_err(|_| malformed())?;
    let y = y.trim().parse().map_err(|_| malformed())?;
    Ok(CursorPosition { x, y })
}

/// Geometry of an output, queried on the dispatch thread only.
pub trait GeometryProvider {
    /// `None` when the output does not exist (or no output at all when
    /// `output` is `None`).
    fn output_geometry(&self, output: Option<&str>) -> Option<MonitorGeometry>;
}

/// One line from the compositor's event stream, `NAME>>DATA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositorEvent<'a> {
    pub name: &'a str,
    pub data: &'a str,
}

impl<'a> CompositorEvent<'a> {
    /// The name is everything before the first `>`; lines without a
    /// separator are a bare name with no data.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        match line.find('>') {
            None => Self { name: line, data: "" },
            Some(pos) => {
                let rest = &line[pos..];
                let data = rest.strip_prefix(">>").unwrap_or(&rest[1..]);
                Self { name: &line[..pos], data }
            }
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&CompositorEvent<'_>) + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscription mechanism keyed by event name.
///
/// Subscribing must work before the underlying event source is reachable,
/// and unsubscribing after it is gone.
pub trait EventNotifier: Send + Sync {
    fn subscribe(&self, events: &[&str], handler: EventHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

struct Subscription {
    events: Vec<String>,
    handler: EventHandler,
}

/// Name-keyed handler table shared by notifier implementations.
#[derive(Default)]
pub struct Subscriptions {
    next_id: AtomicU64,
    entries: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl Subscriptions {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, events: &[&str], handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let events: Vec<String> = events.iter().map(|e| e.to_string()).collect();
        debug!(?id, ?events, "subscribing");
        self.entries.lock().insert(id, Subscription { events, handler });
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.entries.lock().remove(&id).is_some();
        debug!(?id, removed, "unsubscribing");
        removed
    }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }

    /// Delivers `line` to every handler subscribed to its name. Handlers run
    /// outside the lock so they may subscribe or unsubscribe.
    pub fn publish(&self, line: &str) -> usize {
        let event = CompositorEvent::parse(line);
        let handlers: Vec<EventHandler> = {
            let guard = self.entries.lock();
            guard
                .values()
                .filter(|s| s.events.iter().any(|e| e == event.name || e == "*"))
                .map(|s| s.handler.clone())
                .collect()
        };
        trace!(name = event.name, handlers = handlers.len(), "event");
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }
}

impl EventNotifier for Subscriptions {
    fn subscribe(&self, events: &[&str], handler: EventHandler) -> SubscriptionId {
        self.insert(events, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) { self.remove(id); }
}
