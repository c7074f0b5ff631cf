//! Threads of the autohide runtime and the channel they talk over.
//!
//! Every message carries the [`Span`] that was current when it was sent, so
//! the receiving side can log inside the sender's context.

use std::time::Duration;

pub use crossbeam_channel::{RecvTimeoutError, SendError};
use tracing::Span;

pub mod autohide;
pub mod panel;
pub mod sampler;
pub mod sink;

pub struct Sender<E>(crossbeam_channel::Sender<(Span, E)>);

impl<E> Clone for Sender<E> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<E> Sender<E> {
    pub fn send(&self, event: E) -> Result<(), SendError<E>> {
        self.0.send((Span::current(), event)).map_err(|SendError((_, event))| SendError(event))
    }
}

pub struct Receiver<E>(crossbeam_channel::Receiver<(Span, E)>);

impl<E> Receiver<E> {
    /// Blocks until a message arrives. `None` once every sender is gone.
    pub fn recv(&self) -> Option<(Span, E)> { self.0.recv().ok() }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<(Span, E), RecvTimeoutError> {
        self.0.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<(Span, E)> { self.0.try_recv().ok() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

pub fn channel<E>() -> (Sender<E>, Receiver<E>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (Sender(tx), Receiver(rx))
}
