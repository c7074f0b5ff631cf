use std::io;
use std::thread::{self, JoinHandle};

use nix::sys::signal::{SigSet, Signal};
use tracing::{info, warn};

pub const SHUTDOWN_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

/// Blocks the shutdown signals on the calling thread. Must run before any
/// other thread is spawned so every thread inherits the mask.
pub fn block_shutdown_signals() -> nix::Result<SigSet> {
    let mut set = SigSet::empty();
    for signal in SHUTDOWN_SIGNALS {
        set.add(signal);
    }
    set.thread_block()?;
    Ok(set)
}

/// Waits for one of `set` on a dedicated thread and hands it to `on_signal`.
pub fn forward_shutdown(
    set: SigSet,
    on_signal: impl FnOnce(Signal) + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("signals".into()).spawn(move || match set.wait() {
        Ok(signal) => {
            info!(%signal, "shutting down");
            on_signal(signal);
        }
        Err(err) => warn!(%err, "waiting for signals failed"),
    })
}
