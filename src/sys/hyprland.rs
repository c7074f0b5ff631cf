//! Hyprland socket IPC: the request socket answers one command per
//! connection, the event socket streams `NAME>>DATA` lines.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::event::{
    CursorPosition, EventHandler, EventNotifier, GeometryProvider, PointerError, PointerSource,
    SubscriptionId, Subscriptions, parse_cursor_reply,
};
use crate::model::MonitorGeometry;
use crate::model::server::{MonitorData, select_monitor};

const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);
const EVENT_POLL: Duration = Duration::from_millis(250);
const RECONNECT_MIN: Duration = Duration::from_millis(100);
const RECONNECT_MAX: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("HYPRLAND_INSTANCE_SIGNATURE is not set; is Hyprland running?")]
    NoInstance,
    #[error("socket {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("empty reply to {0:?}")]
    EmptyReply(String),
    #[error("invalid reply: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPaths {
    pub request: PathBuf,
    pub events: PathBuf,
}

impl SocketPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            request: dir.join(".socket.sock"),
            events: dir.join(".socket2.sock"),
        }
    }

    pub fn from_env() -> Result<Self, IpcError> {
        let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(IpcError::NoInstance)?;
        let runtime = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        Ok(Self::in_dir(&instance_dir(runtime.as_deref(), &signature)))
    }
}

/// Newer Hyprland keeps its sockets under `$XDG_RUNTIME_DIR/hypr`, older
/// releases under `/tmp/hypr`.
fn instance_dir(runtime: Option<&Path>, signature: &str) -> PathBuf {
    if let Some(runtime) = runtime {
        let dir = runtime.join("hypr").join(signature);
        if dir.exists() {
            return dir;
        }
    }
    Path::new("/tmp/hypr").join(signature)
}

/// Request-socket client. Each request opens a fresh connection.
#[derive(Debug, Clone)]
pub struct HyprlandIpc {
    paths: SocketPaths,
    timeout: Duration,
}

impl HyprlandIpc {
    pub fn new(paths: SocketPaths) -> Self { Self { paths, timeout: REQUEST_TIMEOUT } }

    pub fn paths(&self) -> &SocketPaths { &self.paths }

    pub fn request(&self, command: &str) -> Result<String, IpcError> {
        let path = &self.paths.request;
        let io_err = |source| IpcError::Io { path: path.clone(), source };

        let mut stream = UnixStream::connect(path).map_err(io_err)?;
        stream.set_read_timeout(Some(self.timeout)).map_err(io_err)?;
        stream.set_write_timeout(Some(self.timeout)).map_err(io_err)?;
        stream.write_all(command.as_bytes()).map_err(io_err)?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).map_err(io_err)?;
        if reply.trim().is_empty() {
            return Err(IpcError::EmptyReply(command.to_owned()));
        }
        Ok(reply)
    }

    pub fn monitors(&self) -> Result<Vec<MonitorData>, IpcError> {
        let reply = self.request("j/monitors")?;
        Ok(serde_json::from_str(&reply)?)
    }
}

impl PointerSource for HyprlandIpc {
    fn cursor_position(&self) -> Result<CursorPosition, PointerError> {
        let reply = self.request("cursorpos")?;
        parse_cursor_reply(&reply)
    }
}

impl GeometryProvider for HyprlandIpc {
    fn output_geometry(&self, output: Option<&str>) -> Option<MonitorGeometry> {
        let monitors = match self.monitors() {
            Ok(monitors) => monitors,
            Err(err) => {
                warn!(%err, "failed to query monitors");
                return None;
            }
        };
        let Some(monitor) = select_monitor(&monitors, output) else {
            debug!(?output, available = monitors.len(), "output not found");
            return None;
        };
        Some(monitor.geometry())
    }
}

/// Event-socket notifier.
///
/// A listener thread owns the connection and reconnects with backoff while
/// the socket is missing, so subscribing never depends on the compositor
/// being reachable yet.
pub struct HyprlandEvents {
    subscriptions: Arc<Subscriptions>,
    stop_tx: Mutex<Option<crossbeam_channel::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl HyprlandEvents {
    pub fn spawn(path: PathBuf) -> io::Result<Self> {
        let subscriptions = Arc::new(Subscriptions::new());
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let listener = Listener {
            path,
            subscriptions: subscriptions.clone(),
            stop_rx,
        };
        let thread = thread::Builder::new()
            .name("hyprland-events".into())
            .spawn(move || listener.run())?;
        Ok(Self {
            subscriptions,
            stop_tx: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn shutdown(&self) {
        drop(self.stop_tx.lock().take());
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("event listener thread panicked");
            }
        }
    }
}

impl EventNotifier for HyprlandEvents {
    fn subscribe(&self, events: &[&str], handler: EventHandler) -> SubscriptionId {
        self.subscriptions.insert(events, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) { self.subscriptions.remove(id); }
}

impl Drop for HyprlandEvents {
    fn drop(&mut self) { self.shutdown(); }
}

struct Listener {
    path: PathBuf,
    subscriptions: Arc<Subscriptions>,
    stop_rx: crossbeam_channel::Receiver<()>,
}

impl Listener {
    fn stopped(&self) -> bool { matches!(self.stop_rx.try_recv(), Err(TryRecvError::Disconnected)) }

    /// Sleeps for `delay` unless asked to stop first.
    fn wait(&self, delay: Duration) -> bool {
        matches!(self.stop_rx.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
    }

    fn run(self) {
        debug!(path = %self.path.display(), "event listener started");
        let mut backoff = RECONNECT_MIN;
        let mut reported = false;

        while !self.stopped() {
            match UnixStream::connect(&self.path) {
                Ok(stream) => {
                    info!(path = %self.path.display(), "connected to event socket");
                    backoff = RECONNECT_MIN;
                    reported = false;
                    if let Err(err) = self.pump(stream) {
                        warn!(%err, "event socket read failed");
                    }
                }
                Err(err) => {
                    if !reported {
                        warn!(path = %self.path.display(), %err, "event socket unavailable, retrying");
                        reported = true;
                    }
                    if !self.wait(backoff) {
                        break;
                    }
                    backoff = (backoff * 2).min(RECONNECT_MAX);
                }
            }
        }
        debug!("event listener stopped");
    }

    /// Reads lines until the compositor closes the socket or we are stopped.
    /// Bytes are buffered raw so a read timeout inside a multi-byte character
    /// does not lose the line.
    fn pump(&self, stream: UnixStream) -> io::Result<()> {
        stream.set_read_timeout(Some(EVENT_POLL))?;
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            if self.stopped() {
                return Ok(());
            }
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    debug!("event socket closed");
                    return Ok(());
                }
                Ok(_) if buf.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&buf);
                    trace!(line = line.trim_end(), "event line");
                    self.subscriptions.publish(&line);
                    buf.clear();
                }
                Ok(_) => {}
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }
}
