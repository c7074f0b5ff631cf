//! Render sinks: what "apply visibility to the panel" means for a given
//! deployment. Sinks are only ever called from the dispatch thread.

use std::io::{self, Write};
use std::process::{Child, Command, Stdio};

use serde::Serialize;
use tracing::{debug, warn};

use crate::common::config::PanelSettings;
use crate::model::VisibilityState;

/// Applies a resolved visibility. Must be idempotent and cheap enough to
/// call on every commit.
pub trait RenderSink {
    fn set_visible(&mut self, visible: bool, state: VisibilityState);
}

impl<R: RenderSink + ?Sized> RenderSink for Box<R> {
    fn set_visible(&mut self, visible: bool, state: VisibilityState) {
        (**self).set_visible(visible, state)
    }
}

#[derive(Serialize)]
struct Line {
    visible: bool,
    state: VisibilityState,
}

/// Writes one JSON object per applied visibility.
pub struct JsonLines<W> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self { Self { out } }

    pub fn into_inner(self) -> W { self.out }

    fn write(&mut self, visible: bool, state: VisibilityState) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, &Line { visible, state })?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> RenderSink for JsonLines<W> {
    fn set_visible(&mut self, visible: bool, state: VisibilityState) {
        if let Err(err) = self.write(visible, state) {
            warn!(%err, "failed to write visibility line");
        }
    }
}

/// Runs a shell command whenever the applied visibility flips.
pub struct CommandSink {
    on_show: Option<String>,
    on_hide: Option<String>,
    last: Option<bool>,
    children: Vec<Child>,
}

impl CommandSink {
    pub fn new(on_show: Option<String>, on_hide: Option<String>) -> Self {
        Self { on_show, on_hide, last: None, children: vec![] }
    }

    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    debug!(%status, "panel command exited unsuccessfully");
                }
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!(%err, "failed to poll panel command");
                false
            }
        });
    }

    fn spawn(&mut self, command: &str) {
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => self.children.push(child),
            Err(err) => warn!(%err, command, "failed to run panel command"),
        }
    }
}

impl RenderSink for CommandSink {
    fn set_visible(&mut self, visible: bool, _state: VisibilityState) {
        self.reap();
        if self.last == Some(visible) {
            return;
        }
        self.last = Some(visible);
        let command = if visible { self.on_show.clone() } else { self.on_hide.clone() };
        if let Some(command) = command {
            debug!(visible, command = command.as_str(), "running panel command");
            self.spawn(&command);
        }
    }
}

/// Forwards to every inner sink in order.
#[derive(Default)]
pub struct Fanout(Vec<Box<dyn RenderSink>>);

impl Fanout {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, sink: impl RenderSink + 'static) { self.0.push(Box::new(sink)); }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl RenderSink for Fanout {
    fn set_visible(&mut self, visible: bool, state: VisibilityState) {
        for sink in &mut self.0 {
            sink.set_visible(visible, state);
        }
    }
}

/// Builds the sink the binary uses from its `[panel]` settings.
pub fn from_settings(settings: &PanelSettings) -> Fanout {
    let mut fanout = Fanout::new();
    if settings.emit_json {
        fanout.push(JsonLines::new(io::stdout()));
    }
    if settings.on_show.is_some() || settings.on_hide.is_some() {
        fanout.push(CommandSink::new(settings.on_show.clone(), settings.on_hide.clone()));
    }
    fanout
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn json_lines_writes_one_object_per_call() {
        let mut sink = JsonLines::new(Vec::new());
        sink.set_visible(true, VisibilityState::Visible);
        sink.set_visible(false, VisibilityState::Hidden);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "{\"visible\":true,\"state\":\"visible\"}\n{\"visible\":false,\"state\":\"hidden\"}\n"
        );
    }

    #[test]
    fn command_sink_only_runs_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let append = |word: &str| format!("echo {word} >> '{}'", log.display());
        let mut sink = CommandSink::new(Some(append("show")), Some(append("hide")));

        sink.set_visible(true, VisibilityState::Visible);
        sink.set_visible(true, VisibilityState::PendingHidden);
        sink.set_visible(false, VisibilityState::Hidden);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !sink.children.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
            sink.reap();
        }
        let mut lines: Vec<String> = read(&log).lines().map(str::to_owned).collect();
        lines.sort();
        assert_eq!(lines, vec!["hide".to_string(), "show".to_string()]);
    }

    fn read(path: &Path) -> String { std::fs::read_to_string(path).unwrap_or_default() }

    #[test]
    fn settings_pick_sinks() {
        let mut settings = PanelSettings::default();
        assert_eq!(from_settings(&settings).len(), 1);
        settings.emit_json = false;
        assert!(from_settings(&settings).is_empty());
        settings.on_hide = Some("true".into());
        assert_eq!(from_settings(&settings).len(), 1);
    }
}
