use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::Thresholds;
use crate::model::visibility::MIN_DELAY;

pub const CONFIG_DIR_NAME: &str = "panel-autohide";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub autohide: Settings,
    pub panel: PanelSettings,
}

/// Tuning for the autohide decision engine. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
    /// Pointer y at or above this many pixels from the top arms a show.
    pub threshold_hidden_y: u32,
    /// Pointer y below this many pixels from the top arms a hide.
    pub threshold_visible_y: u32,
    /// Milliseconds spent pending before a show commits.
    pub delay_show: u32,
    /// Milliseconds spent pending before a hide commits.
    pub delay_hide: u32,
    /// Sampling period in milliseconds.
    pub check_interval: u32,
    /// Consecutive top-edge samples required before a show is armed.
    pub consecutive_checks_before_visible: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold_hidden_y: 1,
            threshold_visible_y: 50,
            delay_show: 0,
            delay_hide: 3000,
            check_interval: 100,
            consecutive_checks_before_visible: 2,
        }
    }
}

impl Settings {
    /// Clamps values that would make the engine misbehave back to something
    /// safe. Never fails: a bad value costs a warning, not the panel.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.check_interval == 0 {
            warn!(
                "check-interval must be positive, using {}ms",
                defaults.check_interval
            );
            self.check_interval = defaults.check_interval;
        }

        if self.consecutive_checks_before_visible == 0 {
            warn!("consecutive-checks-before-visible must be at least 1, using 1");
            self.consecutive_checks_before_visible = 1;
        }

        if self.threshold_hidden_y >= self.threshold_visible_y {
            warn!(
                hidden = self.threshold_hidden_y,
                visible = self.threshold_visible_y,
                "threshold-hidden-y must be below threshold-visible-y, using defaults {}/{}",
                defaults.threshold_hidden_y,
                defaults.threshold_visible_y,
            );
            self.threshold_hidden_y = defaults.threshold_hidden_y;
            self.threshold_visible_y = defaults.threshold_visible_y;
        }

        self
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            hidden_y: self.threshold_hidden_y,
            visible_y: self.threshold_visible_y,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.check_interval.max(1)))
    }

    pub fn effective_delay_show(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_show)).max(MIN_DELAY)
    }

    pub fn effective_delay_hide(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_hide)).max(MIN_DELAY)
    }
}

/// Settings for the binary's panel side: which output to follow and how to
/// apply visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PanelSettings {
    pub output: Option<String>,
    pub on_show: Option<String>,
    pub on_hide: Option<String>,
    pub emit_json: bool,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            output: None,
            on_show: None,
            on_hide: None,
            emit_json: true,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::parse(&text, path)
    }

    /// Loads `explicit` if given. Otherwise loads the default location, and
    /// falls back to defaults when there is no file there.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::read(&path),
            Some(path) => {
                debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> String { toml::to_string(self).unwrap_or_default() }
}
