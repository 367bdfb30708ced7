use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_DELAY_SECS: u64 = 3;
pub const DEFAULT_DEADLINE_SECS: u64 = 10;

/// Top-level config (webundo.toml + WEBUNDO_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebundoConfig {
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Timing defaults handed to the coordinator by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Seconds a cancelable job waits before it fires.
    #[serde(default = "default_delay_secs")]
    pub default_delay_secs: u64,
    /// Seconds an undoable job stays triggerable.
    #[serde(default = "default_deadline_secs")]
    pub default_deadline_secs: u64,
    /// Upper bound on how long `undo` waits for the action's result.
    /// Unset means wait until the action finishes.
    #[serde(default)]
    pub undo_wait_secs: Option<u64>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_delay_secs: DEFAULT_DELAY_SECS,
            default_deadline_secs: DEFAULT_DEADLINE_SECS,
            undo_wait_secs: None,
        }
    }
}

impl JobsConfig {
    pub fn default_delay(&self) -> Duration {
        Duration::from_secs(self.default_delay_secs)
    }

    pub fn default_deadline(&self) -> Duration {
        Duration::from_secs(self.default_deadline_secs)
    }

    pub fn undo_wait(&self) -> Option<Duration> {
        self.undo_wait_secs.map(Duration::from_secs)
    }
}

fn default_delay_secs() -> u64 {
    DEFAULT_DELAY_SECS
}
fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

impl WebundoConfig {
    /// Load config from a TOML file with WEBUNDO_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `WEBUNDO_CONFIG` env var
    ///   3. ~/.webundo/webundo.toml
    ///
    /// Nested keys use a double underscore, e.g.
    /// `WEBUNDO_JOBS__DEFAULT_DELAY_SECS=5`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("WEBUNDO_CONFIG").ok())
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading config");

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("WEBUNDO_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.webundo/webundo.toml", home)
}
