/**
 * Settings file
 *
 * Optional YAML file that supplies defaults for the command line. Every field
 * may be omitted; missing fields fall back to the constants in
 * `k8s::observe::config`. Command line flags win over the file.
 */
use crate::error::Result;
use crate::k8s::client::expand_home;
use crate::k8s::observe::RetryPolicy;
use crate::k8s::observe::config::{
    ATTEMPT_TIMEOUT_SECONDS, DEFAULT_MONITOR_INTERVAL_SECONDS, DEFAULT_POLL_INTERVAL_SECONDS,
    DEFAULT_RETRY_TIMEOUT_SECONDS, DEFAULT_WAIT_TIMEOUT_SECONDS, INITIAL_BACKOFF_SECONDS,
    MAX_BACKOFF_SECONDS, optional_secs,
};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the settings file when `--config` is absent
pub const CONFIG_ENV: &str = "KUBEOBS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub watch: WatchSettings,
    pub wait: WaitSettings,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub initial_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
    /// Budget per reconnection cycle, 0 retries until cancelled
    pub retry_timeout_seconds: u64,
    pub attempt_timeout_seconds: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            initial_backoff_seconds: INITIAL_BACKOFF_SECONDS,
            max_backoff_seconds: MAX_BACKOFF_SECONDS,
            retry_timeout_seconds: DEFAULT_RETRY_TIMEOUT_SECONDS,
            attempt_timeout_seconds: ATTEMPT_TIMEOUT_SECONDS,
        }
    }
}

impl WatchSettings {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            Duration::from_secs(self.initial_backoff_seconds.max(1)),
            Duration::from_secs(self.max_backoff_seconds),
        )
    }

    #[must_use]
    pub const fn retry_timeout(&self) -> Option<Duration> {
        optional_secs(self.retry_timeout_seconds)
    }

    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            timeout_seconds: DEFAULT_WAIT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_seconds: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_MONITOR_INTERVAL_SECONDS,
        }
    }
}

impl Settings {
    /// # Errors
    ///
    /// Will return `Err` if `yaml` is not a valid settings document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from `path`, or from the file named by `KUBEOBS_CONFIG`,
    /// or fall back to the defaults when neither is given.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be opened or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let path = expand_home(&path);
        debug!("🔧 Loading settings from {}", path.display());
        let reader = File::open(&path)?;
        let settings: Self = serde_yaml::from_reader(reader)?;
        Ok(settings)
    }
}
