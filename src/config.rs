use std::path::Path;

use serde::Deserialize;
use tokio::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_DEVICE_NAME: &str = "DL24_BLE";
const DEFAULT_CONFIG_NAME: &str = "dl24";
const ENV_PREFIX: &str = "DL24";

/// Runtime settings, layered from defaults, an optional config file and
/// `DL24__*` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Substring of the advertised name of the meter to connect to
    pub device_name: String,
    pub discovery: DiscoverySettings,
    pub liveness: LivenessSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoverySettings {
    /// How many scans to run before giving up
    pub attempts: u32,
    /// Pause between two scans
    pub backoff_secs: u64,
    /// How long a single scan listens for advertisements
    pub scan_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LivenessSettings {
    pub check_interval_secs: u64,
    /// Longest tolerated gap between two frames
    pub silence_threshold_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.into(),
            discovery: DiscoverySettings::default(),
            liveness: LivenessSettings::default(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self { attempts: 5, backoff_secs: 5, scan_window_secs: 10 }
    }
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self { check_interval_secs: 1, silence_threshold_secs: 30 }
    }
}

impl DiscoverySettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_window_secs)
    }
}

impl LivenessSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn silence_threshold(&self) -> Duration {
        Duration::from_secs(self.silence_threshold_secs)
    }
}

impl Settings {
    /// Load settings from `path` (or `dl24.*` in the working directory when
    /// `None`) and the environment.
    ///
    /// A missing default file is fine, a missing explicit one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(Error::Configuration("device_name must not be empty".into()));
        }
        if self.discovery.attempts == 0 {
            return Err(Error::Configuration("discovery.attempts must be at least 1".into()));
        }
        if self.liveness.check_interval_secs == 0 {
            return Err(Error::Configuration("liveness.check_interval_secs must be at least 1".into()));
        }
        if self.liveness.silence_threshold_secs == 0 {
            return Err(Error::Configuration("liveness.silence_threshold_secs must be at least 1".into()));
        }
        Ok(())
    }
}
