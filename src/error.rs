use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A notification payload that cannot be decoded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("frame too short: {len} bytes, need at least {required}")]
pub struct DecodeError {
    pub len: usize,
    pub required: usize,
}

/// Everything that can end a meter session.
///
/// None of these are retried inside the crate. Discovery is the only step with
/// a bounded retry loop, and it reports [`Error::Discovery`] once that is spent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no device with a name containing {name:?} found after {attempts} attempts")]
    Discovery { name: String, attempts: u32 },
    #[error("default bluetooth adapter not found")]
    Adapter,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluest::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no data received for {} seconds", .silence.as_secs())]
    LivenessTimeout { silence: Duration },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}
