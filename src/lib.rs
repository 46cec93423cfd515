//! Stream measurements from DL24 family electronic loads and AC meters over Bluetooth Low Energy
//!
//! The meter pushes a fixed layout binary frame roughly once a second on the
//! `0000ffe1-0000-1000-8000-00805f9b34fb` characteristic. Byte 3 of every frame tells
//! a DC load apart from an AC meter, which changes how some of the fields are read.
//!
//! Each frame is decoded and folded into a session, which keeps running totals:
//!
//! - Capacity (mAh), integrated from the current. Not applicable to AC meters.
//! - Energy (Wh), integrated from the power
//!
//! The resulting records are written as CSV, JSON or a live table, or the frames can be
//! passed through undecoded. A session ends with an error as soon as a frame cannot be
//! decoded or no frame has arrived for a while (30s by default).
//!
//! # Example
//!
//! ```no_run
//! # #[tokio::main]
//! # pub async fn main() -> dl24read::Result<()> {
//!     let settings = dl24read::Settings::default();
//!     let client = dl24read::MeterClient::connect(&settings).await?;
//!     let mut output = dl24read::Output::stdout(dl24read::OutputFormat::Csv)?;
//!     let result = client.stream(&mut output).await;
//!     client.stop().await?;
//!     result
//! # }
//! ```

mod config;
mod error;
mod frame;
mod liveness;
mod meter_client;
mod output;
mod session;

pub use self::config::{DiscoverySettings, LivenessSettings, Settings, DEFAULT_DEVICE_NAME};
pub use self::error::{DecodeError, Error, Result};
pub use self::frame::{decode, DecodedMeasurement, MeterVariant, MIN_FRAME_LEN, NOT_APPLICABLE};
pub use self::liveness::{Liveness, Watchdog};
pub use self::meter_client::{MeterClient, NOTIFY_CHARACTERISTIC_ID};
pub use self::output::{CsvSink, JsonSink, Output, OutputFormat, Radix, RawSink, RecordSink, TableSink, FIELDS};
pub use self::session::{EnrichedRecord, LastRead, SessionState};
