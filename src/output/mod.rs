//! Where decoded records (or raw notifications) end up.

mod csv;
mod json;
mod raw;
mod table;

use std::io::IsTerminal;

use clap::ValueEnum;
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};
use tracing::trace;

use crate::error::{Error, Result};
use crate::session::{EnrichedRecord, SessionState};

pub use self::csv::CsvSink;
pub use self::json::JsonSink;
pub use self::raw::{Radix, RawSink};
pub use self::table::TableSink;

/// Column names shared by every record format, in output order.
pub const FIELDS: [&str; 12] = [
    "timestamp",
    "voltage_V",
    "current_mA",
    "power_W",
    "resistance_Ohm",
    "capacity_mAh",
    "energy_Wh",
    "frequency_Hz",
    "power_factor",
    "session_total_capacity_mAh",
    "session_total_energy_Wh",
    "temperature_C",
];

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
    /// Undecoded bytes as hex
    Raw,
    /// Undecoded bytes as decimal
    RawDecimal,
    /// Live updating table
    Table,
}

/// Something that renders enriched records.
pub trait RecordSink {
    fn emit(&mut self, record: &EnrichedRecord, is_first: bool, variant_is_ac: bool) -> Result<()>;
}

/// The output chosen at startup.
pub enum Output {
    /// Notifications are written as they arrive, without decoding.
    Raw(RawSink<Box<dyn std::io::Write>>),
    Records(Box<dyn RecordSink>),
}

impl Output {
    /// Build the output for `format` on stdout.
    ///
    /// The table needs a terminal to draw on; without one this is a
    /// configuration error.
    pub fn stdout(format: OutputFormat) -> Result<Self> {
        let out: Box<dyn std::io::Write> = Box::new(std::io::stdout());
        Ok(match format {
            OutputFormat::Csv => Output::Records(Box::new(CsvSink::new(out))),
            OutputFormat::Json => Output::Records(Box::new(JsonSink::new(out))),
            OutputFormat::Raw => Output::Raw(RawSink::new(out, Radix::Hex)),
            OutputFormat::RawDecimal => Output::Raw(RawSink::new(out, Radix::Decimal)),
            OutputFormat::Table => {
                let terminal = if std::io::stdout().is_terminal() {
                    let backend = CrosstermBackend::new(std::io::stdout());
                    let options = TerminalOptions { viewport: Viewport::Inline(table::HEIGHT) };
                    Some(Terminal::with_options(backend, options)?)
                } else {
                    None
                };
                Output::Records(Box::new(TableSink::new(terminal)?))
            }
        })
    }

    /// Hand one notification payload to the output, decoding it first unless
    /// this is a raw passthrough.
    pub fn handle(&mut self, state: &mut SessionState, data: &[u8]) -> Result<()> {
        match self {
            Output::Raw(sink) => {
                state.touch();
                sink.emit_frame(data)
            }
            Output::Records(sink) => {
                let record = state.process(data).map_err(Error::from)?;
                trace!(log_number = record.log_number, "decoded frame");
                sink.emit(&record, record.is_first(), record.measurement.variant.is_ac())
            }
        }
    }
}

/// Render a record's values in [`FIELDS`] order.
pub(crate) fn format_fields(record: &EnrichedRecord) -> [String; 12] {
    let m = &record.measurement;
    [
        record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        format!("{:.1}", m.voltage_v),
        m.current_ma.to_string(),
        format!("{:.2}", m.power_w),
        format!("{:.2}", m.resistance_ohm),
        m.capacity_mah.to_string(),
        m.energy_wh.to_string(),
        format!("{:.1}", m.frequency_hz),
        format!("{:.3}", m.power_factor),
        format!("{:.2}", record.session_total_capacity_mah),
        format!("{:.2}", record.session_total_energy_wh),
        m.temperature_c.to_string(),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    /// A writer whose contents stay readable after it has been boxed away.
    #[derive(Clone, Default)]
    pub struct SharedBuf(pub Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        pub fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
