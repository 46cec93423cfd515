use std::io::Write;

use serde::Serialize;

use super::{RecordSink, TIMESTAMP_FORMAT};
use crate::error::Result;
use crate::session::EnrichedRecord;

#[derive(Serialize)]
struct JsonRecord {
    timestamp: String,
    #[serde(rename = "voltage_V")]
    voltage_v: f64,
    #[serde(rename = "current_mA")]
    current_ma: i64,
    #[serde(rename = "power_W")]
    power_w: f64,
    #[serde(rename = "resistance_Ohm")]
    resistance_ohm: f64,
    #[serde(rename = "capacity_mAh")]
    capacity_mah: i64,
    #[serde(rename = "energy_Wh")]
    energy_wh: i64,
    #[serde(rename = "frequency_Hz")]
    frequency_hz: f64,
    power_factor: f64,
    #[serde(rename = "session_total_capacity_mAh")]
    session_total_capacity_mah: f64,
    #[serde(rename = "session_total_energy_Wh")]
    session_total_energy_wh: f64,
    #[serde(rename = "temperature_C")]
    temperature_c: i64,
}

impl From<&EnrichedRecord> for JsonRecord {
    fn from(record: &EnrichedRecord) -> Self {
        let m = &record.measurement;
        Self {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            voltage_v: m.voltage_v,
            current_ma: m.current_ma,
            power_w: m.power_w,
            resistance_ohm: m.resistance_ohm,
            capacity_mah: m.capacity_mah,
            energy_wh: m.energy_wh,
            frequency_hz: m.frequency_hz,
            power_factor: m.power_factor,
            session_total_capacity_mah: record.session_total_capacity_mah,
            session_total_energy_wh: record.session_total_energy_wh,
            temperature_c: m.temperature_c,
        }
    }
}

/// One JSON object per record, each on its own line.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> RecordSink for JsonSink<W> {
    fn emit(&mut self, record: &EnrichedRecord, _is_first: bool, _variant_is_ac: bool) -> Result<()> {
        serde_json::to_writer(&mut self.out, &JsonRecord::from(record))?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
