use std::io::Write;

use ::csv::WriterBuilder;

use super::{format_fields, RecordSink, FIELDS};
use crate::error::Result;
use crate::session::EnrichedRecord;

/// Comma separated lines, preceded by a header line on the first record.
pub struct CsvSink<W: Write> {
    writer: ::csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        let writer = WriterBuilder::new().has_headers(false).from_writer(out);
        Self { writer }
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn emit(&mut self, record: &EnrichedRecord, is_first: bool, _variant_is_ac: bool) -> Result<()> {
        if is_first {
            self.writer.write_record(FIELDS)?;
        }
        self.writer.write_record(format_fields(record))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::dc_frame;
    use crate::output::testing::SharedBuf;
    use crate::session::SessionState;

    #[test]
    fn test_header_once_then_rows() {
        let buf = SharedBuf::default();
        let mut sink = CsvSink::new(buf.clone());
        let mut state = SessionState::new();
        let frame = dc_frame(0x000140, 0x0001f4, 0);

        for _ in 0..2 {
            let record = state.process(&frame).unwrap();
            sink.emit(&record, record.is_first(), false).unwrap();
        }

        let text = buf.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,voltage_V,current_mA,power_W,resistance_Ohm,capacity_mAh,energy_Wh,\
             frequency_Hz,power_factor,session_total_capacity_mAh,session_total_energy_Wh,temperature_C"
        );
        assert!(lines[1].ends_with(",32.0,500,16.00,64.00,0,0,-1.0,-1.000,0.14,0.00,0"));
        assert!(lines[2].ends_with(",32.0,500,16.00,64.00,0,0,-1.0,-1.000,0.28,0.01,0"));
    }
}
