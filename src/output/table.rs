use ratatui::backend::Backend;
use ratatui::layout::Constraint;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Row, Table};
use ratatui::Terminal;

use super::RecordSink;
use crate::error::{Error, Result};
use crate::session::EnrichedRecord;

/// Rows taken up by the table: borders, header and the single value row.
pub(crate) const HEIGHT: u16 = 4;

const DC_HEADER: [&str; 10] =
    ["Time", "V", "mA", "W", "Ohm", "mAh", "Wh", "Total mAh", "Total Wh", "Temp C"];
const AC_HEADER: [&str; 10] = ["Time", "V", "mA", "W", "Ohm", "Wh", "Hz", "PF", "Total Wh", "Temp C"];

/// A single row table redrawn in place for every record.
pub struct TableSink<B: Backend> {
    terminal: Terminal<B>,
}

impl<B: Backend> TableSink<B> {
    /// Fails when there is no terminal to draw on.
    pub fn new(terminal: Option<Terminal<B>>) -> Result<Self> {
        let terminal = terminal.ok_or_else(|| {
            Error::Configuration("table output needs a terminal, stdout is not one".into())
        })?;
        Ok(Self { terminal })
    }

    fn cells(record: &EnrichedRecord, variant_is_ac: bool) -> Vec<String> {
        let m = &record.measurement;
        let mut cells = vec![
            record.timestamp.format("%H:%M:%S").to_string(),
            format!("{:.1}", m.voltage_v),
            m.current_ma.to_string(),
            format!("{:.2}", m.power_w),
            format!("{:.2}", m.resistance_ohm),
        ];
        if variant_is_ac {
            cells.extend([
                m.energy_wh.to_string(),
                format!("{:.1}", m.frequency_hz),
                format!("{:.3}", m.power_factor),
            ]);
        } else {
            cells.extend([
                m.capacity_mah.to_string(),
                m.energy_wh.to_string(),
                format!("{:.2}", record.session_total_capacity_mah),
            ]);
        }
        cells.extend([
            format!("{:.2}", record.session_total_energy_wh),
            m.temperature_c.to_string(),
        ]);
        cells
    }
}

impl<B: Backend> RecordSink for TableSink<B> {
    fn emit(&mut self, record: &EnrichedRecord, _is_first: bool, variant_is_ac: bool) -> Result<()> {
        let header = if variant_is_ac { AC_HEADER } else { DC_HEADER };
        let header = Row::new(header).style(Style::default().add_modifier(Modifier::BOLD));
        let row = Row::new(Self::cells(record, variant_is_ac));
        let widths = [Constraint::Length(9), Constraint::Min(6)]
            .into_iter()
            .chain(std::iter::repeat(Constraint::Min(9)).take(8));
        let title = if variant_is_ac { " AC meter " } else { " DC load " };

        let table = Table::new([row], widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title));

        self.terminal.draw(|frame| frame.render_widget(table, frame.size()))?;
        Ok(())
    }
}
