use std::io::Write;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Hex,
    Decimal,
}

/// Writes every notification byte for byte, one notification per line.
pub struct RawSink<W: Write> {
    out: W,
    radix: Radix,
}

impl<W: Write> RawSink<W> {
    pub fn new(out: W, radix: Radix) -> Self {
        Self { out, radix }
    }

    pub fn emit_frame(&mut self, data: &[u8]) -> Result<()> {
        let line = data
            .iter()
            .map(|b| match self.radix {
                Radix::Hex => format!("{b:02x}"),
                Radix::Decimal => format!("{b:02}"),
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}
