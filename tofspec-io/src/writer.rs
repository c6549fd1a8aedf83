//! CSV writers for spectra and histograms.

use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tofspec_core::ChannelAccumulators;

/// Writer for processed spectrum output.
pub struct SpectrumWriter {
    writer: BufWriter<File>,
}

impl SpectrumWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes the per-window spectra as CSV.
    ///
    /// Columns: `channel,epi,inel,cap,total`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_split_csv(&mut self, spectrum: &ChannelAccumulators) -> Result<()> {
        writeln!(self.writer, "channel,epi,inel,cap,total")?;

        for c in 0..spectrum.num_channels() {
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                c,
                spectrum.epithermal[c],
                spectrum.inelastic[c],
                spectrum.capture[c],
                spectrum.total[c]
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes a single spectrum as CSV.
    ///
    /// Columns: `channel,total`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_total_csv(&mut self, total: &[f64]) -> Result<()> {
        writeln!(self.writer, "channel,total")?;

        for (c, value) in total.iter().enumerate() {
            writeln!(self.writer, "{c},{value}")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes an event-interval histogram as CSV.
    ///
    /// Columns: `logtime,frac`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_interval_csv(&mut self, fractions: &[(f64, f64)]) -> Result<()> {
        writeln!(self.writer, "logtime,frac")?;

        for (log_time, fraction) in fractions {
            writeln!(self.writer, "{log_time},{fraction}")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
