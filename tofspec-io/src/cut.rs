//! Truncating a list file at a given acquisition time.

use crate::reader::CompassFile;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// What [`time_cut`] copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutSummary {
    /// Records written after the header.
    pub records: u64,
    /// Timetag of the last record written (ps), 0 if none.
    pub last_time: u64,
}

/// Copies the header and every record up to `cut_ps` into `output`.
///
/// Copying stops at the first record whose timetag exceeds the cut; lines are
/// written byte-for-byte.
///
/// # Errors
/// Returns an error if the output cannot be written or a record before the
/// cut fails to parse.
pub fn time_cut<P: AsRef<Path>>(input: &CompassFile, output: P, cut_ps: u64) -> Result<CutSummary> {
    let mut writer = BufWriter::new(File::create(output)?);
    writer.write_all(input.header())?;

    let mut summary = CutSummary {
        records: 0,
        last_time: 0,
    };
    for line in input.lines() {
        let record = line.parse()?;
        if record.timetag > cut_ps {
            log::debug!(
                "cut reached at line {} (timetag {} ps)",
                line.number,
                record.timetag
            );
            break;
        }
        writer.write_all(line.raw)?;
        summary.records += 1;
        summary.last_time = record.timetag;
    }

    writer.flush()?;
    Ok(summary)
}
