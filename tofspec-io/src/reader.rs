//! Memory-mapped readers for CoMPASS list files.
//!
//! A list file is `;`-separated text with one header line followed by
//! `BOARD;CHANNEL;TIMETAG;ENERGY;ENERGYSHORT;FLAGS` records. Only `TIMETAG`
//! (picoseconds) and `ENERGY` (channel) are used.

use crate::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tofspec_core::{PulseRecord, TimestampedEvent};

/// Field separator of CoMPASS list files.
pub const FIELD_SEPARATOR: char = ';';
/// Zero-based column of the timetag.
pub const TIMETAG_FIELD: usize = 2;
/// Zero-based column of the energy.
pub const ENERGY_FIELD: usize = 3;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the whole list
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The two fields of a list record the analysis uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompassRecord {
    /// Timestamp in picoseconds.
    pub timetag: u64,
    /// Energy channel or pulse height.
    pub energy: u32,
}

fn parse_field<T>(field: Option<&str>, name: &str) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = field.ok_or_else(|| format!("missing {name} field"))?.trim();
    text.parse()
        .map_err(|e| format!("invalid {name} value '{text}': {e}"))
}

impl CompassRecord {
    /// Parses one record line (without its terminator).
    ///
    /// # Errors
    /// Returns a description of the first missing or malformed field.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut fields = line.split(FIELD_SEPARATOR);
        let timetag = parse_field(fields.nth(TIMETAG_FIELD), "TIMETAG")?;
        let energy = parse_field(fields.nth(ENERGY_FIELD - TIMETAG_FIELD - 1), "ENERGY")?;
        Ok(Self { timetag, energy })
    }

    /// The record as a gamma event.
    #[must_use]
    pub fn to_event(self) -> TimestampedEvent {
        TimestampedEvent::new(self.timetag, self.energy)
    }

    /// The record as a pulse record.
    #[must_use]
    pub fn to_pulse(self) -> PulseRecord {
        PulseRecord::new(self.timetag, self.energy)
    }
}

/// One non-blank line after the header.
#[derive(Debug, Clone, Copy)]
pub struct DataLine<'a> {
    /// One-based line number in the file (the header is line 1).
    pub number: usize,
    /// The line including its terminator.
    pub raw: &'a [u8],
}

impl<'a> DataLine<'a> {
    /// The line without `\n` / `\r\n`.
    #[must_use]
    pub fn content(&self) -> &'a [u8] {
        let line = self.raw.strip_suffix(b"\n").unwrap_or(self.raw);
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    /// Parses the line into a record.
    ///
    /// # Errors
    /// Returns [`Error::Parse`] with the line number on malformed input.
    pub fn parse(&self) -> Result<CompassRecord> {
        let text = std::str::from_utf8(self.content()).map_err(|_| Error::Parse {
            line: self.number,
            reason: "not valid UTF-8".to_string(),
        })?;
        CompassRecord::parse(text).map_err(|reason| Error::Parse {
            line: self.number,
            reason,
        })
    }
}

/// Iterator over the data lines of a list file.
pub struct DataLines<'a> {
    data: &'a [u8],
    pos: usize,
    number: usize,
}

impl<'a> Iterator for DataLines<'a> {
    type Item = DataLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let rest = &self.data[self.pos..];
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |i| i + 1);
            self.pos += end;
            self.number += 1;

            let line = DataLine {
                number: self.number,
                raw: &rest[..end],
            };
            if !line.content().is_empty() {
                return Some(line);
            }
        }
        None
    }
}

/// A CoMPASS list file opened through a memory map.
pub struct CompassFile {
    reader: MappedFileReader,
    header_end: usize,
}

impl CompassFile {
    /// Opens a list file and locates its header line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or is empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        if reader.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "missing header line (file: {})",
                reader.path().display()
            )));
        }
        let bytes = reader.as_bytes();
        let header_end = bytes
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |i| i + 1);
        Ok(Self { reader, header_end })
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// The header line including its terminator.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.reader.as_bytes()[..self.header_end]
    }

    /// Iterates over the non-blank lines after the header.
    #[must_use]
    pub fn lines(&self) -> DataLines<'_> {
        DataLines {
            data: self.reader.as_bytes(),
            pos: self.header_end,
            number: 1,
        }
    }

    /// Iterates over parsed records.
    pub fn records(&self) -> impl Iterator<Item = Result<CompassRecord>> + '_ {
        self.lines().map(|line| line.parse())
    }

    /// Iterates over the records as gamma events.
    pub fn gamma_events(&self) -> impl Iterator<Item = Result<TimestampedEvent>> + '_ {
        self.records().map(|r| r.map(CompassRecord::to_event))
    }

    /// Iterates over the trigger pulses: records with energy at or above
    /// `threshold`. Parse errors are passed through.
    pub fn pulses(&self, threshold: u32) -> impl Iterator<Item = Result<PulseRecord>> + '_ {
        self.records().filter_map(move |r| match r {
            Ok(record) => {
                let pulse = record.to_pulse();
                pulse.is_trigger(threshold).then_some(Ok(pulse))
            }
            Err(e) => Some(Err(e)),
        })
    }
}
