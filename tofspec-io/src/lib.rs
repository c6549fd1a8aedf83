//! tofspec-io: CoMPASS list-file I/O for tofspec.
//!
//! This crate reads list files through memory maps, turns their rows into
//! the record types of `tofspec-core`, and writes spectra as CSV.
//!

pub mod cut;
mod error;
pub mod reader;
mod writer;

pub use cut::{time_cut, CutSummary};
pub use error::{Error, Result};
pub use reader::{CompassFile, CompassRecord, DataLine, DataLines, MappedFileReader};
pub use writer::SpectrumWriter;
