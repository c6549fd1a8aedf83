//! tofspec-core: Stream synchronization and time-of-flight classification.
//!
//! This crate turns a trigger-pulse list and a gamma list into per-window
//! energy spectra (inelastic, epithermal, capture), dropping corrupted
//! out-of-order timestamps on the way.
//!

pub mod config;
pub mod error;
pub mod interval;
pub mod lookahead;
pub mod record;
pub mod spectrum;
pub mod sync;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use interval::{IntervalHistogram, IntervalRejection};
pub use lookahead::{Advance, Glitch, LookaheadBuffer};
pub use record::{PulseRecord, Stream, Timestamped, TimestampedEvent};
pub use spectrum::{downsample, ChannelAccumulators, TofWindow, TotalSpectrum};
pub use sync::{SplitSpectrum, Step, SyncEngine, SyncStatistics};
