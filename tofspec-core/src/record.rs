//! Record types for the pulse and gamma list streams.

use serde::{Deserialize, Serialize};

/// Trait for list-mode records carrying a picosecond timestamp.
///
/// The lookahead buffer only needs the timestamp to decide whether a freshly
/// read record keeps its stream in order, so both the trigger-pulse records
/// and the gamma events expose it through this trait.
pub trait Timestamped {
    /// Returns the timestamp in picoseconds.
    fn time(&self) -> u64;
}

/// A record from the trigger-pulse (TTL) stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseRecord {
    /// Timestamp in picoseconds.
    pub time: u64,
    /// Pulse height; real triggers sit above the noise threshold.
    pub energy: u32,
}

impl PulseRecord {
    /// Creates a new pulse record.
    #[inline]
    #[must_use]
    pub fn new(time: u64, energy: u32) -> Self {
        Self { time, energy }
    }

    /// Returns true if this record is a real trigger pulse for `threshold`.
    #[inline]
    #[must_use]
    pub fn is_trigger(&self, threshold: u32) -> bool {
        self.energy >= threshold
    }
}

impl Timestamped for PulseRecord {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }
}

/// A detected gamma event: a timestamp and the channel it deposited into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampedEvent {
    /// Timestamp in picoseconds.
    pub time: u64,
    /// Energy channel index.
    pub energy: u32,
}

impl TimestampedEvent {
    /// Creates a new gamma event.
    #[inline]
    #[must_use]
    pub fn new(time: u64, energy: u32) -> Self {
        Self { time, energy }
    }
}

impl Timestamped for TimestampedEvent {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }
}

/// Identifies which input stream a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    /// Trigger-pulse stream.
    Pulse,
    /// Gamma (detector energy) stream.
    Gamma,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pulse => f.write_str("pulse"),
            Self::Gamma => f.write_str("gamma"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_threshold_is_inclusive() {
        assert!(PulseRecord::new(10, 150).is_trigger(150));
        assert!(PulseRecord::new(10, 151).is_trigger(150));
        assert!(!PulseRecord::new(10, 149).is_trigger(150));
    }

    #[test]
    fn test_timestamped() {
        let pulse = PulseRecord::new(1000, 200);
        let gamma = TimestampedEvent::new(2000, 12);
        assert_eq!(pulse.time(), 1000);
        assert_eq!(gamma.time(), 2000);
    }

    #[test]
    fn test_stream_display() {
        assert_eq!(Stream::Pulse.to_string(), "pulse");
        assert_eq!(Stream::Gamma.to_string(), "gamma");
    }
}
