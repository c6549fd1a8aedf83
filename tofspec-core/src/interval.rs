//! Logarithmic histogram of the time between consecutive events.
//!
//! Bin `b` covers intervals with `10 * log10(dt / 1 s) + 120` in `[b, b + 1)`,
//! i.e. ten bins per decade from 1 ps up to 100 s.

use crate::config::PS_PER_SECOND;
use serde::Serialize;

/// Number of interval bins.
pub const INTERVAL_BINS: usize = 140;
/// Bins per decade of interval length.
const BINS_PER_DECADE: f64 = 10.0;
/// Bin holding a 1 s interval.
const ONE_SECOND_BIN: i64 = 120;

/// Why an interval was left out of the histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum IntervalRejection {
    /// The event is earlier than its predecessor.
    Backwards { time: u64, previous: u64 },
    /// The interval is longer than the histogram range.
    TooLong { time: u64, seconds: f64 },
}

/// Returns the bin for a non-negative interval in picoseconds.
///
/// A zero interval falls into bin 0.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn interval_bin(dt_ps: u64) -> i64 {
    if dt_ps == 0 {
        return 0;
    }
    let seconds = dt_ps as f64 / PS_PER_SECOND;
    let bin = (BINS_PER_DECADE * seconds.log10()).floor() as i64 + ONE_SECOND_BIN;
    bin.max(0)
}

/// Lower edge of `bin` as `log10(seconds)`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn bin_log_time(bin: usize) -> f64 {
    (bin as i64 - ONE_SECOND_BIN) as f64 / BINS_PER_DECADE
}

/// Event-interval histogram built from a single time-ordered stream.
#[derive(Debug, Clone)]
pub struct IntervalHistogram {
    bins: Vec<u64>,
    previous: Option<u64>,
    binned: u64,
    rejected: u64,
}

impl Default for IntervalHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalHistogram {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bins: vec![0; INTERVAL_BINS],
            previous: None,
            binned: 0,
            rejected: 0,
        }
    }

    /// Adds the interval between the previous event and `time`.
    ///
    /// The first event only sets the reference. A rejected event still
    /// becomes the reference for the next interval.
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn record(&mut self, time: u64) -> Option<IntervalRejection> {
        let previous = self.previous.replace(time)?;

        let rejection = if time < previous {
            IntervalRejection::Backwards { time, previous }
        } else {
            let dt = time - previous;
            let bin = interval_bin(dt) as usize;
            if bin < INTERVAL_BINS {
                self.bins[bin] += 1;
                self.binned += 1;
                return None;
            }
            IntervalRejection::TooLong {
                time,
                seconds: dt as f64 / PS_PER_SECOND,
            }
        };

        log::warn!("interval rejected: {rejection:?}");
        self.rejected += 1;
        Some(rejection)
    }

    /// Raw counts per bin.
    #[must_use]
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Number of intervals that were binned.
    #[must_use]
    pub fn binned(&self) -> u64 {
        self.binned
    }

    /// Number of rejected intervals.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// `(log10 seconds, fraction of binned intervals)` for every bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fractions(&self) -> Vec<(f64, f64)> {
        let norm = if self.binned == 0 {
            0.0
        } else {
            1.0 / self.binned as f64
        };
        self.bins
            .iter()
            .enumerate()
            .map(|(bin, &count)| (bin_log_time(bin), count as f64 * norm))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interval_bin() {
        assert_eq!(interval_bin(1_000_000_000_000), 120); // 1 s
        assert_eq!(interval_bin(100_000_000_000_000), 140); // 100 s
        assert_eq!(interval_bin(1_000_000), 60); // 1 µs
        assert_eq!(interval_bin(1), 0); // 1 ps
        assert_eq!(interval_bin(0), 0);
        assert_eq!(interval_bin(2_000_000), 63); // 10*log10(2) ≈ 3.01
    }

    #[test]
    fn test_bin_log_time() {
        assert_relative_eq!(bin_log_time(120), 0.0);
        assert_relative_eq!(bin_log_time(60), -6.0);
        assert_relative_eq!(bin_log_time(0), -12.0);
    }

    #[test]
    fn test_first_event_sets_reference() {
        let mut hist = IntervalHistogram::new();
        assert_eq!(hist.record(500), None);
        assert_eq!(hist.binned(), 0);
        assert_eq!(hist.record(1_000_500), None);
        assert_eq!(hist.binned(), 1);
        assert_eq!(hist.bins()[60], 1);
    }

    #[test]
    fn test_backwards_interval_rejected() {
        let mut hist = IntervalHistogram::new();
        hist.record(5_000);
        let rejection = hist.record(1_000);
        assert_eq!(
            rejection,
            Some(IntervalRejection::Backwards {
                time: 1_000,
                previous: 5_000
            })
        );
        // Rejected event is the new reference
        assert_eq!(hist.record(1_001_000), None);
        assert_eq!(hist.bins()[60], 1);
        assert_eq!(hist.rejected(), 1);
    }

    #[test]
    fn test_too_long_interval_rejected() {
        let mut hist = IntervalHistogram::new();
        hist.record(0);
        let rejection = hist.record(200_000_000_000_000);
        assert!(matches!(rejection, Some(IntervalRejection::TooLong { .. })));
        assert_eq!(hist.binned(), 0);
    }

    #[test]
    fn test_fractions_normalised() {
        let mut hist = IntervalHistogram::new();
        for t in [0, 1_000_000, 2_000_000, 3_000_000, 1_000_003_000_000] {
            hist.record(t);
        }
        let fractions = hist.fractions();
        assert_eq!(fractions.len(), INTERVAL_BINS);
        assert_relative_eq!(fractions[60].1, 0.75);
        assert_relative_eq!(fractions[120].1, 0.25);
        let sum: f64 = fractions.iter().map(|(_, f)| f).sum();
        assert_relative_eq!(sum, 1.0);
    }

    #[test]
    fn test_fractions_empty() {
        let hist = IntervalHistogram::new();
        assert!(hist.fractions().iter().all(|&(_, f)| f == 0.0));
    }
}
