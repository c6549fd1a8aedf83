//! Channel-indexed energy spectra and rebinning.

use crate::record::TimestampedEvent;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Time-of-flight window a gamma event falls into after its trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TofWindow {
    /// Prompt gammas from inelastic scattering.
    Inelastic,
    /// Gammas from epithermal neutrons.
    Epithermal,
    /// Delayed gammas from thermal capture.
    Capture,
}

#[inline]
fn channel_index(channel: u32, num_channels: usize) -> Result<usize> {
    match usize::try_from(channel) {
        Ok(idx) if idx < num_channels => Ok(idx),
        _ => Err(Error::ChannelOutOfRange {
            channel,
            num_channels,
        }),
    }
}

/// Collapses `values` into coarser bins by summing `factor` neighbours.
///
/// A trailing partial group forms its own, final bin.
///
/// # Errors
/// Returns [`Error::ConfigError`] if `factor` is zero.
pub fn downsample(values: &[f64], factor: usize) -> Result<Vec<f64>> {
    if factor == 0 {
        return Err(Error::ConfigError(
            "downsampling factor must be at least 1".to_string(),
        ));
    }
    Ok(values.chunks(factor).map(|chunk| chunk.iter().sum()).collect())
}

/// Per-window spectra produced by the synchronization engine.
///
/// All four arrays have the same length. Every recorded event lands in
/// `total` and in exactly one window array, so
/// `total[c] == inelastic[c] + epithermal[c] + capture[c]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAccumulators {
    pub inelastic: Vec<f64>,
    pub epithermal: Vec<f64>,
    pub capture: Vec<f64>,
    pub total: Vec<f64>,
}

impl ChannelAccumulators {
    /// Creates zeroed accumulators with `num_channels` channels.
    #[must_use]
    pub fn new(num_channels: usize) -> Self {
        Self {
            inelastic: vec![0.0; num_channels],
            epithermal: vec![0.0; num_channels],
            capture: vec![0.0; num_channels],
            total: vec![0.0; num_channels],
        }
    }

    /// Number of channels per accumulator.
    #[inline]
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.total.len()
    }

    /// Counts one event in `channel` for `window` and in the total.
    ///
    /// # Errors
    /// Returns [`Error::ChannelOutOfRange`] if `channel` is not a valid index.
    pub fn record(&mut self, channel: u32, window: TofWindow) -> Result<()> {
        let idx = channel_index(channel, self.num_channels())?;
        match window {
            TofWindow::Inelastic => self.inelastic[idx] += 1.0,
            TofWindow::Epithermal => self.epithermal[idx] += 1.0,
            TofWindow::Capture => self.capture[idx] += 1.0,
        }
        self.total[idx] += 1.0;
        Ok(())
    }

    /// Returns the accumulator for `window`.
    #[must_use]
    pub fn window(&self, window: TofWindow) -> &[f64] {
        match window {
            TofWindow::Inelastic => &self.inelastic,
            TofWindow::Epithermal => &self.epithermal,
            TofWindow::Capture => &self.capture,
        }
    }

    /// Sum of all channels in the total spectrum.
    #[must_use]
    pub fn total_counts(&self) -> f64 {
        self.total.iter().sum()
    }

    /// Checks the per-channel total invariant.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_consistent(&self) -> bool {
        (0..self.num_channels()).all(|c| {
            self.total[c] == self.inelastic[c] + self.epithermal[c] + self.capture[c]
        })
    }

    /// Rebins all four accumulators by `factor`.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if `factor` is zero.
    pub fn downsample(&self, factor: usize) -> Result<Self> {
        Ok(Self {
            inelastic: downsample(&self.inelastic, factor)?,
            epithermal: downsample(&self.epithermal, factor)?,
            capture: downsample(&self.capture, factor)?,
            total: downsample(&self.total, factor)?,
        })
    }

    /// Returns a copy with every channel multiplied by `factor`.
    ///
    /// Used to turn counts into rates (`factor = 1 / live_seconds`).
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |v: &[f64]| v.iter().map(|x| x * factor).collect();
        Self {
            inelastic: scale(&self.inelastic),
            epithermal: scale(&self.epithermal),
            capture: scale(&self.capture),
            total: scale(&self.total),
        }
    }
}

/// Plain energy spectrum of one list file, without trigger correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalSpectrum {
    counts: Vec<f64>,
    last_time: u64,
    events: u64,
}

impl TotalSpectrum {
    /// Creates an empty spectrum with `num_channels` channels.
    #[must_use]
    pub fn new(num_channels: usize) -> Self {
        Self {
            counts: vec![0.0; num_channels],
            last_time: 0,
            events: 0,
        }
    }

    /// Accumulates every event yielded by `events`.
    ///
    /// # Errors
    /// Stops at the first source error or out-of-range channel.
    pub fn from_events<I, E>(events: I, num_channels: usize) -> std::result::Result<Self, E>
    where
        I: IntoIterator<Item = std::result::Result<TimestampedEvent, E>>,
        E: From<Error>,
    {
        let mut spectrum = Self::new(num_channels);
        for event in events {
            spectrum.record(&event?)?;
        }
        Ok(spectrum)
    }

    /// Counts one event.
    ///
    /// # Errors
    /// Returns [`Error::ChannelOutOfRange`] if the energy is not a valid index.
    pub fn record(&mut self, event: &TimestampedEvent) -> Result<()> {
        let idx = channel_index(event.energy, self.counts.len())?;
        self.counts[idx] += 1.0;
        self.last_time = event.time;
        self.events += 1;
        Ok(())
    }

    /// Counts per channel.
    #[must_use]
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Timestamp of the last recorded event (ps).
    #[must_use]
    pub fn last_time(&self) -> u64 {
        self.last_time
    }

    /// Number of recorded events.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_updates_window_and_total() {
        let mut acc = ChannelAccumulators::new(8);
        acc.record(3, TofWindow::Inelastic).unwrap();
        acc.record(3, TofWindow::Capture).unwrap();
        acc.record(5, TofWindow::Epithermal).unwrap();

        assert_relative_eq!(acc.inelastic[3], 1.0);
        assert_relative_eq!(acc.capture[3], 1.0);
        assert_relative_eq!(acc.epithermal[5], 1.0);
        assert_relative_eq!(acc.total[3], 2.0);
        assert_relative_eq!(acc.total[5], 1.0);
        assert_relative_eq!(acc.total_counts(), 3.0);
        assert!(acc.is_consistent());
    }

    #[test]
    fn test_record_rejects_out_of_range_channel() {
        let mut acc = ChannelAccumulators::new(4);
        let err = acc.record(4, TofWindow::Inelastic).unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelOutOfRange {
                channel: 4,
                num_channels: 4
            }
        ));
        assert_relative_eq!(acc.total_counts(), 0.0);
    }

    #[test]
    fn test_downsample_sums_groups() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(downsample(&values, 2).unwrap(), vec![3.0, 7.0, 5.0]);
        assert_eq!(downsample(&values, 1).unwrap(), values.to_vec());
        assert_eq!(downsample(&values, 10).unwrap(), vec![15.0]);
        assert!(downsample(&values, 0).is_err());
    }

    #[test]
    fn test_accumulator_downsample_keeps_invariant() {
        let mut acc = ChannelAccumulators::new(16);
        for c in 0..16 {
            let window = match c % 3 {
                0 => TofWindow::Inelastic,
                1 => TofWindow::Epithermal,
                _ => TofWindow::Capture,
            };
            acc.record(c, window).unwrap();
        }

        let coarse = acc.downsample(4).unwrap();
        assert_eq!(coarse.num_channels(), 4);
        assert!(coarse.is_consistent());
        assert_relative_eq!(coarse.total_counts(), acc.total_counts());
    }

    #[test]
    fn test_scaled() {
        let mut acc = ChannelAccumulators::new(2);
        acc.record(1, TofWindow::Epithermal).unwrap();
        let rates = acc.scaled(0.5);
        assert_relative_eq!(rates.epithermal[1], 0.5);
        assert_relative_eq!(rates.total[1], 0.5);
    }

    #[test]
    fn test_window_accessor() {
        let mut acc = ChannelAccumulators::new(2);
        acc.record(0, TofWindow::Capture).unwrap();
        assert_eq!(acc.window(TofWindow::Capture), &[1.0, 0.0]);
        assert_eq!(acc.window(TofWindow::Inelastic), &[0.0, 0.0]);
    }

    #[test]
    fn test_total_spectrum() {
        let events = vec![
            Ok::<_, Error>(TimestampedEvent::new(100, 1)),
            Ok(TimestampedEvent::new(200, 1)),
            Ok(TimestampedEvent::new(300, 2)),
        ];
        let spectrum = TotalSpectrum::from_events(events, 4).unwrap();
        assert_eq!(spectrum.counts(), &[0.0, 2.0, 1.0, 0.0]);
        assert_eq!(spectrum.last_time(), 300);
        assert_eq!(spectrum.events(), 3);
    }

    #[test]
    fn test_total_spectrum_out_of_range() {
        let events = vec![Ok::<_, Error>(TimestampedEvent::new(100, 9))];
        assert!(TotalSpectrum::from_events(events, 4).is_err());
    }
}
