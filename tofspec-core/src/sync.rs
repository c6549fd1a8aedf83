//! Pulse/gamma stream synchronization and time-of-flight classification.
//!
//! The engine pulls gamma events one at a time and keeps the pulse buffer's
//! `current` slot on the latest trigger that is not later than the gamma.
//! Both streams are read strictly forward, once, through their own
//! [`LookaheadBuffer`], so a glitch in one stream never moves the other.

use crate::config::{ps_to_seconds, EngineConfig};
use crate::lookahead::{Advance, Glitch, LookaheadBuffer};
use crate::record::{PulseRecord, Stream, TimestampedEvent};
use crate::spectrum::{ChannelAccumulators, TofWindow};
use crate::Error;
use serde::Serialize;

/// What happened to one gamma event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The event was tallied.
    Classified {
        event: TimestampedEvent,
        /// Time of the governing trigger (ps).
        trigger: u64,
        /// Time of flight since the trigger (ps).
        dt: u64,
        window: TofWindow,
    },
    /// The event came before the first usable trigger and was dropped.
    PreTrigger(TimestampedEvent),
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatistics {
    /// Gamma events tallied into the spectra.
    pub classified: u64,
    /// Gamma events dropped for preceding the first trigger.
    pub pre_trigger: u64,
    /// Out-of-order gamma records discarded.
    pub gamma_glitches: u64,
    /// Out-of-order pulse records discarded.
    pub pulse_glitches: u64,
    /// Times the trigger pointer moved forward after priming.
    pub trigger_advances: u64,
    /// Timestamp of the last tallied gamma event (ps).
    pub max_observed_time_ps: u64,
}

/// Final output of a [`SyncEngine`] run.
#[derive(Debug, Clone)]
pub struct SplitSpectrum {
    pub spectrum: ChannelAccumulators,
    /// Timestamp of the last tallied gamma event (ps).
    pub max_observed_time: u64,
    pub statistics: SyncStatistics,
    /// Every discarded record, pulse stream first.
    pub glitches: Vec<Glitch>,
}

impl SplitSpectrum {
    /// Live time of the run in seconds.
    #[must_use]
    pub fn live_seconds(&self) -> f64 {
        ps_to_seconds(self.max_observed_time)
    }
}

/// Synchronizes a trigger-pulse source with a gamma source.
///
/// Sources are iterators of `Result<record, E>`; the pulse source must already
/// be filtered down to trigger pulses (see [`PulseRecord::is_trigger`]).
pub struct SyncEngine<P, G> {
    config: EngineConfig,
    pulses: P,
    gammas: G,
    pulse: LookaheadBuffer<PulseRecord>,
    gamma: LookaheadBuffer<TimestampedEvent>,
    spectrum: ChannelAccumulators,
    max_observed_time: u64,
    classified: u64,
    pre_trigger: u64,
    trigger_advances: u64,
}

impl<P, G, E> SyncEngine<P, G>
where
    P: Iterator<Item = Result<PulseRecord, E>>,
    G: Iterator<Item = Result<TimestampedEvent, E>>,
    E: From<Error>,
{
    /// Validates `config` and primes both buffers.
    ///
    /// Priming advances the pulse buffer until it publishes a trigger (or the
    /// pulse source ends) and loads the first gamma event into the gamma
    /// lookahead.
    ///
    /// # Errors
    /// Returns an error for an invalid configuration or if either source
    /// yields an error while priming.
    pub fn new(config: EngineConfig, pulses: P, gammas: G) -> Result<Self, E> {
        config.validate()?;
        let spectrum = ChannelAccumulators::new(config.num_channels);

        let mut engine = Self {
            config,
            pulses,
            gammas,
            pulse: LookaheadBuffer::new(Stream::Pulse),
            gamma: LookaheadBuffer::new(Stream::Gamma),
            spectrum,
            max_observed_time: 0,
            classified: 0,
            pre_trigger: 0,
            trigger_advances: 0,
        };
        engine.prime()?;
        Ok(engine)
    }

    fn prime(&mut self) -> Result<(), E> {
        while !self.pulse.is_primed() && !self.pulse.is_exhausted() {
            self.pulse.advance(&mut self.pulses)?;
        }
        match (self.pulse.current(), self.pulse.next()) {
            (Some(current), next) => log::debug!(
                "primed trigger at {} ps, next at {:?} ps",
                current.time,
                next.map(|p| p.time)
            ),
            (None, _) => log::warn!(
                "no trigger pulses at or above threshold {}; all gamma events will be discarded",
                self.config.pulse_threshold
            ),
        }

        self.gamma.advance(&mut self.gammas)?;
        Ok(())
    }

    /// Processes the next gamma event.
    ///
    /// Returns `Ok(None)` once the gamma source is exhausted.
    ///
    /// # Errors
    /// Returns an error if a source yields one or the event's energy is not a
    /// valid channel. Either is fatal for the run.
    pub fn step(&mut self) -> Result<Option<Step>, E> {
        if self.gamma.advance(&mut self.gammas)? == Advance::Exhausted {
            return Ok(None);
        }
        let Some(&event) = self.gamma.current() else {
            return Ok(None);
        };

        let mut trigger = match self.pulse.current() {
            Some(pulse) if event.time >= pulse.time => pulse.time,
            _ => {
                self.pre_trigger += 1;
                return Ok(Some(Step::PreTrigger(event)));
            }
        };

        // A gap in the gamma stream can span several triggers.
        while !self.pulse.is_exhausted() && self.pulse.next().is_some_and(|p| event.time >= p.time)
        {
            let advance = self.pulse.advance(&mut self.pulses)?;
            if advance == Advance::Drained {
                log::info!(
                    "pulse stream ended; last trigger at {} ps governs the remaining gammas",
                    self.pulse.current().map_or(0, |p| p.time)
                );
            }
            if let Some(pulse) = self.pulse.current() {
                trigger = pulse.time;
                self.trigger_advances += 1;
            }
        }

        let dt = event.time - trigger;
        let window = self.config.classify(dt);
        self.spectrum.record(event.energy, window)?;
        self.max_observed_time = event.time;
        self.classified += 1;

        Ok(Some(Step::Classified {
            event,
            trigger,
            dt,
            window,
        }))
    }

    /// Processes every remaining gamma event and returns the spectra.
    ///
    /// # Errors
    /// Returns the first fatal error; no partial spectrum is produced.
    pub fn run(mut self) -> Result<SplitSpectrum, E> {
        while self.step()?.is_some() {}
        let result = self.finish();

        log::info!(
            "classified {} gamma events up to {:.3} s ({} pre-trigger, {} gamma / {} pulse glitches)",
            result.statistics.classified,
            result.live_seconds(),
            result.statistics.pre_trigger,
            result.statistics.gamma_glitches,
            result.statistics.pulse_glitches
        );
        Ok(result)
    }
}

impl<P, G> SyncEngine<P, G> {
    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Accumulated spectra so far.
    #[must_use]
    pub fn spectrum(&self) -> &ChannelAccumulators {
        &self.spectrum
    }

    /// Timestamp of the last tallied gamma event (ps).
    #[must_use]
    pub fn max_observed_time(&self) -> u64 {
        self.max_observed_time
    }

    /// Trigger-pulse buffer state.
    #[must_use]
    pub fn pulse_buffer(&self) -> &LookaheadBuffer<PulseRecord> {
        &self.pulse
    }

    /// Gamma buffer state.
    #[must_use]
    pub fn gamma_buffer(&self) -> &LookaheadBuffer<TimestampedEvent> {
        &self.gamma
    }

    /// Snapshot of the run counters.
    #[must_use]
    pub fn statistics(&self) -> SyncStatistics {
        SyncStatistics {
            classified: self.classified,
            pre_trigger: self.pre_trigger,
            gamma_glitches: self.gamma.glitches().len() as u64,
            pulse_glitches: self.pulse.glitches().len() as u64,
            trigger_advances: self.trigger_advances,
            max_observed_time_ps: self.max_observed_time,
        }
    }

    /// Consumes the engine, returning what has been accumulated.
    #[must_use]
    pub fn finish(self) -> SplitSpectrum {
        let statistics = self.statistics();
        let mut glitches = self.pulse.glitches().to_vec();
        glitches.extend_from_slice(self.gamma.glitches());
        SplitSpectrum {
            spectrum: self.spectrum,
            max_observed_time: self.max_observed_time,
            statistics,
            glitches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Records<T> = std::vec::IntoIter<Result<T, Error>>;

    fn pulses(times: &[u64]) -> Records<PulseRecord> {
        times
            .iter()
            .map(|&t| Ok(PulseRecord::new(t, 200)))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn gammas(events: &[(u64, u32)]) -> Records<TimestampedEvent> {
        events
            .iter()
            .map(|&(t, e)| Ok(TimestampedEvent::new(t, e)))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn small_windows() -> EngineConfig {
        EngineConfig::new()
            .with_epithermal_window_ps(100)
            .with_capture_window_ps(150)
            .with_num_channels(64)
    }

    #[test]
    fn test_priming_publishes_first_trigger() {
        let engine =
            SyncEngine::new(small_windows(), pulses(&[1000, 5000]), gammas(&[(1050, 1)])).unwrap();

        assert_eq!(engine.pulse_buffer().current().map(|p| p.time), Some(1000));
        assert_eq!(engine.pulse_buffer().next().map(|p| p.time), Some(5000));
        assert!(!engine.gamma_buffer().is_primed());
        assert_eq!(engine.gamma_buffer().next().map(|g| g.time), Some(1050));
    }

    #[test]
    fn test_step_reports_classification() {
        let mut engine = SyncEngine::new(
            small_windows(),
            pulses(&[1000, 5000]),
            gammas(&[(1050, 10)]),
        )
        .unwrap();

        let step = engine.step().unwrap();
        assert_eq!(
            step,
            Some(Step::Classified {
                event: TimestampedEvent::new(1050, 10),
                trigger: 1000,
                dt: 50,
                window: TofWindow::Inelastic,
            })
        );
        assert_eq!(engine.step().unwrap(), None);
        assert_eq!(engine.step().unwrap(), None);
    }

    #[test]
    fn test_single_trigger_pulse() {
        let result = SyncEngine::new(small_windows(), pulses(&[1000]), gammas(&[(1120, 3)]))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(result.spectrum.epithermal[3], 1.0);
        assert_eq!(result.statistics.classified, 1);
    }

    #[test]
    fn test_no_triggers_discards_everything() {
        let result = SyncEngine::new(small_windows(), pulses(&[]), gammas(&[(10, 1), (20, 2)]))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(result.statistics.classified, 0);
        assert_eq!(result.statistics.pre_trigger, 2);
        assert_eq!(result.spectrum.total_counts(), 0.0);
        assert_eq!(result.max_observed_time, 0);
    }

    #[test]
    fn test_empty_gamma_stream() {
        let result = SyncEngine::new(small_windows(), pulses(&[100, 200]), gammas(&[]))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(result.statistics, SyncStatistics::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = small_windows().with_num_channels(0);
        let result = SyncEngine::new(config, pulses(&[100]), gammas(&[]));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_out_of_range_channel_is_fatal() {
        let result = SyncEngine::new(small_windows(), pulses(&[100, 200]), gammas(&[(150, 64)]))
            .unwrap()
            .run();
        assert!(matches!(
            result,
            Err(Error::ChannelOutOfRange {
                channel: 64,
                num_channels: 64
            })
        ));
    }

    #[test]
    fn test_source_error_aborts_run() {
        let gamma_source = vec![
            Ok(TimestampedEvent::new(150, 1)),
            Err(Error::ConfigError("bad row".to_string())),
            Ok(TimestampedEvent::new(160, 1)),
        ];
        let result =
            SyncEngine::new(small_windows(), pulses(&[100, 200]), gamma_source.into_iter())
                .unwrap()
                .run();
        assert!(result.is_err());
    }

    #[test]
    fn test_live_seconds() {
        let result = SyncEngine::new(
            EngineConfig::default(),
            pulses(&[0, 1_000_000_000_000]),
            gammas(&[(2_000_000_000_000, 5)]),
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(result.max_observed_time, 2_000_000_000_000);
        approx::assert_relative_eq!(result.live_seconds(), 2.0);
    }
}
