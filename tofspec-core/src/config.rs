//! Engine configuration: trigger threshold, time-of-flight windows and
//! spectrum size.

use crate::spectrum::TofWindow;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Pulse height at or above which a TTL record counts as a trigger.
pub const DEFAULT_PULSE_THRESHOLD: u32 = 150;
/// End of the inelastic window: 100 µs in ps.
pub const DEFAULT_EPITHERMAL_WINDOW_PS: u64 = 100_000_000;
/// End of the epithermal window: 150 µs in ps.
pub const DEFAULT_CAPTURE_WINDOW_PS: u64 = 150_000_000;
/// Channel count of the digitiser energy histogram.
pub const DEFAULT_NUM_CHANNELS: usize = 4096;

/// Picoseconds per second.
pub const PS_PER_SECOND: f64 = 1.0e12;

/// Converts a duration in microseconds to whole picoseconds.
///
/// # Errors
/// Returns [`Error::ConfigError`] for negative or non-finite input.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn micros_to_ps(micros: f64) -> Result<u64> {
    if !micros.is_finite() || micros < 0.0 {
        return Err(Error::ConfigError(format!(
            "invalid duration: {micros} µs"
        )));
    }
    Ok((micros * 1.0e6).round() as u64)
}

/// Converts a picosecond timestamp to seconds.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ps_to_seconds(ps: u64) -> f64 {
    ps as f64 / PS_PER_SECOND
}

/// Configuration for the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum pulse height of a real trigger (inclusive).
    pub pulse_threshold: u32,
    /// Time after a trigger (ps) below which a gamma is inelastic.
    pub epithermal_window_ps: u64,
    /// Time after a trigger (ps) below which a gamma is epithermal.
    pub capture_window_ps: u64,
    /// Number of energy channels in each accumulator.
    pub num_channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pulse_threshold: DEFAULT_PULSE_THRESHOLD,
            epithermal_window_ps: DEFAULT_EPITHERMAL_WINDOW_PS,
            capture_window_ps: DEFAULT_CAPTURE_WINDOW_PS,
            num_channels: DEFAULT_NUM_CHANNELS,
        }
    }
}

// On-disk schema. Windows are written in microseconds.
#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonConfig {
    trigger: JsonTrigger,
    windows: JsonWindows,
    spectrum: JsonSpectrum,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonTrigger {
    threshold: u32,
}

impl Default for JsonTrigger {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PULSE_THRESHOLD,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonWindows {
    epithermal_us: f64,
    capture_us: f64,
}

impl Default for JsonWindows {
    fn default() -> Self {
        Self {
            epithermal_us: 100.0,
            capture_us: 150.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonSpectrum {
    num_channels: usize,
}

impl Default for JsonSpectrum {
    fn default() -> Self {
        Self {
            num_channels: DEFAULT_NUM_CHANNELS,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trigger pulse threshold.
    #[must_use]
    pub fn with_pulse_threshold(mut self, threshold: u32) -> Self {
        self.pulse_threshold = threshold;
        self
    }

    /// Sets the end of the inelastic window (ps).
    #[must_use]
    pub fn with_epithermal_window_ps(mut self, window: u64) -> Self {
        self.epithermal_window_ps = window;
        self
    }

    /// Sets the end of the epithermal window (ps).
    #[must_use]
    pub fn with_capture_window_ps(mut self, window: u64) -> Self {
        self.capture_window_ps = window;
        self
    }

    /// Sets the number of energy channels.
    #[must_use]
    pub fn with_num_channels(mut self, num_channels: usize) -> Self {
        self.num_channels = num_channels;
        self
    }

    /// Loads configuration from a JSON file.
    ///
    /// Every section and field is optional; missing values keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an invalid configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let json: JsonConfig = serde_json::from_reader(BufReader::new(file))?;
        Self::from_json_config(json)
    }

    /// Loads configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON or describes an
    /// invalid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json)
    }

    fn from_json_config(json: JsonConfig) -> Result<Self> {
        let config = Self {
            pulse_threshold: json.trigger.threshold,
            epithermal_window_ps: micros_to_ps(json.windows.epithermal_us)?,
            capture_window_ps: micros_to_ps(json.windows.capture_us)?,
            num_channels: json.spectrum.num_channels,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the windows are ordered and the spectrum is non-empty.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.num_channels == 0 {
            return Err(Error::ConfigError(
                "spectrum must have at least one channel".to_string(),
            ));
        }
        if self.epithermal_window_ps > self.capture_window_ps {
            return Err(Error::ConfigError(format!(
                "epithermal window ({} ps) ends after capture window ({} ps)",
                self.epithermal_window_ps, self.capture_window_ps
            )));
        }
        Ok(())
    }

    /// Classifies a time-of-flight `dt` (ps after the governing trigger).
    #[inline]
    #[must_use]
    pub fn classify(&self, dt: u64) -> TofWindow {
        if dt < self.epithermal_window_ps {
            TofWindow::Inelastic
        } else if dt < self.capture_window_ps {
            TofWindow::Epithermal
        } else {
            TofWindow::Capture
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pulse_threshold, 150);
        assert_eq!(config.epithermal_window_ps, 100_000_000);
        assert_eq!(config.capture_window_ps, 150_000_000);
        assert_eq!(config.num_channels, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_classification_boundaries() {
        let config = EngineConfig::default();
        assert_eq!(config.classify(0), TofWindow::Inelastic);
        assert_eq!(config.classify(99_999_999), TofWindow::Inelastic);
        assert_eq!(config.classify(100_000_000), TofWindow::Epithermal);
        assert_eq!(config.classify(149_999_999), TofWindow::Epithermal);
        assert_eq!(config.classify(150_000_000), TofWindow::Capture);
        assert_eq!(config.classify(u64::MAX), TofWindow::Capture);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_pulse_threshold(10)
            .with_epithermal_window_ps(100)
            .with_capture_window_ps(150)
            .with_num_channels(64);

        assert_eq!(config.pulse_threshold, 10);
        assert_eq!(config.classify(99), TofWindow::Inelastic);
        assert_eq!(config.classify(120), TofWindow::Epithermal);
        assert_eq!(config.classify(200), TofWindow::Capture);
        assert_eq!(config.num_channels, 64);
    }

    #[test]
    fn test_json_loading() {
        let json = r#"{
            "trigger": { "threshold": 90 },
            "windows": { "epithermal_us": 80.0, "capture_us": 120.5 },
            "spectrum": { "num_channels": 1024 }
        }"#;

        let config = EngineConfig::from_json(json).expect("Failed to parse JSON");
        assert_eq!(config.pulse_threshold, 90);
        assert_eq!(config.epithermal_window_ps, 80_000_000);
        assert_eq!(config.capture_window_ps, 120_500_000);
        assert_eq!(config.num_channels, 1024);
    }

    #[test]
    fn test_json_partial_config() {
        let json = r#"{ "windows": { "capture_us": 200.0 } }"#;

        let config = EngineConfig::from_json(json).expect("Should parse partial config");
        assert_eq!(config.pulse_threshold, 150); // Default
        assert_eq!(config.epithermal_window_ps, 100_000_000); // Default
        assert_eq!(config.capture_window_ps, 200_000_000); // Changed
    }

    #[test]
    fn test_json_empty() {
        let config = EngineConfig::from_json("{}").expect("Should parse empty config");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_json_rejects_inverted_windows() {
        let json = r#"{ "windows": { "epithermal_us": 200.0, "capture_us": 150.0 } }"#;
        let err = EngineConfig::from_json(json).unwrap_err().to_string();
        assert!(err.contains("ends after"), "unexpected error: {err}");
    }

    #[test]
    fn test_json_rejects_zero_channels() {
        let json = r#"{ "spectrum": { "num_channels": 0 } }"#;
        assert!(EngineConfig::from_json(json).is_err());
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "trigger": {{ "threshold": 42 }} }}"#).unwrap();
        file.flush().unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pulse_threshold, 42);
    }

    #[test]
    fn test_micros_to_ps() {
        assert_eq!(micros_to_ps(100.0).unwrap(), 100_000_000);
        assert_eq!(micros_to_ps(0.5).unwrap(), 500_000);
        assert!(micros_to_ps(-1.0).is_err());
        assert!(micros_to_ps(f64::NAN).is_err());
    }

    #[test]
    fn test_ps_to_seconds() {
        assert_relative_eq!(ps_to_seconds(2_500_000_000_000), 2.5);
        assert_relative_eq!(ps_to_seconds(0), 0.0);
    }
}
