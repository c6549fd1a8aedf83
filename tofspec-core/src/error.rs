//! Error types for tofspec-core.

use thiserror::Error;

/// Result type alias for tofspec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for spectrum splitting.
#[derive(Error, Debug)]
pub enum Error {
    /// Event energy does not address a spectrum channel.
    #[error("channel {channel} out of range (spectrum has {num_channels} channels)")]
    ChannelOutOfRange { channel: u32, num_channels: usize },

    /// Invalid engine or output configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Configuration file could not be decoded.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
