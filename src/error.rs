use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration. Raised when a component is built, never mid-stream.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("onset band {index} is invalid: [{lo}, {hi}) Hz")]
    InvalidBand { index: usize, lo: f32, hi: f32 },

    #[error("sample rate must be positive")]
    ZeroSampleRate,
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: &'static str,
        expected: &'static str,
        value: impl ToString,
    ) -> Self {
        ConfigError::OutOfRange {
            field,
            expected,
            value: value.to_string(),
        }
    }
}

/// Failure to load a reference note sequence as a whole.
///
/// Individual malformed events never produce this; they are skipped while the
/// index is built.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read reference file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse MIDI data: {0}")]
    Midi(#[from] midly::Error),

    #[error("unsupported MIDI timing: {0}")]
    UnsupportedTiming(String),
}
