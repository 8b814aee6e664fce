//! Error handling for the ECG acquisition pipeline
//!
//! Every fallible operation in the workspace reports an [`EcgError`]. The
//! numeric core itself never fails once constructed; errors come from
//! configuration, signal sources and record emitters.

use core::fmt;

/// Result type alias for ECG pipeline operations
pub type EcgResult<T> = Result<T, EcgError>;

/// Error type for all ECG pipeline operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EcgError {
    /// Sample rate rejected at construction
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f32,
        /// Valid range description
        valid_range: String,
    },

    /// Configuration rejected at construction
    ConfigurationError {
        /// Description of the configuration error
        message: String,
    },

    /// Channel index outside the two acquired channels
    InvalidChannel {
        /// Requested channel index
        index: usize,
    },

    /// Signal source failed to deliver a sample
    SourceError {
        /// Description of the source failure
        message: String,
    },

    /// Signal source has no more samples (end of a recorded or piped stream)
    SourceExhausted,

    /// Record emitter failed to write a record
    EmitError {
        /// Description of the emitter failure
        message: String,
    },

    /// Record consumer has gone away
    EmitterClosed,
}

impl fmt::Display for EcgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcgError::InvalidSamplingRate { rate, valid_range } => {
                write!(f, "Invalid sampling rate: {}Hz, valid range: {}", rate, valid_range)
            }
            EcgError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            EcgError::InvalidChannel { index } => {
                write!(f, "Invalid channel index {} (expected 0 or 1)", index)
            }
            EcgError::SourceError { message } => {
                write!(f, "Signal source error: {}", message)
            }
            EcgError::SourceExhausted => write!(f, "Signal source exhausted"),
            EcgError::EmitError { message } => {
                write!(f, "Record emitter error: {}", message)
            }
            EcgError::EmitterClosed => write!(f, "Record consumer closed"),
        }
    }
}

impl std::error::Error for EcgError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::EcgError::ConfigurationError {
            message: format!($($arg)+),
        }
    };
}
