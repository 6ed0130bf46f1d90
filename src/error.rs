// Error types for the acoustic event detection core
//
// This module defines custom error types for configuration and spectral
// analysis failures, providing structured error handling with numeric
// error codes suitable for logging and caller-side dispatch.
//
// Design note: input defects (NaN samples, empty buffers) are NOT errors.
// They are sanitized at ingestion and detection continues, since one bad
// frame must not abort a whole segment. Errors here are reserved for
// conditions where silently proceeding would violate a core invariant
// (inverted hysteresis thresholds, degenerate filter banks).

use log::error;
use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling at the
/// orchestration boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=DetectorConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration defects
///
/// These must fail fast and loudly at configuration-construction time.
/// An inverted hysteresis pair or a negative duration range would silently
/// break event detection if allowed through.
///
/// Error code range: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Offset threshold must be strictly below the onset threshold (dB)
    ThresholdInverted { onset_db: f32, offset_db: f32 },

    /// Minimum event duration must be below the maximum
    InvalidDurationRange { min_ms: f32, max_ms: f32 },

    /// A target frequency band has low_hz >= high_hz
    InvalidBand { name: String, low_hz: f32, high_hz: f32 },

    /// Hop length must not exceed the window length
    InvalidFraming { window_ms: f32, hop_ms: f32 },

    /// Mel band count outside the supported range
    InvalidMelBands { bands: usize },

    /// FFT transform size must be non-zero
    InvalidFftSize { size: usize },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::ThresholdInverted { .. } => 1001,
            ConfigError::InvalidDurationRange { .. } => 1002,
            ConfigError::InvalidBand { .. } => 1003,
            ConfigError::InvalidFraming { .. } => 1004,
            ConfigError::InvalidMelBands { .. } => 1005,
            ConfigError::InvalidFftSize { .. } => 1006,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::ThresholdInverted { onset_db, offset_db } => {
                format!(
                    "Offset threshold ({} dB) must be below onset threshold ({} dB)",
                    offset_db, onset_db
                )
            }
            ConfigError::InvalidDurationRange { min_ms, max_ms } => {
                format!(
                    "Duration range invalid: min {} ms must be below max {} ms and non-negative",
                    min_ms, max_ms
                )
            }
            ConfigError::InvalidBand { name, low_hz, high_hz } => {
                format!(
                    "Band '{}' invalid: low {} Hz must be below high {} Hz",
                    name, low_hz, high_hz
                )
            }
            ConfigError::InvalidFraming { window_ms, hop_ms } => {
                format!(
                    "Hop length ({} ms) must not exceed window length ({} ms)",
                    hop_ms, window_ms
                )
            }
            ConfigError::InvalidMelBands { bands } => {
                format!("Mel band count {} outside supported range 64-128", bands)
            }
            ConfigError::InvalidFftSize { size } => {
                format!("FFT size {} must be non-zero", size)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {}

/// Spectral analysis failures
///
/// Error code range: 2001-2002
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralError {
    /// Mel filter bank weights sum to ~0, which signals a construction
    /// bug (bad band edges or sample rate) and must not silently proceed
    FilterBankDegenerate { total_weight: f32 },

    /// Sample rate must be positive to map bins to frequencies
    InvalidSampleRate { sample_rate: u32 },
}

impl ErrorCode for SpectralError {
    fn code(&self) -> i32 {
        match self {
            SpectralError::FilterBankDegenerate { .. } => 2001,
            SpectralError::InvalidSampleRate { .. } => 2002,
        }
    }

    fn message(&self) -> String {
        match self {
            SpectralError::FilterBankDegenerate { total_weight } => {
                format!(
                    "Mel filter bank is degenerate: total weight {} is effectively zero",
                    total_weight
                )
            }
            SpectralError::InvalidSampleRate { sample_rate } => {
                format!("Sample rate {} Hz is not usable", sample_rate)
            }
        }
    }
}

impl fmt::Display for SpectralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpectralError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for SpectralError {}

/// Top-level detection error, unifying the failure categories that can
/// escape `EventDetector`
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    Config(ConfigError),
    Spectral(SpectralError),
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::Config(e) => e.code(),
            DetectionError::Spectral(e) => e.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::Config(e) => e.message(),
            DetectionError::Spectral(e) => e.message(),
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::Config(e) => write!(f, "{}", e),
            DetectionError::Spectral(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DetectionError {}

impl From<ConfigError> for DetectionError {
    fn from(err: ConfigError) -> Self {
        DetectionError::Config(err)
    }
}

impl From<SpectralError> for DetectionError {
    fn from(err: SpectralError) -> Self {
        DetectionError::Spectral(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        assert_eq!(
            ConfigError::ThresholdInverted {
                onset_db: 6.0,
                offset_db: 12.0
            }
            .code(),
            1001
        );
        assert_eq!(
            ConfigError::InvalidDurationRange {
                min_ms: 500.0,
                max_ms: 100.0
            }
            .code(),
            1002
        );
        assert_eq!(ConfigError::InvalidMelBands { bands: 12 }.code(), 1005);
    }

    #[test]
    fn test_spectral_error_codes() {
        assert_eq!(
            SpectralError::FilterBankDegenerate { total_weight: 0.0 }.code(),
            2001
        );
        assert_eq!(
            SpectralError::InvalidSampleRate { sample_rate: 0 }.code(),
            2002
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::ThresholdInverted {
            onset_db: 6.0,
            offset_db: 12.0,
        };
        assert!(err.message().contains("must be below onset"));

        let err = SpectralError::FilterBankDegenerate { total_weight: 1e-9 };
        assert!(err.message().contains("degenerate"));
    }

    #[test]
    fn test_detection_error_wrapping() {
        let err: DetectionError = ConfigError::InvalidFftSize { size: 0 }.into();
        assert_eq!(err.code(), 1006);

        let err: DetectionError =
            SpectralError::InvalidSampleRate { sample_rate: 0 }.into();
        assert_eq!(err.code(), 2002);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), ConfigError> {
            Err(ConfigError::InvalidFftSize { size: 0 })
        }

        fn caller() -> Result<(), DetectionError> {
            may_fail()?;
            Ok(())
        }

        assert!(caller().is_err());
    }
}
