//! Configuration for the acoustic event detection core
//!
//! All parameters are plain serde structs with documented defaults; the
//! core has no environment-variable or CLI surface of its own. Configs can
//! be loaded from a JSON file for fast iteration without recompilation,
//! falling back to defaults when the file is missing or malformed.
//!
//! Validation is explicit and fails fast: an inverted hysteresis threshold
//! pair or a negative duration range would silently invert the detection
//! invariants if allowed through construction.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// A named target frequency band for per-band energy detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low_hz: f32,
    pub high_hz: f32,
}

impl FrequencyBand {
    pub fn new(name: &str, low_hz: f32, high_hz: f32) -> Self {
        Self {
            name: name.to_string(),
            low_hz,
            high_hz,
        }
    }

    /// Band center frequency in Hz
    pub fn center_hz(&self) -> f32 {
        0.5 * (self.low_hz + self.high_hz)
    }
}

/// Spectral frontend parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Analysis window length in milliseconds
    pub window_ms: f32,
    /// Hop between consecutive frames in milliseconds
    pub hop_ms: f32,
    /// Transform size in samples; frames shorter than this are zero-padded.
    /// Power-of-two sizes use the radix-2 FFT, others the direct DFT.
    pub fft_size: usize,
    /// Number of mel bands (64-128)
    pub mel_bands: usize,
    /// Apply ln(x + eps) to the mel grid for scale stability
    pub log_transform: bool,
    /// Apply per-band z-score whitening over the segment's own frames
    pub whiten: bool,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            window_ms: 25.0,
            hop_ms: 5.0,
            fft_size: 1024,
            mel_bands: 96,
            log_transform: true,
            whiten: true,
        }
    }
}

/// Detection thresholds and event shape limits
///
/// Threshold values are in dB relative to the rolling baseline and convert
/// to multiplicative linear factors, never additive offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Onset threshold above baseline in dB; crossing it starts an event
    pub onset_threshold_db: f32,
    /// Offset threshold above baseline in dB; dropping below it ends an
    /// event. Must be strictly below the onset threshold.
    pub offset_threshold_db: f32,
    /// Rolling baseline window in seconds (30-120)
    pub baseline_window_sec: f32,
    /// Events shorter than this are discarded
    pub min_duration_ms: f32,
    /// Events longer than this are discarded
    pub max_duration_ms: f32,
    /// Candidates closer than this merge into one event
    pub merge_gap_ms: f32,
    /// Confidence floor for the final filter
    pub min_confidence: f32,
    /// Sigma multiplier for the novelty peak-picking threshold
    pub novelty_sigma: f32,
    /// Target frequency bands for per-band energy detection
    pub bands: Vec<FrequencyBand>,
}

impl DetectionConfig {
    /// Default target bands covering the typical bioacoustic range
    pub fn default_bands() -> Vec<FrequencyBand> {
        vec![
            FrequencyBand::new("low_freq", 100.0, 1000.0),
            FrequencyBand::new("mid_freq", 1000.0, 8000.0),
            FrequencyBand::new("high_freq", 8000.0, 16000.0),
        ]
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            onset_threshold_db: 12.0,
            offset_threshold_db: 6.0,
            baseline_window_sec: 60.0,
            min_duration_ms: 50.0,
            max_duration_ms: 10_000.0,
            merge_gap_ms: 100.0,
            min_confidence: 0.2,
            novelty_sigma: 2.5,
            bands: Self::default_bands(),
        }
    }
}

/// Long-buffer chunking and re-profiling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Buffers longer than this are processed in chunks of this length
    pub chunk_sec: f32,
    /// Overlap between consecutive chunks
    pub overlap_sec: f32,
    /// Re-run the audio profiler every this many seconds of audio
    pub reprofile_interval_sec: f32,
    /// Seam merge only considers events whose band bounds are within this
    /// tolerance across the chunk boundary
    pub boundary_band_tolerance_hz: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_sec: 120.0,
            overlap_sec: 1.0,
            reprofile_interval_sec: 60.0,
            boundary_band_tolerance_hz: 500.0,
        }
    }
}

/// Cross-segment deduplication parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Minimum temporal IoU for two events to be duplicates
    pub temporal_iou_threshold: f32,
    /// Minimum frequency IoU for two events to be duplicates
    pub frequency_iou_threshold: f32,
    /// Only events starting within this window of each other are compared
    pub lookback_ms: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            temporal_iou_threshold: 0.5,
            frequency_iou_threshold: 0.5,
            lookback_ms: 5000.0,
        }
    }
}

/// Complete detector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub spectral: SpectralConfig,
    pub detection: DetectionConfig,
    pub chunking: ChunkingConfig,
    pub dedup: DedupConfig,
}

impl DetectorConfig {
    /// Load configuration from a JSON file, falling back to defaults on
    /// any read or parse failure
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Validate all invariants that detection relies on
    ///
    /// # Returns
    /// * `Ok(())` - Configuration is usable
    /// * `Err(ConfigError)` - First violated invariant
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.offset_threshold_db >= self.detection.onset_threshold_db {
            return Err(ConfigError::ThresholdInverted {
                onset_db: self.detection.onset_threshold_db,
                offset_db: self.detection.offset_threshold_db,
            });
        }

        if self.detection.min_duration_ms < 0.0
            || self.detection.min_duration_ms >= self.detection.max_duration_ms
        {
            return Err(ConfigError::InvalidDurationRange {
                min_ms: self.detection.min_duration_ms,
                max_ms: self.detection.max_duration_ms,
            });
        }

        for band in &self.detection.bands {
            if band.low_hz >= band.high_hz || band.low_hz < 0.0 {
                return Err(ConfigError::InvalidBand {
                    name: band.name.clone(),
                    low_hz: band.low_hz,
                    high_hz: band.high_hz,
                });
            }
        }

        if self.spectral.hop_ms <= 0.0
            || self.spectral.window_ms <= 0.0
            || self.spectral.hop_ms > self.spectral.window_ms
        {
            return Err(ConfigError::InvalidFraming {
                window_ms: self.spectral.window_ms,
                hop_ms: self.spectral.hop_ms,
            });
        }

        if !(64..=128).contains(&self.spectral.mel_bands) {
            return Err(ConfigError::InvalidMelBands {
                bands: self.spectral.mel_bands,
            });
        }

        if self.spectral.fft_size == 0 {
            return Err(ConfigError::InvalidFftSize {
                size: self.spectral.fft_size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.bands.len(), 3);
        assert_eq!(config.detection.bands[1].name, "mid_freq");
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = DetectorConfig::default();
        config.detection.onset_threshold_db = 6.0;
        config.detection.offset_threshold_db = 12.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdInverted { .. })
        ));
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let mut config = DetectorConfig::default();
        config.detection.offset_threshold_db = config.detection.onset_threshold_db;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_duration_range_rejected() {
        let mut config = DetectorConfig::default();
        config.detection.min_duration_ms = 5000.0;
        config.detection.max_duration_ms = 100.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDurationRange { .. })
        ));
    }

    #[test]
    fn test_invalid_band_rejected() {
        let mut config = DetectorConfig::default();
        config.detection.bands.push(FrequencyBand::new("bad", 9000.0, 2000.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBand { .. })
        ));
    }

    #[test]
    fn test_mel_band_range_enforced() {
        let mut config = DetectorConfig::default();
        config.spectral.mel_bands = 32;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMelBands { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = DetectorConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: DetectorConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            parsed.detection.onset_threshold_db,
            config.detection.onset_threshold_db
        );
        assert_eq!(parsed.spectral.mel_bands, config.spectral.mel_bands);
        assert_eq!(parsed.detection.bands, config.detection.bands);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = DetectorConfig::load_from_file("/nonexistent/aed_config.json");
        assert!(config.validate().is_ok());
    }
}
