// Continuous parameter adaptation and cross-interval smoothing
//
// There are no discrete presets: every parameter is a smooth function of
// the profile's scalar estimates, further adjusted by the continuous
// environment factors. The offset threshold is always exactly half the
// onset threshold in dB, which keeps the 2:1 hysteresis ratio (and the
// offset < onset invariant) no matter what the inputs were.

use serde::{Deserialize, Serialize};

use super::AudioProfile;
use crate::config::{DetectionConfig, FrequencyBand};

/// Below this profile confidence the adaptation is ignored and the
/// conservative defaults below are used instead
pub const MIN_ADAPTATION_CONFIDENCE: f32 = 0.3;

/// Conservative defaults for low-confidence profiles
pub const CONSERVATIVE_ONSET_DB: f32 = 15.0;
pub const CONSERVATIVE_BASELINE_WINDOW_SEC: f32 = 60.0;
pub const CONSERVATIVE_MIN_DURATION_MS: f32 = 80.0;
pub const CONSERVATIVE_MERGE_GAP_MS: f32 = 100.0;
pub const CONSERVATIVE_NOVELTY_SIGMA: f32 = 3.0;

/// Onset threshold clamp range in dB
const ONSET_DB_RANGE: (f32, f32) = (4.0, 24.0);

/// Baseline window clamp range in seconds
const BASELINE_WINDOW_RANGE: (f32, f32) = (30.0, 120.0);

/// Live detection parameters after profile-driven adaptation
///
/// Invariant: offset_threshold_db < onset_threshold_db, maintained by
/// construction (offset is always onset / 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptedConfig {
    pub baseline_window_sec: f32,
    pub onset_threshold_db: f32,
    pub offset_threshold_db: f32,
    pub merge_gap_ms: f32,
    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    pub min_confidence: f32,
    pub novelty_sigma: f32,
    pub bands: Vec<FrequencyBand>,
}

impl AdaptedConfig {
    /// Pass-through adaptation: the base config unchanged
    pub fn from_base(base: &DetectionConfig) -> Self {
        Self {
            baseline_window_sec: base.baseline_window_sec.clamp(
                BASELINE_WINDOW_RANGE.0,
                BASELINE_WINDOW_RANGE.1,
            ),
            onset_threshold_db: base.onset_threshold_db,
            offset_threshold_db: base.offset_threshold_db,
            merge_gap_ms: base.merge_gap_ms,
            min_duration_ms: base.min_duration_ms,
            max_duration_ms: base.max_duration_ms,
            min_confidence: base.min_confidence,
            novelty_sigma: base.novelty_sigma,
            bands: base.bands.clone(),
        }
    }

    /// Conservative defaults used when the profile can't be trusted
    pub fn conservative(base: &DetectionConfig) -> Self {
        Self {
            baseline_window_sec: CONSERVATIVE_BASELINE_WINDOW_SEC,
            onset_threshold_db: CONSERVATIVE_ONSET_DB,
            offset_threshold_db: CONSERVATIVE_ONSET_DB / 2.0,
            merge_gap_ms: CONSERVATIVE_MERGE_GAP_MS,
            min_duration_ms: CONSERVATIVE_MIN_DURATION_MS,
            max_duration_ms: base.max_duration_ms,
            min_confidence: base.min_confidence.max(0.25),
            novelty_sigma: CONSERVATIVE_NOVELTY_SIGMA,
            bands: base.bands.clone(),
        }
    }

    /// Adapt detection parameters to the profiled environment
    ///
    /// Low-confidence profiles fall back to `conservative` rather than
    /// extrapolating from unreliable statistics.
    pub fn adapt(profile: &AudioProfile, base: &DetectionConfig) -> Self {
        if profile.confidence < MIN_ADAPTATION_CONFIDENCE {
            log::info!(
                "[Adapt] Profile confidence {:.2} below {:.2}, using conservative defaults",
                profile.confidence,
                MIN_ADAPTATION_CONFIDENCE
            );
            return Self::conservative(base);
        }

        let f = &profile.factors;
        let norm_var = (profile.variability / 2.0).clamp(0.0, 1.0);

        // Baseline window: monotone in (1 - variability). Stable scenes
        // afford long noise memory; volatile scenes need it short.
        let baseline_window_sec = (BASELINE_WINDOW_RANGE.0
            + (BASELINE_WINDOW_RANGE.1 - BASELINE_WINDOW_RANGE.0) * (1.0 - norm_var))
            .clamp(BASELINE_WINDOW_RANGE.0, BASELINE_WINDOW_RANGE.1);

        // Onset threshold: smooth in SNR, +-20% variability multiplier,
        // additive environment adjustments
        let snr_component = 6.0 + 0.15 * (profile.snr_db + 20.0);
        let variability_multiplier = 1.0 + 0.2 * (2.0 * norm_var - 1.0);
        let factor_adjustment_db =
            3.0 * f.noise + 2.0 * f.wind + 1.0 * f.urban - 1.5 * f.bird_activity;
        let onset_threshold_db = (snr_component * variability_multiplier
            + factor_adjustment_db)
            .clamp(ONSET_DB_RANGE.0, ONSET_DB_RANGE.1);

        // Fixed 2:1 hysteresis ratio in dB terms
        let offset_threshold_db = onset_threshold_db / 2.0;

        // Busy scenes: shorter merge gap so distinct calls stay distinct;
        // noisy scenes: slightly longer to bridge masked dips
        let merge_gap_ms = (base.merge_gap_ms * (1.0 - 0.4 * f.bird_activity + 0.2 * f.noise))
            .clamp(20.0, 300.0);

        // Noise lengthens the minimum credible event
        let min_duration_ms = (base.min_duration_ms * (1.0 + f.noise))
            .min(base.max_duration_ms * 0.5);

        let novelty_sigma = base.novelty_sigma * (1.0 + 0.5 * f.noise);

        // Frequency shifts: wind pushes the low band's floor up, insects
        // extend the top band's ceiling
        let mut bands = base.bands.clone();
        if let Some(low) = bands.first_mut() {
            low.low_hz += 300.0 * f.wind;
        }
        if let Some(high) = bands.last_mut() {
            high.high_hz += 2000.0 * f.insect;
        }

        Self {
            baseline_window_sec,
            onset_threshold_db,
            offset_threshold_db,
            merge_gap_ms,
            min_duration_ms,
            max_duration_ms: base.max_duration_ms,
            min_confidence: base.min_confidence,
            novelty_sigma,
            bands,
        }
    }

    /// Exponentially smooth toward a freshly adapted candidate
    ///
    /// Numeric parameters blend as old*(1-alpha) + candidate*alpha.
    /// Structural parameters (the band list) switch only when alpha
    /// exceeds 0.5, to avoid flip-flopping between re-analysis intervals.
    pub fn blend(&self, candidate: &AdaptedConfig, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        let lerp = |old: f32, new: f32| old * (1.0 - alpha) + new * alpha;

        let onset_threshold_db = lerp(self.onset_threshold_db, candidate.onset_threshold_db);

        Self {
            baseline_window_sec: lerp(self.baseline_window_sec, candidate.baseline_window_sec),
            onset_threshold_db,
            // Re-derive rather than blend so the 2:1 ratio survives
            offset_threshold_db: onset_threshold_db / 2.0,
            merge_gap_ms: lerp(self.merge_gap_ms, candidate.merge_gap_ms),
            min_duration_ms: lerp(self.min_duration_ms, candidate.min_duration_ms),
            max_duration_ms: lerp(self.max_duration_ms, candidate.max_duration_ms),
            min_confidence: lerp(self.min_confidence, candidate.min_confidence),
            novelty_sigma: lerp(self.novelty_sigma, candidate.novelty_sigma),
            bands: if alpha > 0.5 {
                candidate.bands.clone()
            } else {
                self.bands.clone()
            },
        }
    }
}
