// Audio profiler - environment estimation from a representative window
//
// Estimates SNR (outlier-robust), temporal variability, dominant frequency
// content and a composite environment description from one FeatureBundle.
// The resulting AudioProfile drives the continuous parameter adaptation in
// the `adapt` submodule; the categorical environment label exists purely
// for logging and diagnostics and never gates correctness.
//
// Module organization:
// - mod.rs: AudioProfile, Environment, AudioProfiler
// - adapt: AdaptedConfig, continuous adaptation, exponential smoothing

pub mod adapt;

pub use adapt::AdaptedConfig;

use crate::spectral::{FeatureBundle, POWER_FLOOR};
use std::fmt;

/// Modified Z-score cutoff for outlier rejection
const OUTLIER_Z_THRESHOLD: f32 = 3.5;

/// MAD-to-sigma consistency factor for normal data
const MAD_SCALE: f32 = 1.4826;

/// Percentiles used for the noise floor and signal level estimates
const NOISE_PERCENTILE: f32 = 0.10;
const SIGNAL_PERCENTILE: f32 = 0.90;

/// Closed set of environment labels, for logging only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    VeryNoisy,
    VeryQuiet,
    DawnChorus,
    InsectDominated,
    WindDominated,
    ModerateActivity,
    MixedEnvironment,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::VeryNoisy => "very_noisy",
            Environment::VeryQuiet => "very_quiet",
            Environment::DawnChorus => "dawn_chorus",
            Environment::InsectDominated => "insect_dominated",
            Environment::WindDominated => "wind_dominated",
            Environment::ModerateActivity => "moderate_activity",
            Environment::MixedEnvironment => "mixed_environment",
        };
        write!(f, "{}", name)
    }
}

/// Continuous environment factors, each in [0, 1] and not mutually
/// exclusive; these, not the label, feed the parameter adaptation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentFactors {
    pub noise: f32,
    pub wind: f32,
    pub insect: f32,
    pub bird_activity: f32,
    pub urban: f32,
}

/// Estimated acoustic environment for one analysis window
#[derive(Debug, Clone)]
pub struct AudioProfile {
    /// Signal-to-noise ratio in dB, clamped to [-20, 60]
    pub snr_db: f32,
    /// Robust noise floor estimate (linear mel power)
    pub noise_floor: f32,
    /// Robust signal level estimate (linear mel power)
    pub signal_level: f32,
    /// Coefficient of variation of frame-wise mean energy, in [0, 2]
    pub variability: f32,
    /// Energy-weighted dominant frequency in Hz
    pub dominant_hz: f32,
    /// Energy-weighted mel centroid in Hz
    pub centroid_hz: f32,
    /// Energy-weighted spread around the centroid in Hz
    pub spread_hz: f32,
    /// Diagnostic label
    pub environment: Environment,
    /// Continuous adaptation inputs
    pub factors: EnvironmentFactors,
    /// How much the adaptation should trust this profile, in [0, 1]
    pub confidence: f32,
}

/// Stateless profiler over FeatureBundles
pub struct AudioProfiler;

impl AudioProfiler {
    /// Profile one analysis window
    ///
    /// An empty bundle yields a zero-confidence profile, which downstream
    /// adaptation replaces with conservative defaults.
    pub fn profile(bundle: &FeatureBundle) -> AudioProfile {
        if bundle.is_empty() {
            return Self::fallback_profile();
        }

        let (snr_db, noise_floor, signal_level, snr_confidence) =
            Self::estimate_snr(&bundle.mel.linear);
        let variability = Self::temporal_variability(&bundle.mel.linear);
        let (dominant_hz, centroid_hz, spread_hz) =
            Self::frequency_content(&bundle.mel.linear, &bundle.mel.band_hz);

        // Profiles from very short windows are statistically weak
        let length_confidence = (bundle.frames() as f32 / 200.0).min(1.0);
        let confidence = (snr_confidence * length_confidence).clamp(0.0, 1.0);

        let mut factors = Self::factors(snr_db, variability, dominant_hz, spread_hz);
        // Flat per-frame energy distributions are noise-like; blend the
        // mean entropy into the noise factor
        if !bundle.entropy.is_empty() {
            let mean_entropy =
                bundle.entropy.iter().sum::<f32>() / bundle.entropy.len() as f32;
            factors.noise = (0.7 * factors.noise + 0.3 * mean_entropy).clamp(0.0, 1.0);
        }
        let environment = Self::classify(snr_db, variability, dominant_hz, spread_hz);

        log::info!(
            "[Profiler] SNR {:.1} dB, variability {:.2}, dominant {:.0} Hz, \
             environment {}, confidence {:.2}",
            snr_db,
            variability,
            dominant_hz,
            environment,
            confidence
        );

        AudioProfile {
            snr_db,
            noise_floor,
            signal_level,
            variability,
            dominant_hz,
            centroid_hz,
            spread_hz,
            environment,
            factors,
            confidence,
        }
    }

    /// Zero-confidence profile used for empty or unusable windows
    fn fallback_profile() -> AudioProfile {
        AudioProfile {
            snr_db: 0.0,
            noise_floor: POWER_FLOOR,
            signal_level: POWER_FLOOR,
            variability: 0.0,
            dominant_hz: 0.0,
            centroid_hz: 0.0,
            spread_hz: 0.0,
            environment: Environment::MixedEnvironment,
            factors: EnvironmentFactors {
                noise: 0.5,
                wind: 0.0,
                insect: 0.0,
                bird_activity: 0.0,
                urban: 0.0,
            },
            confidence: 0.0,
        }
    }

    /// Outlier-robust SNR estimate over all finite positive mel energies
    ///
    /// # Returns
    /// (snr_db, noise_floor, signal_level, confidence)
    fn estimate_snr(linear: &[Vec<f32>]) -> (f32, f32, f32, f32) {
        let mut samples: Vec<f32> = linear
            .iter()
            .flat_map(|frame| frame.iter())
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();

        if samples.is_empty() {
            return (0.0, POWER_FLOOR, POWER_FLOOR, 0.0);
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let median = percentile_sorted(&samples, 0.5);
        let mut deviations: Vec<f32> = samples.iter().map(|&v| (v - median).abs()).collect();
        deviations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mad = percentile_sorted(&deviations, 0.5);

        let mut confidence = 1.0f32;
        let cleaned: Vec<f32>;

        if mad > 1e-12 * median.max(1e-12) {
            let cutoff = OUTLIER_Z_THRESHOLD * mad * MAD_SCALE;
            let inliers: Vec<f32> = samples
                .iter()
                .copied()
                .filter(|&v| (v - median).abs() <= cutoff)
                .collect();

            if inliers.len() * 2 < samples.len() {
                // Rejection ate more than half the data: fall back to a
                // coarser quartile split with reduced confidence
                let q1 = percentile_sorted(&samples, 0.25);
                let q3 = percentile_sorted(&samples, 0.75);
                cleaned = samples
                    .iter()
                    .copied()
                    .filter(|&v| v >= q1 && v <= q3)
                    .collect();
                confidence *= 0.5;
                log::debug!(
                    "[Profiler] MAD rejection removed {}/{} samples, using quartile fallback",
                    samples.len() - inliers.len(),
                    samples.len()
                );
            } else {
                confidence *= 1.0 - (samples.len() - inliers.len()) as f32 / samples.len() as f32;
                cleaned = inliers;
            }
        } else {
            // Near-constant distribution: nothing to reject, but also no
            // spread to estimate from, so the profile carries little
            // adaptation signal
            confidence *= 0.2;
            cleaned = samples;
        }

        if cleaned.is_empty() {
            return (0.0, POWER_FLOOR, POWER_FLOOR, 0.0);
        }

        let noise = percentile_sorted(&cleaned, NOISE_PERCENTILE).max(POWER_FLOOR);
        let signal = percentile_sorted(&cleaned, SIGNAL_PERCENTILE).max(POWER_FLOOR);
        let snr_db = (20.0 * (signal / noise).log10()).clamp(-20.0, 60.0);

        (snr_db, noise, signal, confidence)
    }

    /// Coefficient of variation of frame-wise mean energy, clamped to [0, 2]
    fn temporal_variability(linear: &[Vec<f32>]) -> f32 {
        let means: Vec<f32> = linear
            .iter()
            .map(|frame| frame.iter().sum::<f32>() / frame.len().max(1) as f32)
            .collect();
        if means.len() < 2 {
            return 0.0;
        }

        let mean = means.iter().sum::<f32>() / means.len() as f32;
        if mean <= 0.0 {
            return 0.0;
        }
        let variance =
            means.iter().map(|&m| (m - mean) * (m - mean)).sum::<f32>() / means.len() as f32;

        (variance.sqrt() / mean).clamp(0.0, 2.0)
    }

    /// Dominant mel bin (energy-weighted argmax), centroid and spread in Hz
    fn frequency_content(linear: &[Vec<f32>], band_hz: &[f32]) -> (f32, f32, f32) {
        if linear.is_empty() || band_hz.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let n_bands = band_hz.len();
        let mut band_totals = vec![0.0f32; n_bands];
        for frame in linear {
            for (b, &e) in frame.iter().enumerate().take(n_bands) {
                band_totals[b] += e;
            }
        }

        let dominant_band = band_totals
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let dominant_hz = band_hz[dominant_band];

        let total: f32 = band_totals.iter().sum();
        if total <= 0.0 {
            return (dominant_hz, 0.0, 0.0);
        }

        let centroid: f32 = band_totals
            .iter()
            .zip(band_hz.iter())
            .map(|(&e, &hz)| e * hz)
            .sum::<f32>()
            / total;
        let spread: f32 = (band_totals
            .iter()
            .zip(band_hz.iter())
            .map(|(&e, &hz)| e * (hz - centroid) * (hz - centroid))
            .sum::<f32>()
            / total)
            .sqrt();

        (dominant_hz, centroid, spread)
    }

    /// Continuous environment factors from the scalar estimates
    fn factors(snr_db: f32, variability: f32, dominant_hz: f32, spread_hz: f32) -> EnvironmentFactors {
        let noise = ((60.0 - snr_db) / 80.0).clamp(0.0, 1.0);
        let wind = ((1.0 - dominant_hz / 1000.0).clamp(0.0, 1.0))
            * ((1.0 - variability / 1.0).clamp(0.0, 1.0));
        let insect = ((dominant_hz - 3000.0) / 5000.0).clamp(0.0, 1.0)
            * ((1.0 - spread_hz / 2500.0).clamp(0.0, 1.0));
        let bird_activity = (variability / 2.0).clamp(0.0, 1.0)
            * ((1.0 - (dominant_hz - 4000.0).abs() / 4000.0).clamp(0.0, 1.0));
        let urban = noise * ((1.0 - dominant_hz / 2000.0).clamp(0.0, 1.0));

        EnvironmentFactors {
            noise,
            wind,
            insect,
            bird_activity,
            urban,
        }
    }

    /// Deterministic decision procedure over the scalar estimates
    fn classify(snr_db: f32, variability: f32, dominant_hz: f32, spread_hz: f32) -> Environment {
        if snr_db < 5.0 && variability < 0.8 {
            return Environment::VeryNoisy;
        }
        if snr_db > 30.0 && variability < 0.3 {
            return Environment::VeryQuiet;
        }
        if variability > 1.2 && (2000.0..=8000.0).contains(&dominant_hz) {
            return Environment::DawnChorus;
        }
        if dominant_hz > 4000.0 && spread_hz < 1200.0 && variability < 0.5 {
            return Environment::InsectDominated;
        }
        if dominant_hz < 500.0 && spread_hz < 1500.0 {
            return Environment::WindDominated;
        }
        if (5.0..=30.0).contains(&snr_db) && (0.3..=1.2).contains(&variability) {
            return Environment::ModerateActivity;
        }
        Environment::MixedEnvironment
    }
}

/// Linear-interpolated percentile over an ascending-sorted slice
fn percentile_sorted(sorted: &[f32], p: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f32;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}
