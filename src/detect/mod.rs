// Candidate generators
//
// Three independent detectors over the same FeatureBundle:
// - band_energy: per-band hysteresis state machines
// - peaks: spectral-novelty peak picking
// - onset: coarser onset detection over the same novelty track
//
// They can run in any order; redundancy between them is intentional and
// resolved by post-processing, not here. All three are pure functions of
// (FeatureBundle, AdaptedConfig).

pub mod band_energy;
pub mod onset;
pub mod peaks;

use crate::events::CandidateEvent;
use crate::profile::AdaptedConfig;
use crate::spectral::FeatureBundle;

/// A novelty excursion: [start_frame, end_frame) with its peak value
pub(crate) struct NoveltySpan {
    pub start_frame: usize,
    pub end_frame: usize,
    pub peak_frame: usize,
    pub peak_value: f32,
}

/// Mean and population standard deviation of the positive novelty values
pub(crate) fn positive_novelty_stats(novelty: &[f32]) -> Option<(f32, f32)> {
    let positive: Vec<f32> = novelty.iter().copied().filter(|&v| v > 0.0).collect();
    if positive.is_empty() {
        return None;
    }
    let mean = positive.iter().sum::<f32>() / positive.len() as f32;
    let variance = positive
        .iter()
        .map(|&v| (v - mean) * (v - mean))
        .sum::<f32>()
        / positive.len() as f32;
    Some((mean, variance.sqrt()))
}

/// Scan the novelty track for local maxima above `threshold`, expanding
/// each into an event span while novelty stays above `0.3 * threshold`
///
/// The scan advances past each emitted span so one peak is never detected
/// twice.
pub(crate) fn scan_novelty_spans(novelty: &[f32], threshold: f32) -> Vec<NoveltySpan> {
    let mut spans = Vec::new();
    if novelty.len() < 3 || threshold <= 0.0 {
        return spans;
    }
    let floor = 0.3 * threshold;

    let mut t = 1;
    while t + 1 < novelty.len() {
        let is_peak =
            novelty[t] > threshold && novelty[t] > novelty[t - 1] && novelty[t] >= novelty[t + 1];
        if !is_peak {
            t += 1;
            continue;
        }

        let mut start = t;
        while start > 0 && novelty[start - 1] > floor {
            start -= 1;
        }
        let mut end = t;
        while end + 1 < novelty.len() && novelty[end + 1] > floor {
            end += 1;
        }

        spans.push(NoveltySpan {
            start_frame: start,
            end_frame: end + 1,
            peak_frame: t,
            peak_value: novelty[t],
        });

        t = end + 2;
    }
    spans
}

/// Frequency bounds covering all configured target bands
pub(crate) fn full_band_range(config: &AdaptedConfig) -> (f32, f32) {
    let low = config
        .bands
        .iter()
        .map(|b| b.low_hz)
        .fold(f32::INFINITY, f32::min);
    let high = config
        .bands
        .iter()
        .map(|b| b.high_hz)
        .fold(f32::NEG_INFINITY, f32::max);
    if low.is_finite() && high.is_finite() {
        (low, high)
    } else {
        (0.0, 0.0)
    }
}

/// Energy-weighted mel centroid of one frame, in Hz
pub(crate) fn frame_centroid_hz(frame: &[f32], band_hz: &[f32]) -> f32 {
    let total: f32 = frame.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    frame
        .iter()
        .zip(band_hz.iter())
        .map(|(&e, &hz)| e * hz)
        .sum::<f32>()
        / total
}

/// Run all three generators and collect their candidates
///
/// # Arguments
/// * `carries` - Optional per-band energy tails from the previous chunk,
///   indexed like `config.bands`
pub fn generate_candidates(
    bundle: &FeatureBundle,
    config: &AdaptedConfig,
    carries: Option<&[Vec<f32>]>,
) -> Vec<CandidateEvent> {
    if bundle.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();

    for (i, band) in config.bands.iter().enumerate() {
        let carry = carries.and_then(|c| c.get(i)).map(|v| v.as_slice());
        candidates.extend(band_energy::detect_band_events(bundle, i, band, config, carry));
    }
    candidates.extend(peaks::detect_novelty_peaks(bundle, config));
    candidates.extend(onset::detect_onsets(bundle, config));

    log::debug!(
        "[Detect] {} raw candidate(s) over {} frames",
        candidates.len(),
        bundle.frames()
    );
    candidates
}
