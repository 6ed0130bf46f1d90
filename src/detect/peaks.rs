// Spectral-novelty peak picking
//
// Threshold = mean + sigma * std of the positive novelty values; each
// local maximum above it expands into an event while novelty stays above
// 30% of the threshold. Complementary to the band-energy detector for
// broadband or cross-band events that no single band captures cleanly.

use super::{frame_centroid_hz, full_band_range, positive_novelty_stats, scan_novelty_spans};
use crate::events::{CandidateEvent, DetectionMethod};
use crate::profile::AdaptedConfig;
use crate::spectral::FeatureBundle;

pub fn detect_novelty_peaks(
    bundle: &FeatureBundle,
    config: &AdaptedConfig,
) -> Vec<CandidateEvent> {
    let (mean, std) = match positive_novelty_stats(&bundle.novelty) {
        Some(stats) => stats,
        None => return Vec::new(),
    };
    let threshold = mean + config.novelty_sigma * std;
    if threshold <= 0.0 {
        return Vec::new();
    }

    let (low_hz, high_hz) = full_band_range(config);
    let mut events = Vec::new();

    // Novelty spikes as soon as a window tail reaches the change; shift
    // spans by the window lead so they line up with the physical transient
    let lead_ms = (bundle.window_ms - bundle.hop_ms).max(0.0) as f64;

    for span in scan_novelty_spans(&bundle.novelty, threshold) {
        let start_ms = bundle.frame_to_ms(span.start_frame) + lead_ms;
        let end_ms = bundle.frame_to_ms(span.end_frame) + lead_ms;
        if end_ms - start_ms < config.min_duration_ms as f64 {
            continue;
        }

        let peak_hz =
            frame_centroid_hz(&bundle.mel.linear[span.peak_frame], &bundle.mel.band_hz);

        // Novelty is a relative measure; report its excess over the mean
        // as a pseudo-SNR so scoring stays comparable across methods
        let snr_db = (20.0 * (span.peak_value / mean.max(f32::MIN_POSITIVE)).log10())
            .clamp(0.0, 60.0);
        let confidence = (span.peak_value / (threshold * 1.5)).min(1.0);

        events.push(CandidateEvent {
            start_ms,
            end_ms,
            low_hz,
            high_hz,
            peak_hz,
            snr_db,
            confidence,
            method: DetectionMethod::NoveltyPeaks,
            band: None,
        });
    }

    events
}
