// Onset detection over the novelty track
//
// Same boundary-expansion machinery as the peak picker, but at the
// coarser 1.5 * mean threshold. Deliberately redundant with the other
// two generators; post-processing resolves the overlap.

use super::{frame_centroid_hz, full_band_range, positive_novelty_stats, scan_novelty_spans};
use crate::events::{CandidateEvent, DetectionMethod};
use crate::profile::AdaptedConfig;
use crate::spectral::FeatureBundle;

/// Coarse threshold multiplier over the mean positive novelty
const ONSET_MEAN_MULTIPLIER: f32 = 1.5;

pub fn detect_onsets(bundle: &FeatureBundle, config: &AdaptedConfig) -> Vec<CandidateEvent> {
    let (mean, _std) = match positive_novelty_stats(&bundle.novelty) {
        Some(stats) => stats,
        None => return Vec::new(),
    };
    let threshold = ONSET_MEAN_MULTIPLIER * mean;
    if threshold <= 0.0 {
        return Vec::new();
    }

    let (low_hz, high_hz) = full_band_range(config);
    let mut events = Vec::new();

    // Same window-lead shift as the peak picker
    let lead_ms = (bundle.window_ms - bundle.hop_ms).max(0.0) as f64;

    for span in scan_novelty_spans(&bundle.novelty, threshold) {
        let start_ms = bundle.frame_to_ms(span.start_frame) + lead_ms;
        let end_ms = bundle.frame_to_ms(span.end_frame) + lead_ms;
        if end_ms - start_ms < config.min_duration_ms as f64 {
            continue;
        }

        let peak_hz =
            frame_centroid_hz(&bundle.mel.linear[span.peak_frame], &bundle.mel.band_hz);
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
            method: DetectionMethod::OnsetDetection,
            band: None,
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::spectral::MelSpectrogram;

    fn bundle_with_novelty(novelty: Vec<f32>) -> FeatureBundle {
        let frames = novelty.len();
        FeatureBundle {
            mel: MelSpectrogram {
                linear: vec![vec![1.0; 4]; frames],
                transformed: vec![vec![0.0; 4]; frames],
                band_hz: vec![1500.0, 3000.0, 4500.0, 6000.0],
            },
            novelty,
            entropy: vec![0.5; frames],
            band_energy: vec![vec![0.001; frames]; 3],
            hop_ms: 5.0,
            window_ms: 25.0,
            sample_rate: 32000,
        }
    }

    #[test]
    fn test_onset_threshold_is_coarser_than_peak_picker() {
        // High-variance background pushes the peak picker's mean + 2.5 * std
        // threshold above the bump while 1.5 * mean stays below it
        let mut novelty: Vec<f32> = (0..400)
            .map(|i| if i % 2 == 0 { 0.25 } else { 0.75 })
            .collect();
        for v in &mut novelty[100..120] {
            *v = 1.0;
        }
        novelty[110] = 1.1;

        let config = AdaptedConfig::from_base(&DetectionConfig::default());
        let bundle = bundle_with_novelty(novelty);

        let onsets = detect_onsets(&bundle, &config);
        let peaks = super::super::peaks::detect_novelty_peaks(&bundle, &config);

        assert_eq!(onsets.len(), 1, "onsets: {:?}", onsets);
        assert!(peaks.is_empty(), "peaks: {:?}", peaks);
        assert_eq!(onsets[0].method, DetectionMethod::OnsetDetection);
    }

    #[test]
    fn test_silence_produces_no_onsets() {
        let config = AdaptedConfig::from_base(&DetectionConfig::default());
        let events = detect_onsets(&bundle_with_novelty(vec![0.0; 400]), &config);
        assert!(events.is_empty());
    }
}
