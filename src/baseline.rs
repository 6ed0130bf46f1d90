// Rolling robust baseline and hysteresis threshold conversion
//
// The baseline is a trailing median over the most recent baseline-window
// worth of frames: an expanding window near the start of the track, a
// fixed-length trailing window thereafter. The median rejects short, loud
// events from contaminating the noise estimate.
//
// Thresholds convert dB values into multiplicative linear factors around
// the baseline: on[t] = base[t] * 10^(K_on/20). The onset/offset pair
// bounds a hysteresis band around the rolling baseline, never a fixed
// absolute level.

use crate::spectral::POWER_FLOOR;

/// Sorted sliding window maintained incrementally
///
/// Insert and remove are O(log n) search + O(n) shift, which beats a full
/// sort-per-frame while staying simple enough to verify against a naive
/// recomputation.
struct SortedWindow {
    values: Vec<f32>,
}

impl SortedWindow {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    fn insert(&mut self, value: f32) {
        let pos = self
            .values
            .partition_point(|&v| v < value);
        self.values.insert(pos, value);
    }

    fn remove(&mut self, value: f32) {
        let pos = self.values.partition_point(|&v| v < value);
        // Equal values are interchangeable for the median
        if pos < self.values.len() {
            self.values.remove(pos);
        }
    }

    fn median(&self) -> f32 {
        let n = self.values.len();
        if n == 0 {
            return POWER_FLOOR;
        }
        if n % 2 == 0 {
            (self.values[n / 2 - 1] + self.values[n / 2]) / 2.0
        } else {
            self.values[n / 2]
        }
    }
}

/// Compute the rolling median baseline of an energy track
///
/// # Arguments
/// * `track` - Per-frame energy values; non-finite entries count as the floor
/// * `window_frames` - Trailing window length in frames (>= 1)
/// * `carry` - Optional baseline tail from the previous chunk of the same
///   segment; pre-seeds the window so chunk boundaries don't restart the
///   expanding-window warm-up
///
/// # Returns
/// One baseline value per input frame, each >= POWER_FLOOR
pub fn rolling_median_baseline(
    track: &[f32],
    window_frames: usize,
    carry: Option<&[f32]>,
) -> Vec<f32> {
    let window_frames = window_frames.max(1);
    let mut window = SortedWindow::with_capacity(window_frames + 1);
    let mut baseline = Vec::with_capacity(track.len());

    // Ring of the values currently inside the window, in arrival order
    let mut ring: std::collections::VecDeque<f32> =
        std::collections::VecDeque::with_capacity(window_frames + 1);

    if let Some(carry) = carry {
        let tail_start = carry.len().saturating_sub(window_frames);
        for &v in &carry[tail_start..] {
            let v = sanitize(v);
            window.insert(v);
            ring.push_back(v);
        }
    }

    for &raw in track {
        let value = sanitize(raw);
        window.insert(value);
        ring.push_back(value);

        if ring.len() > window_frames {
            let oldest = ring.pop_front().unwrap_or(POWER_FLOOR);
            window.remove(oldest);
        }

        baseline.push(window.median().max(POWER_FLOOR));
    }

    baseline
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        POWER_FLOOR
    }
}

/// Tail of an energy track to carry into the next chunk's baseline
pub fn baseline_carry_tail(track: &[f32], window_frames: usize) -> Vec<f32> {
    let start = track.len().saturating_sub(window_frames.max(1));
    track[start..].to_vec()
}

/// Convert dB thresholds into onset/offset threshold tracks
///
/// # Arguments
/// * `baseline` - Rolling baseline per frame
/// * `onset_db` - Onset threshold above baseline in dB
/// * `offset_db` - Offset threshold above baseline in dB (< onset_db)
///
/// # Returns
/// (onset track, offset track), same length as the baseline
pub fn threshold_tracks(
    baseline: &[f32],
    onset_db: f32,
    offset_db: f32,
) -> (Vec<f32>, Vec<f32>) {
    let onset_factor = 10.0f32.powf(onset_db / 20.0);
    let offset_factor = 10.0f32.powf(offset_db / 20.0);

    let onset = baseline.iter().map(|&b| b * onset_factor).collect();
    let offset = baseline.iter().map(|&b| b * offset_factor).collect();
    (onset, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference implementation: full sort per frame
    fn naive_baseline(track: &[f32], window_frames: usize) -> Vec<f32> {
        (0..track.len())
            .map(|t| {
                let start = (t + 1).saturating_sub(window_frames);
                let mut window: Vec<f32> = track[start..=t]
                    .iter()
                    .map(|&v| sanitize(v))
                    .collect();
                window.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let n = window.len();
                let median = if n % 2 == 0 {
                    (window[n / 2 - 1] + window[n / 2]) / 2.0
                } else {
                    window[n / 2]
                };
                median.max(POWER_FLOOR)
            })
            .collect()
    }

    #[test]
    fn test_matches_naive_recomputation() {
        let track: Vec<f32> = (0..500)
            .map(|i| ((i * 7919 % 101) as f32 / 100.0) + 0.01)
            .collect();

        for &window in &[1usize, 5, 32, 100, 1000] {
            let fast = rolling_median_baseline(&track, window, None);
            let naive = naive_baseline(&track, window);
            for (t, (&a, &b)) in fast.iter().zip(naive.iter()).enumerate() {
                assert!(
                    (a - b).abs() < 1e-6,
                    "window {} frame {}: {} vs {}",
                    window,
                    t,
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_expanding_window_at_start() {
        let track = vec![4.0, 2.0, 8.0];
        let baseline = rolling_median_baseline(&track, 100, None);
        assert_eq!(baseline[0], 4.0);
        assert_eq!(baseline[1], 3.0); // median of {2, 4}
        assert_eq!(baseline[2], 4.0); // median of {2, 4, 8}
    }

    #[test]
    fn test_median_rejects_short_loud_event() {
        // 100 quiet frames with a 5-frame loud burst in the middle
        let mut track = vec![0.1f32; 100];
        for v in &mut track[50..55] {
            *v = 100.0;
        }

        let baseline = rolling_median_baseline(&track, 50, None);
        for (t, &b) in baseline.iter().enumerate() {
            assert!(
                b < 0.2,
                "baseline contaminated at frame {}: {}",
                t,
                b
            );
        }
    }

    #[test]
    fn test_non_finite_values_sanitized() {
        let track = vec![0.5, f32::NAN, f32::INFINITY, -1.0, 0.5];
        let baseline = rolling_median_baseline(&track, 3, None);
        for &b in &baseline {
            assert!(b.is_finite() && b >= POWER_FLOOR);
        }
    }

    #[test]
    fn test_carry_seeds_window() {
        let carry = vec![10.0f32; 20];
        let track = vec![0.1f32; 5];

        let with_carry = rolling_median_baseline(&track, 20, Some(&carry));
        let without = rolling_median_baseline(&track, 20, None);

        // Seeded baseline reflects the loud carry history; cold start doesn't
        assert!(with_carry[0] > 1.0, "carry ignored: {}", with_carry[0]);
        assert!(without[0] < 1.0);
    }

    #[test]
    fn test_thresholds_are_multiplicative() {
        let baseline = vec![1.0f32, 2.0, 0.5];
        let (onset, offset) = threshold_tracks(&baseline, 20.0, 10.0);

        // 20 dB = x10, 10 dB = x3.162
        assert!((onset[0] - 10.0).abs() < 1e-4);
        assert!((onset[1] - 20.0).abs() < 1e-4);
        assert!((offset[0] - 3.1623).abs() < 1e-3);

        // Offset strictly below onset everywhere
        for (on, off) in onset.iter().zip(offset.iter()) {
            assert!(off < on);
        }
    }

    #[test]
    fn test_silence_baseline_at_floor() {
        let track = vec![POWER_FLOOR; 50];
        let baseline = rolling_median_baseline(&track, 10, None);
        for &b in &baseline {
            assert_eq!(b, POWER_FLOOR);
        }
    }
}
