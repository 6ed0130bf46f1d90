// Within-segment candidate merging and filtering
//
// All three generators feed the same pool: candidates are sorted by start
// time, merged when they nearly touch (gap <= merge_gap_ms) or overlap
// more than 30% of either duration, then filtered by duration range and
// confidence floor. Merging keeps the union of time/frequency bounds, the
// maximum confidence, and the higher-SNR event's peak frequency and band
// label; merges across methods are tagged MultiMethod.

use crate::events::{CandidateEvent, DetectionMethod};
use crate::profile::AdaptedConfig;

/// Overlap fraction of either event's duration that forces a merge
const OVERLAP_MERGE_FRACTION: f64 = 0.3;

/// Merge and filter raw candidates into the segment's event list
pub fn merge_and_filter(
    mut candidates: Vec<CandidateEvent>,
    config: &AdaptedConfig,
) -> Vec<CandidateEvent> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(|a, b| {
        a.start_ms
            .partial_cmp(&b.start_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut merged: Vec<CandidateEvent> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match merged.last_mut() {
            Some(last) if should_merge(last, &candidate, config.merge_gap_ms as f64) => {
                merge_into(last, candidate);
            }
            _ => merged.push(candidate),
        }
    }

    let before = merged.len();
    let filtered = filter_candidates(merged, config);

    log::debug!(
        "[PostProcess] {} merged candidate(s), {} after duration/confidence filter",
        before,
        filtered.len()
    );
    filtered
}

/// Duration-range and confidence-floor filter
///
/// Applied after within-segment merging, and again after seam merging:
/// a boundary merge can grow an event past the duration cap.
pub(crate) fn filter_candidates(
    events: Vec<CandidateEvent>,
    config: &AdaptedConfig,
) -> Vec<CandidateEvent> {
    events
        .into_iter()
        .filter(|e| {
            let duration = e.duration_ms();
            duration >= config.min_duration_ms as f64
                && duration <= config.max_duration_ms as f64
                && e.confidence >= config.min_confidence
        })
        .collect()
}

/// Two candidates merge when they nearly touch or substantially overlap
fn should_merge(a: &CandidateEvent, b: &CandidateEvent, merge_gap_ms: f64) -> bool {
    // b starts at or after a (sorted); gap is negative when they overlap
    let gap = b.start_ms - a.end_ms;
    if gap <= merge_gap_ms && gap >= 0.0 {
        return true;
    }
    if gap < 0.0 {
        let overlap = (a.end_ms.min(b.end_ms) - b.start_ms).max(0.0);
        let frac_a = overlap / a.duration_ms().max(f64::MIN_POSITIVE);
        let frac_b = overlap / b.duration_ms().max(f64::MIN_POSITIVE);
        return frac_a > OVERLAP_MERGE_FRACTION || frac_b > OVERLAP_MERGE_FRACTION || gap.abs() <= merge_gap_ms;
    }
    false
}

/// Fold `other` into `target`, keeping the union of bounds
fn merge_into(target: &mut CandidateEvent, other: CandidateEvent) {
    if other.method != target.method {
        target.method = DetectionMethod::MultiMethod;
    }

    target.start_ms = target.start_ms.min(other.start_ms);
    target.end_ms = target.end_ms.max(other.end_ms);
    target.low_hz = target.low_hz.min(other.low_hz);
    target.high_hz = target.high_hz.max(other.high_hz);
    target.confidence = target.confidence.max(other.confidence);

    // The higher-SNR contributor donates peak frequency and band label
    if other.snr_db > target.snr_db {
        target.peak_hz = other.peak_hz;
        target.snr_db = other.snr_db;
        if other.band.is_some() {
            target.band = other.band;
        }
    } else if target.band.is_none() {
        target.band = other.band;
    }
}

/// Merge events across a chunk boundary
///
/// Only pairs whose band bounds are within `band_tolerance_hz` of each
/// other are considered: a low-frequency rumble ending at the seam must
/// not absorb a high-frequency trill starting there.
///
/// # Arguments
/// * `left` - Events from the earlier chunk (times already shifted into
///   segment-relative ms)
/// * `right` - Events from the later chunk
pub fn merge_across_boundary(
    left: Vec<CandidateEvent>,
    right: Vec<CandidateEvent>,
    config: &AdaptedConfig,
    band_tolerance_hz: f32,
) -> Vec<CandidateEvent> {
    let mut merged = left;
    let mut pending: Vec<CandidateEvent> = Vec::with_capacity(right.len());

    'outer: for candidate in right {
        for existing in merged.iter_mut() {
            let band_adjacent = (existing.low_hz - candidate.low_hz).abs() <= band_tolerance_hz
                && (existing.high_hz - candidate.high_hz).abs() <= band_tolerance_hz;
            if band_adjacent && spans_touch(existing, &candidate, config.merge_gap_ms as f64) {
                merge_into(existing, candidate);
                continue 'outer;
            }
        }
        pending.push(candidate);
    }

    merged.extend(pending);
    merged.sort_by(|a, b| {
        a.start_ms
            .partial_cmp(&b.start_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged
}

/// Order-independent variant of the gap/overlap rule
fn spans_touch(a: &CandidateEvent, b: &CandidateEvent, merge_gap_ms: f64) -> bool {
    let (first, second) = if a.start_ms <= b.start_ms { (a, b) } else { (b, a) };
    should_merge(first, second, merge_gap_ms)
}
