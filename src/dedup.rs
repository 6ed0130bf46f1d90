// Cross-segment deduplication
//
// Overlapping input segments detect the same physical call twice, offset
// by the segment overlap. Once the caller resolves absolute recording
// time, duplicates are found by requiring BOTH temporal and frequency
// IoU above threshold, and resolved by a composite quality score. The
// pass is a single ascending sweep with a bounded look-back window, so
// the cost stays near-linear in the event count.
//
// Idempotence: an event already marked as a duplicate is never used as
// an anchor, and re-running the pass over resolved output changes
// nothing. When a kept anchor later loses to a higher-scoring event,
// everything that pointed at it is re-pointed at the new keeper so
// duplicate_of references never chain.

use std::collections::VecDeque;

use crate::config::DedupConfig;
use crate::events::FinalEvent;

/// Temporal Intersection-over-Union of two events, in [0, 1]
///
/// Symmetric; defined as 0 when the union is empty (two zero-duration
/// events) or either event lacks absolute timing.
pub fn temporal_iou(a: &FinalEvent, b: &FinalEvent) -> f32 {
    let (a_start, a_end) = match (a.absolute_start_ms, a.absolute_end_ms) {
        (Some(s), Some(e)) => (s, e),
        _ => return 0.0,
    };
    let (b_start, b_end) = match (b.absolute_start_ms, b.absolute_end_ms) {
        (Some(s), Some(e)) => (s, e),
        _ => return 0.0,
    };

    interval_iou(a_start, a_end, b_start, b_end)
}

/// Frequency Intersection-over-Union of two events, in [0, 1]
///
/// Defined as 0 whenever either event has invalid bounds (high <= low).
pub fn frequency_iou(a: &FinalEvent, b: &FinalEvent) -> f32 {
    if a.high_hz <= a.low_hz || b.high_hz <= b.low_hz {
        return 0.0;
    }
    interval_iou(
        a.low_hz as f64,
        a.high_hz as f64,
        b.low_hz as f64,
        b.high_hz as f64,
    )
}

fn interval_iou(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f32 {
    let intersection = (a_end.min(b_end) - a_start.max(b_start)).max(0.0);
    let len_a = (a_end - a_start).max(0.0);
    let len_b = (b_end - b_start).max(0.0);
    let union = len_a + len_b - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    ((intersection / union) as f32).clamp(0.0, 1.0)
}

/// Composite quality score used to pick the kept event of a duplicate pair
///
/// score = 0.7 * confidence + 0.2 * (SNR / 60) + 0.1 * min(1, duration_s)
pub fn quality_score(event: &FinalEvent) -> f32 {
    let snr_term = (event.snr_db / 60.0).clamp(0.0, 1.0);
    let duration_term = ((event.duration_ms() / 1000.0) as f32).clamp(0.0, 1.0);
    0.7 * event.confidence + 0.2 * snr_term + 0.1 * duration_term
}

/// Annotate duplicates across one recording's event list
///
/// Events must carry absolute recording time; events without it are kept
/// untouched and never compared. The returned list is sorted by absolute
/// start time (unresolved events last).
pub fn deduplicate(mut events: Vec<FinalEvent>, config: &DedupConfig) -> Vec<FinalEvent> {
    events.sort_by(|a, b| {
        let a_key = a.absolute_start_ms.unwrap_or(f64::MAX);
        let b_key = b.absolute_start_ms.unwrap_or(f64::MAX);
        a_key
            .partial_cmp(&b_key)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Indices into `events` of non-duplicate anchors within the look-back
    let mut anchors: VecDeque<usize> = VecDeque::new();
    let mut duplicates_found = 0usize;

    for i in 0..events.len() {
        let current_start = match events[i].absolute_start_ms {
            Some(s) => s,
            None => continue,
        };

        // Pre-marked duplicates (re-run over resolved output) are skipped
        // entirely: never an anchor, never re-marked
        if events[i].is_duplicate() {
            continue;
        }

        // Drop anchors that fell out of the look-back window
        while let Some(&front) = anchors.front() {
            let front_start = events[front].absolute_start_ms.unwrap_or(f64::MIN);
            if current_start - front_start > config.lookback_ms {
                anchors.pop_front();
            } else {
                break;
            }
        }

        // Scan ALL anchors in the window, not just until the first match:
        // the newcomer may demote several anchors and still lose to a
        // later one, and stopping early would leave keeper pairs that a
        // re-run of the pass would then mark (breaking idempotence)
        let mut current_is_duplicate = false;
        let mut a = 0;
        while a < anchors.len() {
            let anchor_idx = anchors[a];
            let t_iou = temporal_iou(&events[anchor_idx], &events[i]);
            let f_iou = frequency_iou(&events[anchor_idx], &events[i]);
            if t_iou < config.temporal_iou_threshold || f_iou < config.frequency_iou_threshold {
                a += 1;
                continue;
            }

            let anchor_score = quality_score(&events[anchor_idx]);
            let current_score = quality_score(&events[i]);
            let score_diff = (anchor_score - current_score).abs();
            let dedup_confidence = (score_diff + 0.5).min(1.0);

            if current_score > anchor_score {
                // The newcomer wins: demote the anchor and re-point any
                // earlier duplicates so references never chain; their
                // evidence is recomputed against the event they now
                // actually reference
                let keeper = events[i].clone();
                let demoted_id = events[anchor_idx].id;

                mark_duplicate(&mut events[anchor_idx], keeper.id, t_iou, f_iou, dedup_confidence);
                for j in 0..events.len() {
                    if j != i && events[j].duplicate_of == Some(demoted_id) {
                        repoint_duplicate(&mut events[j], &keeper);
                    }
                }
                anchors.remove(a);
                duplicates_found += 1;
                // keep scanning from the same index
            } else {
                // The newcomer loses: if it demoted anchors earlier in
                // this scan, their references must follow it to its keeper
                let keeper = events[anchor_idx].clone();
                let loser_id = events[i].id;
                mark_duplicate(&mut events[i], keeper.id, t_iou, f_iou, dedup_confidence);
                for j in 0..events.len() {
                    if j != i && events[j].duplicate_of == Some(loser_id) {
                        repoint_duplicate(&mut events[j], &keeper);
                    }
                }
                current_is_duplicate = true;
                duplicates_found += 1;
                break;
            }
        }

        if !current_is_duplicate {
            anchors.push_back(i);
        }
    }

    if duplicates_found > 0 {
        log::info!(
            "[Dedup] Marked {} duplicate(s) among {} event(s)",
            duplicates_found,
            events.len()
        );
    }
    events
}

/// Re-point a duplicate at a new keeper, recomputing its evidence
///
/// The stored IoUs and dedup confidence describe the pair (event, keeper);
/// carrying the values measured against a demoted intermediate would make
/// the annotations lie about the referenced event.
fn repoint_duplicate(event: &mut FinalEvent, keeper: &FinalEvent) {
    let t_iou = temporal_iou(keeper, event);
    let f_iou = frequency_iou(keeper, event);
    let score_diff = (quality_score(keeper) - quality_score(event)).abs();
    mark_duplicate(event, keeper.id, t_iou, f_iou, (score_diff + 0.5).min(1.0));
}

fn mark_duplicate(
    event: &mut FinalEvent,
    keeper_id: u64,
    t_iou: f32,
    f_iou: f32,
    dedup_confidence: f32,
) {
    event.duplicate_of = Some(keeper_id);
    event.temporal_iou = Some(t_iou);
    event.frequency_iou = Some(f_iou);
    event.dedup_confidence = Some(dedup_confidence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DetectionMethod;

    fn event(
        id: u64,
        abs_start: f64,
        abs_end: f64,
        low_hz: f32,
        high_hz: f32,
        confidence: f32,
    ) -> FinalEvent {
        FinalEvent {
            id,
            segment_id: id,
            start_ms: 0.0,
            end_ms: abs_end - abs_start,
            low_hz,
            high_hz,
            peak_hz: (low_hz + high_hz) / 2.0,
            snr_db: 20.0,
            confidence,
            method: DetectionMethod::BandEnergy,
            band: Some("mid_freq".to_string()),
            absolute_start_ms: Some(abs_start),
            absolute_end_ms: Some(abs_end),
            duplicate_of: None,
            temporal_iou: None,
            frequency_iou: None,
            dedup_confidence: None,
        }
    }

    #[test]
    fn test_temporal_iou_symmetric_and_bounded() {
        let a = event(1, 994.0, 1050.0, 2000.0, 3000.0, 0.6);
        let b = event(2, 1000.0, 1060.0, 2050.0, 3050.0, 0.8);

        let ab = temporal_iou(&a, &b);
        let ba = temporal_iou(&b, &a);
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));

        // intersection 50, union 66
        assert!((ab - 50.0 / 66.0).abs() < 1e-4, "t_iou {}", ab);
    }

    #[test]
    fn test_temporal_iou_zero_duration_events() {
        let a = event(1, 1000.0, 1000.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 1000.0, 1000.0, 2000.0, 3000.0, 0.5);
        assert_eq!(temporal_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_temporal_iou_requires_absolute_time() {
        let mut a = event(1, 1000.0, 1100.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 1000.0, 1100.0, 2000.0, 3000.0, 0.5);
        a.absolute_start_ms = None;
        assert_eq!(temporal_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_frequency_iou_invalid_bounds() {
        let mut a = event(1, 0.0, 100.0, 3000.0, 3000.0, 0.5);
        let b = event(2, 0.0, 100.0, 2000.0, 3000.0, 0.5);
        assert_eq!(frequency_iou(&a, &b), 0.0);

        a.low_hz = 4000.0; // inverted
        a.high_hz = 2000.0;
        assert_eq!(frequency_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_frequency_iou_value() {
        let a = event(1, 0.0, 100.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 0.0, 100.0, 2050.0, 3050.0, 0.5);
        let f = frequency_iou(&a, &b);
        // intersection 950, union 1050
        assert!((f - 950.0 / 1050.0).abs() < 1e-4, "f_iou {}", f);
    }

    #[test]
    fn test_deduplication_marks_lower_scoring_event() {
        let a = event(1, 994.0, 1050.0, 2000.0, 3000.0, 0.6);
        let b = event(2, 1000.0, 1060.0, 2050.0, 3050.0, 0.8);

        let result = deduplicate(vec![a, b], &DedupConfig::default());

        let a_out = result.iter().find(|e| e.id == 1).unwrap();
        let b_out = result.iter().find(|e| e.id == 2).unwrap();

        assert_eq!(a_out.duplicate_of, Some(2));
        assert!(b_out.duplicate_of.is_none());
        assert!((a_out.temporal_iou.unwrap() - 50.0 / 66.0).abs() < 1e-3);
        assert!((a_out.frequency_iou.unwrap() - 950.0 / 1050.0).abs() < 1e-3);
        assert!(a_out.dedup_confidence.unwrap() >= 0.5);
    }

    #[test]
    fn test_deduplication_is_idempotent() {
        let a = event(1, 994.0, 1050.0, 2000.0, 3000.0, 0.6);
        let b = event(2, 1000.0, 1060.0, 2050.0, 3050.0, 0.8);

        let config = DedupConfig::default();
        let first = deduplicate(vec![a, b], &config);
        let second = deduplicate(first.clone(), &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_chains_when_anchor_is_demoted() {
        // Three mutually overlapping events with ascending quality: the
        // final keeper must be referenced directly by both losers
        let a = event(1, 1000.0, 1100.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 1010.0, 1110.0, 2000.0, 3000.0, 0.7);
        let c = event(3, 1020.0, 1120.0, 2000.0, 3000.0, 0.9);

        let result = deduplicate(vec![a, b, c], &DedupConfig::default());

        let keepers: Vec<&FinalEvent> =
            result.iter().filter(|e| !e.is_duplicate()).collect();
        assert_eq!(keepers.len(), 1);
        let keeper_id = keepers[0].id;
        assert_eq!(keeper_id, 3);

        for loser in result.iter().filter(|e| e.is_duplicate()) {
            assert_eq!(
                loser.duplicate_of,
                Some(keeper_id),
                "chained reference from event {}",
                loser.id
            );
        }
    }

    #[test]
    fn test_repointed_duplicate_evidence_recomputed() {
        // Demotion cascade: a loses to b, then b loses to c. After a is
        // re-pointed at c, its stored IoU must describe the (a, c) pair,
        // not the (a, b) pair it was first marked with.
        let a = event(1, 1000.0, 1100.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 1020.0, 1120.0, 2000.0, 3000.0, 0.7);
        let c = event(3, 1040.0, 1140.0, 2000.0, 3000.0, 0.9);

        let result = deduplicate(vec![a, b, c], &DedupConfig::default());

        let a_out = result.iter().find(|e| e.id == 1).unwrap();
        assert_eq!(a_out.duplicate_of, Some(3));
        // [1000, 1100] vs [1040, 1140]: intersection 60, union 140
        assert!(
            (a_out.temporal_iou.unwrap() - 60.0 / 140.0).abs() < 1e-4,
            "t_iou {} measured against the wrong keeper",
            a_out.temporal_iou.unwrap()
        );
        assert!((a_out.frequency_iou.unwrap() - 1.0).abs() < 1e-4);

        let b_out = result.iter().find(|e| e.id == 2).unwrap();
        assert_eq!(b_out.duplicate_of, Some(3));
        assert!((b_out.temporal_iou.unwrap() - 80.0 / 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_events_outside_lookback_not_compared() {
        let a = event(1, 0.0, 100.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 10_000.0, 10_100.0, 2000.0, 3000.0, 0.5);

        let result = deduplicate(vec![a, b], &DedupConfig::default());
        assert!(result.iter().all(|e| !e.is_duplicate()));
    }

    #[test]
    fn test_low_iou_pairs_not_duplicates() {
        // Heavy temporal overlap but disjoint frequency ranges
        let a = event(1, 1000.0, 1100.0, 2000.0, 3000.0, 0.5);
        let b = event(2, 1000.0, 1100.0, 8000.0, 9000.0, 0.5);

        let result = deduplicate(vec![a, b], &DedupConfig::default());
        assert!(result.iter().all(|e| !e.is_duplicate()));
    }

    #[test]
    fn test_unresolved_events_left_untouched() {
        let mut a = event(1, 1000.0, 1100.0, 2000.0, 3000.0, 0.5);
        a.absolute_start_ms = None;
        a.absolute_end_ms = None;
        let b = event(2, 1000.0, 1100.0, 2000.0, 3000.0, 0.8);

        let result = deduplicate(vec![a, b], &DedupConfig::default());
        assert!(result.iter().all(|e| !e.is_duplicate()));
    }
}
