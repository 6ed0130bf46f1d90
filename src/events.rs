// Event records produced by the detection pipeline
//
// CandidateEvent is the raw output of the candidate generators, consumed
// and possibly merged by post-processing. FinalEvent is the only record
// that crosses the core's output boundary: it carries segment identity,
// optional absolute recording time, and the deduplication annotations.

use serde::{Deserialize, Serialize};

/// Which detection method produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Per-band energy hysteresis state machine
    BandEnergy,
    /// Spectral-novelty peak picking
    NoveltyPeaks,
    /// Coarse onset detection over the novelty track
    OnsetDetection,
    /// Post-processing merged candidates from more than one method
    MultiMethod,
}

/// A raw time/frequency-bounded detection candidate, segment-relative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    /// Start offset within the segment in milliseconds
    pub start_ms: f64,
    /// End offset within the segment in milliseconds; always > start_ms
    pub end_ms: f64,
    /// Lower frequency bound in Hz
    pub low_hz: f32,
    /// Upper frequency bound in Hz; always >= low_hz for valid events
    pub high_hz: f32,
    /// Estimated peak frequency in Hz
    pub peak_hz: f32,
    /// Signal-to-noise ratio at the peak, in dB
    pub snr_db: f32,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
    /// Originating detection method
    pub method: DetectionMethod,
    /// Target band label, if the candidate came from a band detector
    pub band: Option<String>,
}

impl CandidateEvent {
    /// Event duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// A finalized event, ready for persistence by the external store
///
/// `absolute_start_ms`/`absolute_end_ms` are resolved by the caller by
/// adding the segment's recording offset; deduplication requires them.
/// `duplicate_of`, when present, always references a non-duplicate event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalEvent {
    /// Identifier unique within one detection run
    pub id: u64,
    /// Identifier of the segment this event was detected in
    pub segment_id: u64,
    pub start_ms: f64,
    pub end_ms: f64,
    pub low_hz: f32,
    pub high_hz: f32,
    pub peak_hz: f32,
    pub snr_db: f32,
    pub confidence: f32,
    pub method: DetectionMethod,
    pub band: Option<String>,
    /// Recording-absolute start time, resolved by the caller
    pub absolute_start_ms: Option<f64>,
    /// Recording-absolute end time, resolved by the caller
    pub absolute_end_ms: Option<f64>,
    /// Id of the kept event this one duplicates, if any
    pub duplicate_of: Option<u64>,
    /// Temporal IoU against the kept event
    pub temporal_iou: Option<f32>,
    /// Frequency IoU against the kept event
    pub frequency_iou: Option<f32>,
    /// Confidence that the duplicate marking is correct, in [0, 1]
    pub dedup_confidence: Option<f32>,
}

impl FinalEvent {
    /// Promote a candidate to a final event
    pub fn from_candidate(candidate: CandidateEvent, id: u64, segment_id: u64) -> Self {
        Self {
            id,
            segment_id,
            start_ms: candidate.start_ms,
            end_ms: candidate.end_ms,
            low_hz: candidate.low_hz,
            high_hz: candidate.high_hz,
            peak_hz: candidate.peak_hz,
            snr_db: candidate.snr_db,
            confidence: candidate.confidence,
            method: candidate.method,
            band: candidate.band,
            absolute_start_ms: None,
            absolute_end_ms: None,
            duplicate_of: None,
            temporal_iou: None,
            frequency_iou: None,
            dedup_confidence: None,
        }
    }

    /// Event duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    /// Resolve absolute recording time by adding the segment offset
    pub fn resolve_absolute(&mut self, segment_offset_ms: f64) {
        self.absolute_start_ms = Some(self.start_ms + segment_offset_ms);
        self.absolute_end_ms = Some(self.end_ms + segment_offset_ms);
    }

    /// True once this event has been marked as a duplicate
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}
