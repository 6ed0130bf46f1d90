// Acoustic Event Detection Core
// Spectral analysis, adaptive hysteresis detection and cross-segment
// deduplication for long environmental audio recordings.
//
// The crate receives already-decoded mono sample buffers from an external
// decoding utility and hands finalized events to an external store; it
// performs no I/O of its own. Per-segment detection is pure and safe to
// run in parallel across segments.

// Module declarations
pub mod baseline;
pub mod config;
pub mod dedup;
pub mod detect;
pub mod detector;
pub mod error;
pub mod events;
pub mod postprocess;
pub mod profile;
pub mod spectral;

// Re-exports for convenience
pub use config::{DedupConfig, DetectionConfig, DetectorConfig, FrequencyBand, SpectralConfig};
pub use dedup::{deduplicate, frequency_iou, temporal_iou};
pub use detector::EventDetector;
pub use error::{DetectionError, ErrorCode};
pub use events::{CandidateEvent, DetectionMethod, FinalEvent};
pub use profile::{AdaptedConfig, AudioProfile, AudioProfiler, Environment};
