// EventDetector - per-segment detection entry point
//
// Orchestrates one segment's analysis: spectral frontend -> profiler ->
// adapted parameters -> candidate generators -> merge/filter. Very long
// buffers are subdivided into overlapping chunks (default 120 s, 1 s
// overlap); the per-band baseline tail is carried from each chunk into
// the next so the rolling noise estimate doesn't restart at the seam,
// and boundary-spanning events are merged with the same gap/overlap rule
// as within-segment merging, restricted to band-adjacent pairs.
//
// The whole computation is pure: no shared mutable state exists between
// segments, so callers may process segments in parallel. Chunks of one
// segment are serialized here because chunk n+1 consumes chunk n's
// baseline tail.

use crate::config::DetectorConfig;
use crate::detect::generate_candidates;
use crate::error::{log_config_error, DetectionError};
use crate::events::{CandidateEvent, FinalEvent};
use crate::postprocess::{filter_candidates, merge_across_boundary, merge_and_filter};
use crate::profile::{AdaptedConfig, AudioProfiler};
use crate::spectral::SpectralFrontend;

/// Per-segment acoustic event detector
pub struct EventDetector {
    config: DetectorConfig,
    /// Smoothing factor applied when re-profiling mid-segment
    smoothing_alpha: f32,
}

impl EventDetector {
    /// Create a detector, validating the configuration up front
    pub fn new(config: DetectorConfig) -> Result<Self, DetectionError> {
        if let Err(err) = config.validate() {
            log_config_error(&err, "EventDetector::new");
            return Err(err.into());
        }
        Ok(Self {
            config,
            smoothing_alpha: 0.3,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect events in one segment's sample buffer
    ///
    /// # Arguments
    /// * `samples` - Mono PCM samples; non-finite values are sanitized
    /// * `sample_rate` - Sample rate in Hz
    /// * `segment_id` - Carried onto every emitted event
    ///
    /// # Returns
    /// Segment-relative FinalEvents, sorted by start time. Timing is
    /// relative to the segment start; the caller resolves absolute
    /// recording time before deduplication.
    pub fn detect(
        &self,
        samples: &[f32],
        sample_rate: u32,
        segment_id: u64,
    ) -> Result<Vec<FinalEvent>, DetectionError> {
        let frontend = SpectralFrontend::new(&self.config.spectral, sample_rate)?;

        let chunk_samples =
            (self.config.chunking.chunk_sec * sample_rate as f32) as usize;
        let candidates = if samples.len() <= chunk_samples || chunk_samples == 0 {
            self.detect_whole(&frontend, samples)
        } else {
            self.detect_chunked(&frontend, samples, sample_rate)
        };

        let events: Vec<FinalEvent> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| FinalEvent::from_candidate(c, i as u64 + 1, segment_id))
            .collect();

        log::info!(
            "[Detector] Segment {}: {} event(s) from {} samples at {} Hz",
            segment_id,
            events.len(),
            samples.len(),
            sample_rate
        );
        Ok(events)
    }

    /// Single-chunk path for buffers within the chunk limit
    fn detect_whole(&self, frontend: &SpectralFrontend, samples: &[f32]) -> Vec<CandidateEvent> {
        let mut bundle = frontend.analyze(samples, &self.config.detection);
        if bundle.is_empty() {
            return Vec::new();
        }

        let profile = AudioProfiler::profile(&self.profiling_view(frontend, samples));
        let adapted = AdaptedConfig::adapt(&profile, &self.config.detection);
        rebind_band_tracks(&mut bundle, &adapted);

        let candidates = generate_candidates(&bundle, &adapted, None);
        merge_and_filter(candidates, &adapted)
    }

    /// Chunked path: overlapping chunks, serialized baseline carry-over,
    /// periodic re-profiling with exponential smoothing
    fn detect_chunked(
        &self,
        frontend: &SpectralFrontend,
        samples: &[f32],
        sample_rate: u32,
    ) -> Vec<CandidateEvent> {
        let chunk_samples = (self.config.chunking.chunk_sec * sample_rate as f32) as usize;
        let overlap_samples =
            (self.config.chunking.overlap_sec * sample_rate as f32) as usize;
        let step = chunk_samples.saturating_sub(overlap_samples).max(1);

        let mut merged: Vec<CandidateEvent> = Vec::new();
        let mut adapted: Option<AdaptedConfig> = None;
        let mut carries: Option<Vec<Vec<f32>>> = None;
        let mut sec_since_profile = f32::INFINITY;

        let mut chunk_start = 0usize;
        let mut chunk_index = 0usize;
        while chunk_start < samples.len() {
            let chunk_end = (chunk_start + chunk_samples).min(samples.len());
            let chunk = &samples[chunk_start..chunk_end];
            let offset_ms = chunk_start as f64 * 1000.0 / sample_rate as f64;

            let mut bundle = frontend.analyze(chunk, &self.config.detection);
            if bundle.is_empty() {
                break;
            }

            // Re-profile at the configured interval and smooth into the
            // running parameters instead of switching abruptly
            let current = if sec_since_profile >= self.config.chunking.reprofile_interval_sec {
                sec_since_profile = 0.0;
                let profile = AudioProfiler::profile(&bundle);
                let candidate_config = AdaptedConfig::adapt(&profile, &self.config.detection);
                match adapted.take() {
                    Some(previous) => previous.blend(&candidate_config, self.smoothing_alpha),
                    None => candidate_config,
                }
            } else {
                adapted.take().unwrap_or_else(|| {
                    AdaptedConfig::from_base(&self.config.detection)
                })
            };
            sec_since_profile += chunk.len() as f32 / sample_rate as f32;
            rebind_band_tracks(&mut bundle, &current);

            let mut chunk_candidates =
                generate_candidates(&bundle, &current, carries.as_deref());
            for candidate in chunk_candidates.iter_mut() {
                candidate.start_ms += offset_ms;
                candidate.end_ms += offset_ms;
            }
            let chunk_candidates = merge_and_filter(chunk_candidates, &current);

            // Carry each band's energy tail into the next chunk's baseline
            let window_frames = ((current.baseline_window_sec * 1000.0 / bundle.hop_ms)
                .round() as usize)
                .max(1);
            carries = Some(
                bundle
                    .band_energy
                    .iter()
                    .map(|track| crate::baseline::baseline_carry_tail(track, window_frames))
                    .collect(),
            );

            merged = if chunk_index == 0 {
                chunk_candidates
            } else {
                merge_across_boundary(
                    merged,
                    chunk_candidates,
                    &current,
                    self.config.chunking.boundary_band_tolerance_hz,
                )
            };

            adapted = Some(current);
            chunk_index += 1;
            if chunk_end == samples.len() {
                break;
            }
            chunk_start += step;
        }

        // Seam merging can grow an event past the duration cap; re-apply
        // the duration/confidence filter to the assembled list
        let merged = match adapted.as_ref() {
            Some(config) => filter_candidates(merged, config),
            None => merged,
        };

        log::debug!(
            "[Detector] Processed {} chunk(s), {} candidate(s) after seam merging",
            chunk_index,
            merged.len()
        );
        merged
    }

    /// Representative profiling window: centered, up to 30 seconds
    fn profiling_view<'a>(
        &self,
        frontend: &SpectralFrontend,
        samples: &'a [f32],
    ) -> crate::spectral::FeatureBundle {
        let max_samples = 30 * frontend.sample_rate() as usize;
        let view = if samples.len() > max_samples {
            let start = (samples.len() - max_samples) / 2;
            &samples[start..start + max_samples]
        } else {
            samples
        };
        frontend.analyze(view, &self.config.detection)
    }
}

/// Recompute the band-energy tracks against the adapted band edges
///
/// The frontend computes tracks from the base config before profiling has
/// run; adaptation may shift band edges (wind, insect factors), and the
/// hysteresis detector must see energy for the edges it reports.
fn rebind_band_tracks(bundle: &mut crate::spectral::FeatureBundle, adapted: &AdaptedConfig) {
    bundle.band_energy = crate::spectral::features::band_energy_tracks(
        &bundle.mel.linear,
        &bundle.mel.band_hz,
        &adapted.bands,
    );
}
