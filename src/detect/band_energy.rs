// Per-band energy hysteresis detector
//
// One explicit IDLE/ACTIVE state machine per configured target band,
// no shared mutable state between bands. The machine enters ACTIVE when
// the band energy crosses the onset threshold, tracks the running peak,
// and emits a candidate when the energy drops below the offset threshold.
// Events still ACTIVE at the end of the track are flushed with the track
// end as their offset rather than silently dropped.

use crate::baseline::{rolling_median_baseline, threshold_tracks};
use crate::config::FrequencyBand;
use crate::events::{CandidateEvent, DetectionMethod};
use crate::profile::AdaptedConfig;
use crate::spectral::FeatureBundle;

/// Hysteresis machine state
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Active {
        start_frame: usize,
        peak_frame: usize,
        peak_value: f32,
    },
}

/// Per-band hysteresis detector
struct BandHysteresis {
    state: State,
}

impl BandHysteresis {
    fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Advance the machine by one frame
    ///
    /// # Returns
    /// `Some((start_frame, end_frame, peak_frame, peak_value))` when an
    /// ACTIVE->IDLE transition completes an event
    fn step(
        &mut self,
        frame: usize,
        signal: f32,
        onset: f32,
        offset: f32,
    ) -> Option<(usize, usize, usize, f32)> {
        match self.state {
            State::Idle => {
                if signal > onset {
                    self.state = State::Active {
                        start_frame: frame,
                        peak_frame: frame,
                        peak_value: signal,
                    };
                }
                None
            }
            State::Active {
                start_frame,
                peak_frame,
                peak_value,
            } => {
                if signal < offset {
                    self.state = State::Idle;
                    Some((start_frame, frame, peak_frame, peak_value))
                } else {
                    if signal > peak_value {
                        self.state = State::Active {
                            start_frame,
                            peak_frame: frame,
                            peak_value: signal,
                        };
                    }
                    None
                }
            }
        }
    }

    /// Flush a trailing ACTIVE event at the end of the track
    fn flush(&mut self, end_frame: usize) -> Option<(usize, usize, usize, f32)> {
        if let State::Active {
            start_frame,
            peak_frame,
            peak_value,
        } = self.state
        {
            self.state = State::Idle;
            Some((start_frame, end_frame, peak_frame, peak_value))
        } else {
            None
        }
    }
}

/// Run the hysteresis detector over one band's energy track
///
/// # Arguments
/// * `bundle` - Feature bundle for the segment
/// * `band_index` - Index into `bundle.band_energy`
/// * `band` - The band's frequency bounds and label
/// * `config` - Adapted detection parameters
/// * `carry` - Optional energy tail from the previous chunk's track, used
///   to seed the rolling baseline
pub fn detect_band_events(
    bundle: &FeatureBundle,
    band_index: usize,
    band: &FrequencyBand,
    config: &AdaptedConfig,
    carry: Option<&[f32]>,
) -> Vec<CandidateEvent> {
    let track = match bundle.band_energy.get(band_index) {
        Some(track) if !track.is_empty() => track,
        _ => return Vec::new(),
    };

    let window_frames =
        ((config.baseline_window_sec * 1000.0 / bundle.hop_ms).round() as usize).max(1);
    let baseline = rolling_median_baseline(track, window_frames, carry);
    let (onset, offset) = threshold_tracks(
        &baseline,
        config.onset_threshold_db,
        config.offset_threshold_db,
    );

    let mut machine = BandHysteresis::new();
    let mut raw: Vec<(usize, usize, usize, f32)> = Vec::new();

    for t in 0..track.len() {
        if let Some(event) = machine.step(t, track[t], onset[t], offset[t]) {
            raw.push(event);
        }
    }
    if let Some(event) = machine.flush(track.len()) {
        raw.push(event);
    }

    // A frame enters ACTIVE as soon as its tail overlaps the sound, so
    // the raw frame start leads the physical onset by up to window - hop;
    // stamp onsets with that lead removed. Offsets need no correction:
    // the first inactive frame starts at the physical end.
    let onset_lead_ms = (bundle.window_ms - bundle.hop_ms).max(0.0) as f64;

    let mut events = Vec::new();
    for (start_frame, end_frame, peak_frame, peak_value) in raw {
        let start_ms = bundle.frame_to_ms(start_frame) + onset_lead_ms;
        let end_ms = bundle.frame_to_ms(end_frame);
        let duration = end_ms - start_ms;
        if duration < config.min_duration_ms as f64 || duration > config.max_duration_ms as f64 {
            continue;
        }

        let peak_baseline = baseline[peak_frame].max(f32::MIN_POSITIVE);
        let snr_db = 20.0 * (peak_value / peak_baseline).log10();
        let confidence = (snr_db / 20.0).clamp(0.1, 1.0);

        let peak_hz = crate::spectral::features::peak_hz_in_band(
            &bundle.mel.linear[peak_frame],
            &bundle.mel.band_hz,
            band,
        );

        events.push(CandidateEvent {
            start_ms,
            end_ms,
            low_hz: band.low_hz,
            high_hz: band.high_hz,
            peak_hz,
            snr_db,
            confidence,
            method: DetectionMethod::BandEnergy,
            band: Some(band.name.clone()),
        });
    }

    if !events.is_empty() {
        log::debug!(
            "[BandEnergy] Band '{}' produced {} candidate(s)",
            band.name,
            events.len()
        );
    }
    events
}
