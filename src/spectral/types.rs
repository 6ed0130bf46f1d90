// Data structures for the spectral frontend

/// Floor applied to every power value so downstream log/division never
/// sees a true zero
pub const POWER_FLOOR: f32 = 1e-10;

/// Mel-scaled spectrogram
///
/// `linear` always holds the raw mel power (used for band energy and SNR
/// math); `transformed` holds the optionally log-scaled and whitened grid
/// used for novelty and entropy.
#[derive(Debug, Clone)]
pub struct MelSpectrogram {
    /// Raw mel power: `linear[frame][band]`
    pub linear: Vec<Vec<f32>>,
    /// Log/whitened view of the same grid
    pub transformed: Vec<Vec<f32>>,
    /// Center frequency of each mel band in Hz
    pub band_hz: Vec<f32>,
}

impl MelSpectrogram {
    pub fn frames(&self) -> usize {
        self.linear.len()
    }

    pub fn bands(&self) -> usize {
        self.band_hz.len()
    }
}

/// Everything the candidate generators and profiler need for one segment
///
/// All 1-D tracks have exactly `mel.frames()` entries.
#[derive(Debug, Clone)]
pub struct FeatureBundle {
    pub mel: MelSpectrogram,
    /// Half-wave-rectified mel flux, averaged across bands
    pub novelty: Vec<f32>,
    /// Shannon entropy of the per-band energy distribution, in [0, 1]
    pub entropy: Vec<f32>,
    /// Mean linear mel power per configured target band: `band_energy[band][frame]`
    pub band_energy: Vec<Vec<f32>>,
    /// Hop length in milliseconds (frame t starts at t * hop_ms)
    pub hop_ms: f32,
    /// Window length in milliseconds
    pub window_ms: f32,
    pub sample_rate: u32,
}

impl FeatureBundle {
    /// An empty bundle for buffers too short to produce a single frame
    pub fn empty(hop_ms: f32, window_ms: f32, sample_rate: u32) -> Self {
        Self {
            mel: MelSpectrogram {
                linear: Vec::new(),
                transformed: Vec::new(),
                band_hz: Vec::new(),
            },
            novelty: Vec::new(),
            entropy: Vec::new(),
            band_energy: Vec::new(),
            hop_ms,
            window_ms,
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.mel.frames()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Convert a frame index to its segment-relative start time in ms
    pub fn frame_to_ms(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_ms as f64
    }
}
