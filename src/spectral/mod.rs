// Spectral frontend - sample buffer to FeatureBundle
//
// Pipeline: frame the buffer (Hann window, configured window/hop) ->
// power spectrum per frame (FFT or DFT fallback) -> mel filter bank ->
// optional log transform and per-band whitening -> derived 1-D tracks
// (spectral novelty, energy entropy, per-target-band energy).
//
// Module organization:
// - types: MelSpectrogram, FeatureBundle
// - fft: windowed power spectrum with radix-2 FFT / direct DFT fallback
// - mel: mel mapping, triangular filter bank, log/whitening transforms
// - features: novelty, entropy, band-energy tracks
// - mod.rs: coordinator (SpectralFrontend)
//
// The frontend holds no state across calls; analyzing a segment twice
// produces identical bundles.

mod fft;
pub mod features;
pub mod mel;
pub mod types;

pub use fft::FftProcessor;
pub use types::{FeatureBundle, MelSpectrogram, POWER_FLOOR};

use crate::config::{DetectionConfig, SpectralConfig};
use crate::error::SpectralError;
use mel::MelFilterBank;

/// Spectral frontend coordinating the analysis pipeline for one
/// (sample rate, config) pair
pub struct SpectralFrontend {
    processor: FftProcessor,
    filter_bank: MelFilterBank,
    config: SpectralConfig,
    window_samples: usize,
    hop_samples: usize,
    sample_rate: u32,
}

impl SpectralFrontend {
    /// Build a frontend for the given sample rate
    ///
    /// # Returns
    /// * `Err(SpectralError)` if the sample rate is unusable or the mel
    ///   filter bank comes out degenerate
    pub fn new(config: &SpectralConfig, sample_rate: u32) -> Result<Self, SpectralError> {
        if sample_rate == 0 {
            return Err(SpectralError::InvalidSampleRate { sample_rate });
        }

        let window_samples =
            ((config.window_ms / 1000.0) * sample_rate as f32).round() as usize;
        let hop_samples = ((config.hop_ms / 1000.0) * sample_rate as f32).round() as usize;
        let window_samples = window_samples.max(2);
        let hop_samples = hop_samples.max(1);

        // The transform must fit the analysis window
        let transform_size = config.fft_size.max(window_samples);
        let processor = FftProcessor::new(transform_size, window_samples);
        let filter_bank = MelFilterBank::new(
            config.mel_bands,
            processor.spectrum_len(),
            processor.transform_size(),
            sample_rate,
        )?;

        Ok(Self {
            processor,
            filter_bank,
            config: config.clone(),
            window_samples,
            hop_samples,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames a buffer of `n` samples produces
    pub fn frame_count(&self, n: usize) -> usize {
        if n < self.window_samples {
            0
        } else {
            (n - self.window_samples) / self.hop_samples + 1
        }
    }

    /// Analyze one sample buffer into a FeatureBundle
    ///
    /// Buffers too short for a single frame yield an empty bundle, never
    /// an error: short trailing segments are a normal input.
    ///
    /// # Arguments
    /// * `samples` - Mono PCM samples; non-finite values are treated as 0
    /// * `detection` - Supplies the target bands for the energy tracks
    pub fn analyze(&self, samples: &[f32], detection: &DetectionConfig) -> FeatureBundle {
        let n_frames = self.frame_count(samples.len());
        if n_frames == 0 {
            log::debug!(
                "[Spectral] Buffer of {} samples too short for one {}-sample frame",
                samples.len(),
                self.window_samples
            );
            return FeatureBundle::empty(
                self.config.hop_ms,
                self.config.window_ms,
                self.sample_rate,
            );
        }

        // Linear mel power grid, one row per frame
        let mut linear: Vec<Vec<f32>> = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let start = t * self.hop_samples;
            let frame = &samples[start..start + self.window_samples];
            let spectrum = self.processor.power_spectrum(frame);
            linear.push(self.filter_bank.apply(&spectrum));
        }

        // Transformed view for novelty/entropy; band energy and SNR math
        // stay on the linear grid
        let mut transformed = linear.clone();
        if self.config.log_transform {
            mel::log_transform(&mut transformed);
        }
        if self.config.whiten {
            mel::whiten(&mut transformed);
        }

        let novelty = features::spectral_novelty(&transformed);
        let entropy = features::energy_entropy(&linear);
        let band_energy =
            features::band_energy_tracks(&linear, self.filter_bank.band_hz(), &detection.bands);

        FeatureBundle {
            mel: MelSpectrogram {
                linear,
                transformed,
                band_hz: self.filter_bank.band_hz().to_vec(),
            },
            novelty,
            entropy,
            band_energy,
            hop_ms: self.config.hop_ms,
            window_ms: self.config.window_ms,
            sample_rate: self.sample_rate,
        }
    }
}
