// Mel filter bank construction and application
//
// Uses the standard mel <-> Hz mapping (mel = 2595 * log10(1 + f/700))
// consistently in both directions. A bank whose weights sum to ~0 is a
// construction bug (bad edges or sample rate) and fails loudly instead
// of silently producing an all-zero mel grid.

use super::types::POWER_FLOOR;
use crate::error::SpectralError;

/// Log-transform epsilon: ln(x + LOG_EPS)
pub const LOG_EPS: f32 = 1e-9;

/// Convert Hz to mel
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel to Hz
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filter bank over FFT power spectrum bins
pub struct MelFilterBank {
    /// `weights[band][bin]`, triangular, sparse in practice
    weights: Vec<Vec<f32>>,
    /// Center frequency of each mel band in Hz
    band_hz: Vec<f32>,
}

impl MelFilterBank {
    /// Build a bank of `n_bands` triangular filters spanning 0 Hz to Nyquist
    ///
    /// # Arguments
    /// * `n_bands` - Number of mel bands
    /// * `spectrum_len` - Power spectrum length (fft_size / 2 + 1)
    /// * `fft_size` - Transform size used to produce the spectrum
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Err(SpectralError::FilterBankDegenerate)` if the total filter
    ///   weight is effectively zero
    pub fn new(
        n_bands: usize,
        spectrum_len: usize,
        fft_size: usize,
        sample_rate: u32,
    ) -> Result<Self, SpectralError> {
        if sample_rate == 0 {
            return Err(SpectralError::InvalidSampleRate { sample_rate });
        }

        let nyquist = sample_rate as f32 / 2.0;
        let mel_max = hz_to_mel(nyquist);

        // n_bands + 2 equally spaced mel points define the triangle edges
        let mel_points: Vec<f32> = (0..n_bands + 2)
            .map(|i| mel_max * i as f32 / (n_bands + 1) as f32)
            .collect();
        let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();

        let bin_hz = sample_rate as f32 / fft_size as f32;
        let mut weights = Vec::with_capacity(n_bands);
        let mut band_hz = Vec::with_capacity(n_bands);
        let mut total_weight = 0.0f32;

        for band in 0..n_bands {
            let left = hz_points[band];
            let center = hz_points[band + 1];
            let right = hz_points[band + 2];

            let mut filter = vec![0.0f32; spectrum_len];
            for (bin, w) in filter.iter_mut().enumerate() {
                let freq = bin as f32 * bin_hz;
                if freq > left && freq < center && center > left {
                    *w = (freq - left) / (center - left);
                } else if freq >= center && freq < right && right > center {
                    *w = (right - freq) / (right - center);
                }
                total_weight += *w;
            }

            weights.push(filter);
            band_hz.push(center);
        }

        if total_weight < 1e-6 {
            return Err(SpectralError::FilterBankDegenerate { total_weight });
        }

        Ok(Self { weights, band_hz })
    }

    pub fn n_bands(&self) -> usize {
        self.weights.len()
    }

    pub fn band_hz(&self) -> &[f32] {
        &self.band_hz
    }

    /// Apply the bank to one power spectrum frame
    ///
    /// # Returns
    /// Mel power per band, floored at POWER_FLOOR
    pub fn apply(&self, power_spectrum: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|filter| {
                let energy: f32 = filter
                    .iter()
                    .zip(power_spectrum.iter())
                    .map(|(&w, &p)| w * p)
                    .sum();
                energy.max(POWER_FLOOR)
            })
            .collect()
    }
}

/// Apply ln(x + eps) to a mel grid in place
pub fn log_transform(grid: &mut [Vec<f32>]) {
    for frame in grid.iter_mut() {
        for value in frame.iter_mut() {
            *value = (*value + LOG_EPS).ln();
        }
    }
}

/// Per-band z-score whitening over the segment's own frames
///
/// Bands with zero variance are left centered at 0 rather than divided
/// by zero.
pub fn whiten(grid: &mut [Vec<f32>]) {
    if grid.is_empty() {
        return;
    }
    let n_frames = grid.len() as f32;
    let n_bands = grid[0].len();

    for band in 0..n_bands {
        let mean: f32 = grid.iter().map(|frame| frame[band]).sum::<f32>() / n_frames;
        let variance: f32 = grid
            .iter()
            .map(|frame| {
                let d = frame[band] - mean;
                d * d
            })
            .sum::<f32>()
            / n_frames;
        let std = variance.sqrt();

        for frame in grid.iter_mut() {
            frame[band] = if std > 1e-12 {
                (frame[band] - mean) / std
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_hz_roundtrip() {
        for &hz in &[100.0f32, 440.0, 1000.0, 4000.0, 8000.0, 15000.0] {
            let roundtrip = mel_to_hz(hz_to_mel(hz));
            assert!(
                (roundtrip - hz).abs() < 0.5,
                "roundtrip {} -> {}",
                hz,
                roundtrip
            );
        }
    }

    #[test]
    fn test_mel_mapping_reference_point() {
        // 1000 Hz is almost exactly 1000 mel in the 2595 * log10 convention
        let mel = hz_to_mel(1000.0);
        assert!((mel - 999.98).abs() < 0.5, "1000 Hz -> {} mel", mel);
    }

    #[test]
    fn test_bank_construction() {
        let bank = MelFilterBank::new(96, 513, 1024, 32000).unwrap();
        assert_eq!(bank.n_bands(), 96);
        assert_eq!(bank.band_hz().len(), 96);

        // Band centers must be strictly increasing
        for pair in bank.band_hz().windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_degenerate_bank_rejected() {
        // One-bin spectrum cannot carry any triangle weight
        let result = MelFilterBank::new(96, 1, 1024, 32000);
        assert!(matches!(
            result,
            Err(SpectralError::FilterBankDegenerate { .. })
        ));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let result = MelFilterBank::new(96, 513, 1024, 0);
        assert!(matches!(
            result,
            Err(SpectralError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn test_tone_energy_lands_near_tone_band() {
        let sample_rate = 32000;
        let fft_size = 1024;
        let bank = MelFilterBank::new(96, 513, fft_size, sample_rate).unwrap();

        // Synthetic spectrum: all floor except the 4000 Hz bin
        let mut spectrum = vec![POWER_FLOOR; 513];
        let bin = (4000.0 / (sample_rate as f32 / fft_size as f32)) as usize;
        spectrum[bin] = 1.0;

        let mel = bank.apply(&spectrum);
        let peak_band = mel
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        let peak_hz = bank.band_hz()[peak_band];
        assert!(
            (peak_hz - 4000.0).abs() < 500.0,
            "tone energy peaked at {} Hz",
            peak_hz
        );
    }

    #[test]
    fn test_whiten_zero_variance_band() {
        let mut grid = vec![vec![3.0f32; 4]; 10];
        whiten(&mut grid);
        for frame in &grid {
            for &v in frame {
                assert_eq!(v, 0.0);
            }
        }
    }

    #[test]
    fn test_whiten_normalizes() {
        let mut grid: Vec<Vec<f32>> = (0..100).map(|i| vec![i as f32]).collect();
        whiten(&mut grid);

        let mean: f32 = grid.iter().map(|f| f[0]).sum::<f32>() / 100.0;
        let var: f32 = grid.iter().map(|f| f[0] * f[0]).sum::<f32>() / 100.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }
}
