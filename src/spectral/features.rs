// Derived 1-D feature tracks over the mel grid
//
// All tracks have exactly one entry per frame. Degenerate frames (zero
// total energy) produce defined sentinel values instead of NaN.

use crate::config::FrequencyBand;

/// Spectral novelty: half-wave-rectified frame-to-frame mel flux,
/// averaged across bands
///
/// Frame 0 has no predecessor and gets novelty 0.
pub fn spectral_novelty(grid: &[Vec<f32>]) -> Vec<f32> {
    let mut novelty = Vec::with_capacity(grid.len());
    if grid.is_empty() {
        return novelty;
    }

    novelty.push(0.0);
    for t in 1..grid.len() {
        let n_bands = grid[t].len().max(1);
        let flux: f32 = grid[t]
            .iter()
            .zip(grid[t - 1].iter())
            .map(|(&curr, &prev)| (curr - prev).max(0.0))
            .sum();
        novelty.push(flux / n_bands as f32);
    }
    novelty
}

/// Energy entropy: Shannon entropy of the per-band energy distribution
/// per frame, normalized to [0, 1]
///
/// A flat distribution (noise-like frame) gives 1, a single-band spike
/// gives ~0. Zero-energy frames are defined as 0.
pub fn energy_entropy(linear_grid: &[Vec<f32>]) -> Vec<f32> {
    linear_grid
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total <= 0.0 || frame.len() < 2 {
                return 0.0;
            }

            let mut entropy = 0.0f32;
            for &e in frame {
                let p = e / total;
                if p > 0.0 {
                    entropy -= p * p.ln();
                }
            }
            (entropy / (frame.len() as f32).ln()).clamp(0.0, 1.0)
        })
        .collect()
}

/// Mean linear mel power per target band, one track per band
///
/// A band that covers no mel bins (out of analysis range) yields a track
/// of zeros rather than an error; the hysteresis detector then simply
/// never fires for it.
pub fn band_energy_tracks(
    linear_grid: &[Vec<f32>],
    band_hz: &[f32],
    bands: &[FrequencyBand],
) -> Vec<Vec<f32>> {
    bands
        .iter()
        .map(|band| {
            let bins: Vec<usize> = band_hz
                .iter()
                .enumerate()
                .filter(|(_, &hz)| hz >= band.low_hz && hz <= band.high_hz)
                .map(|(i, _)| i)
                .collect();

            if bins.is_empty() {
                log::warn!(
                    "[Features] Band '{}' ({}-{} Hz) covers no mel bins",
                    band.name,
                    band.low_hz,
                    band.high_hz
                );
                return vec![0.0; linear_grid.len()];
            }

            linear_grid
                .iter()
                .map(|frame| {
                    bins.iter().map(|&b| frame[b]).sum::<f32>() / bins.len() as f32
                })
                .collect()
        })
        .collect()
}

/// Mel bin with maximum energy inside a band at one frame, as Hz
///
/// Used to estimate an event's peak frequency at its loudest frame.
pub fn peak_hz_in_band(
    frame: &[f32],
    band_hz: &[f32],
    band: &FrequencyBand,
) -> f32 {
    let mut best_hz = band.center_hz();
    let mut best_energy = f32::MIN;
    for (i, &hz) in band_hz.iter().enumerate() {
        if hz >= band.low_hz && hz <= band.high_hz && frame[i] > best_energy {
            best_energy = frame[i];
            best_hz = hz;
        }
    }
    best_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_novelty_zero_for_constant_grid() {
        let grid = vec![vec![1.0f32; 8]; 10];
        let novelty = spectral_novelty(&grid);
        assert_eq!(novelty.len(), 10);
        for &n in &novelty {
            assert_eq!(n, 0.0);
        }
    }

    #[test]
    fn test_novelty_positive_on_energy_rise() {
        let mut grid = vec![vec![0.1f32; 8]; 10];
        grid[5] = vec![2.0; 8];
        let novelty = spectral_novelty(&grid);

        assert!(novelty[5] > 1.0, "rise frame novelty {}", novelty[5]);
        // Energy drop at frame 6 is half-wave rectified away
        assert_eq!(novelty[6], 0.0);
    }

    #[test]
    fn test_entropy_flat_vs_spike() {
        let flat = vec![vec![1.0f32; 16]];
        let mut spike_frame = vec![1e-6f32; 16];
        spike_frame[3] = 10.0;
        let spike = vec![spike_frame];

        let flat_entropy = energy_entropy(&flat)[0];
        let spike_entropy = energy_entropy(&spike)[0];

        assert!((flat_entropy - 1.0).abs() < 1e-3, "flat {}", flat_entropy);
        assert!(spike_entropy < 0.1, "spike {}", spike_entropy);
    }

    #[test]
    fn test_entropy_zero_energy_frame() {
        let grid = vec![vec![0.0f32; 16]];
        assert_eq!(energy_entropy(&grid)[0], 0.0);
    }

    #[test]
    fn test_band_energy_selects_bins() {
        let band_hz = vec![500.0, 1500.0, 4000.0, 9000.0];
        let grid = vec![vec![1.0f32, 10.0, 20.0, 100.0]; 3];
        let bands = vec![FrequencyBand::new("mid_freq", 1000.0, 8000.0)];

        let tracks = band_energy_tracks(&grid, &band_hz, &bands);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 3);
        // Bins 1 and 2 are inside the band: (10 + 20) / 2
        assert!((tracks[0][0] - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_band_with_no_bins_yields_zeros() {
        let band_hz = vec![500.0, 1500.0];
        let grid = vec![vec![1.0f32, 1.0]; 4];
        let bands = vec![FrequencyBand::new("ultrasonic", 40_000.0, 90_000.0)];

        let tracks = band_energy_tracks(&grid, &band_hz, &bands);
        assert_eq!(tracks[0], vec![0.0; 4]);
    }

    #[test]
    fn test_peak_hz_in_band() {
        let band_hz = vec![500.0, 1500.0, 4000.0, 6000.0];
        let frame = vec![0.1f32, 0.2, 5.0, 0.3];
        let band = FrequencyBand::new("mid_freq", 1000.0, 8000.0);

        assert_eq!(peak_hz_in_band(&frame, &band_hz, &band), 4000.0);
    }
}
