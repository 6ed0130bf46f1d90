// Power spectrum computation with windowing
//
// Power-of-two transform sizes go through rustfft's radix-2 path; any
// other size falls back to a direct O(N^2) DFT. Both paths return the
// same power spectrum (magnitude squared, floored) within floating
// tolerance, so callers never need to care which one ran.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Arc, Mutex};

use super::types::POWER_FLOOR;

/// Power spectrum processor for one fixed transform size
pub struct FftProcessor {
    fft_planner: Arc<Mutex<FftPlanner<f32>>>,
    transform_size: usize,
    /// Pre-computed Hann window, sized to the analysis window (which may
    /// be shorter than the transform; the remainder is zero-padded)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a processor for the given transform and analysis window sizes
    ///
    /// # Arguments
    /// * `transform_size` - FFT/DFT length in samples
    /// * `window_samples` - Analysis window length; clamped to transform_size
    pub fn new(transform_size: usize, window_samples: usize) -> Self {
        let window_samples = window_samples.min(transform_size).max(2);

        // Pre-compute Hann window to reduce spectral leakage
        let window = (0..window_samples)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (window_samples as f32 - 1.0))
                        .cos())
            })
            .collect();

        Self {
            fft_planner: Arc::new(Mutex::new(FftPlanner::new())),
            transform_size,
            window,
        }
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    /// Number of bins in the returned power spectrum
    pub fn spectrum_len(&self) -> usize {
        self.transform_size / 2 + 1
    }

    /// Compute the power spectrum of one analysis frame
    ///
    /// Applies Hann windowing, zero-pads to the transform size, and returns
    /// magnitude-squared values for the positive frequencies only, floored
    /// at POWER_FLOOR. Non-finite samples contribute zero.
    ///
    /// # Arguments
    /// * `frame` - Audio frame (length <= transform_size; extra samples ignored)
    pub fn power_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(self.transform_size);

        for (i, &sample) in frame.iter().take(self.window.len()).enumerate() {
            let sample = if sample.is_finite() { sample } else { 0.0 };
            buffer.push(Complex::new(sample * self.window[i], 0.0));
        }
        while buffer.len() < self.transform_size {
            buffer.push(Complex::new(0.0, 0.0));
        }

        if self.transform_size.is_power_of_two() {
            let mut planner = self.fft_planner.lock().unwrap();
            let fft = planner.plan_fft_forward(self.transform_size);
            fft.process(&mut buffer);
        } else {
            buffer = direct_dft(&buffer);
        }

        buffer[..self.spectrum_len()]
            .iter()
            .map(|c| (c.norm_sqr()).max(POWER_FLOOR))
            .collect()
    }
}

/// Direct O(N^2) DFT for non-power-of-two transform sizes
fn direct_dft(input: &[Complex<f32>]) -> Vec<Complex<f32>> {
    let n = input.len();
    let mut output = vec![Complex::new(0.0, 0.0); n];
    let step = -2.0 * std::f64::consts::PI / n as f64;

    for (k, out) in output.iter_mut().enumerate() {
        // Accumulate in f64 so long frames don't lose precision
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for (t, c) in input.iter().enumerate() {
            let angle = step * (k * t % n) as f64;
            let (sin, cos) = angle.sin_cos();
            re += c.re as f64 * cos - c.im as f64 * sin;
            im += c.re as f64 * sin + c.im as f64 * cos;
        }
        *out = Complex::new(re as f32, im as f32);
    }

    output
}
