// FFT module - Discrete Fourier transform of sample windows
//
// The window is treated as a real signal with a zero imaginary part. No
// tapering window is applied: the quality model was trained on raw DFT
// magnitudes, so the magnitudes must match an unwindowed transform.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Arc, Mutex};

/// FFT processor that computes half-spectrum magnitudes
///
/// Plans are cached by the planner, so repeated windows of the same length
/// reuse the same plan.
pub struct FftProcessor {
    fft_planner: Arc<Mutex<FftPlanner<f64>>>,
}

impl FftProcessor {
    pub fn new() -> Self {
        Self {
            fft_planner: Arc::new(Mutex::new(FftPlanner::new())),
        }
    }

    /// Compute DFT magnitudes of the first ⌊N/2⌋ coefficients
    ///
    /// # Arguments
    /// * `samples` - Time-domain window of any length
    ///
    /// # Returns
    /// Magnitude sequence of length `samples.len() / 2` (empty for N < 2)
    pub fn half_spectrum_magnitudes(&self, samples: &[f64]) -> Vec<f64> {
        let len = samples.len();
        let half = len / 2;
        if half == 0 {
            return Vec::new();
        }

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&sample| Complex::new(sample, 0.0))
            .collect();

        let fft = {
            // A poisoned planner only means another extraction panicked; the plan cache is intact
            let mut planner = self
                .fft_planner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            planner.plan_fft_forward(len)
        };
        fft.process(&mut buffer);

        buffer[..half].iter().map(|c| c.norm()).collect()
    }
}

impl Default for FftProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_spectrum_length() {
        let fft = FftProcessor::new();
        assert!(fft.half_spectrum_magnitudes(&[]).is_empty());
        assert!(fft.half_spectrum_magnitudes(&[1.0]).is_empty());
        assert_eq!(fft.half_spectrum_magnitudes(&[1.0; 7]).len(), 3);
        assert_eq!(fft.half_spectrum_magnitudes(&[1.0; 200]).len(), 100);
    }

    #[test]
    fn test_constant_signal_energy_in_dc_bin() {
        let fft = FftProcessor::new();
        let magnitudes = fft.half_spectrum_magnitudes(&[2.0; 8]);

        assert!((magnitudes[0] - 16.0).abs() < 1e-9);
        for &mag in &magnitudes[1..] {
            assert!(mag.abs() < 1e-9, "expected no energy outside DC, got {}", mag);
        }
    }

    #[test]
    fn test_cosine_peak_location() {
        let fft = FftProcessor::new();
        let n = 64;
        let cycles = 5.0;
        let signal: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * cycles * i as f64 / n as f64).cos())
            .collect();
        let magnitudes = fft.half_spectrum_magnitudes(&signal);

        // A unit cosine with an integer cycle count puts N/2 into its bin
        assert!((magnitudes[5] - n as f64 / 2.0).abs() < 1e-6);
    }
}
