// Spectral module - Statistics over the half-spectrum magnitudes
//
// All features are derived from magnitudes (absolute values of DFT
// coefficients), so every output is non-negative for real input.

/// Summary statistics of a magnitude sequence
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectralSummary {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub max: f64,
    pub min: f64,
    /// Index of the first maximum within the retained half-spectrum
    pub peak_bin: Option<usize>,
}

/// Spectral feature computation functions
pub struct SpectralFeatures;

impl SpectralFeatures {
    pub fn new() -> Self {
        Self
    }

    /// Summarize retained magnitudes
    ///
    /// Returns the all-zero summary (and no peak) for an empty spectrum.
    pub fn summarize(&self, magnitudes: &[f64]) -> SpectralSummary {
        if magnitudes.is_empty() {
            return SpectralSummary::default();
        }

        let count = magnitudes.len() as f64;
        let mean = magnitudes.iter().sum::<f64>() / count;
        let variance = magnitudes
            .iter()
            .map(|&mag| (mag - mean) * (mag - mean))
            .sum::<f64>()
            / count;

        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut peak_bin = 0;
        for (i, &mag) in magnitudes.iter().enumerate() {
            if mag > max {
                max = mag;
                peak_bin = i;
            }
            min = min.min(mag);
        }

        SpectralSummary {
            mean,
            std_dev: variance.sqrt(),
            max,
            min,
            peak_bin: Some(peak_bin),
        }
    }
}

impl Default for SpectralFeatures {
    fn default() -> Self {
        Self::new()
    }
}
