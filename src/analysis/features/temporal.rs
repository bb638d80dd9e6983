// Temporal module - Time-domain statistics of a sample window
//
// Moments use population normalization (divide by N). Higher moments are
// computed over standardized deviations so large but finite amplitudes do not
// overflow. A constant window has no defined skewness or kurtosis; both are 0.

use std::cmp::Ordering;

/// Relative standard deviation at or below which a window counts as constant
///
/// Scaled by `max(|mean|, 1)`. Windows whose samples are all equal are
/// detected exactly regardless of this bound.
pub const DEGENERATE_STD: f64 = 1e-12;

/// Central moments of a window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// Time-domain feature computation functions
pub struct TemporalFeatures;

impl TemporalFeatures {
    pub fn new() -> Self {
        Self
    }

    /// Compute mean, population variance/std, skewness and kurtosis
    pub fn compute_moments(&self, samples: &[f64]) -> Moments {
        if samples.is_empty() {
            return Moments::default();
        }

        let count = samples.len() as f64;
        let mut mean = samples.iter().sum::<f64>() / count;
        if !mean.is_finite() {
            mean = samples.iter().map(|&x| x / count).sum();
        }

        let first = samples[0];
        if samples.iter().all(|&x| x == first) {
            return Moments {
                mean: first,
                ..Moments::default()
            };
        }

        // Scale deviations by the largest one so squaring cannot overflow
        let scale = samples
            .iter()
            .map(|&x| (x - mean).abs())
            .fold(0.0_f64, f64::max);
        if scale == 0.0 || !scale.is_finite() {
            return Moments {
                mean,
                ..Moments::default()
            };
        }

        let scaled_m2 = samples
            .iter()
            .map(|&x| {
                let d = (x - mean) / scale;
                d * d
            })
            .sum::<f64>()
            / count;
        let std_dev = scale * scaled_m2.sqrt();
        let variance = std_dev * std_dev;

        let (skewness, kurtosis) = if std_dev <= DEGENERATE_STD * mean.abs().max(1.0) {
            (0.0, 0.0)
        } else {
            let (mut m3, mut m4) = (0.0, 0.0);
            for &sample in samples {
                let z = (sample - mean) / std_dev;
                let z2 = z * z;
                m3 += z2 * z;
                m4 += z2 * z2;
            }
            (m3 / count, m4 / count)
        };

        Moments {
            mean,
            variance,
            std_dev,
            skewness,
            kurtosis,
        }
    }

    /// Median: middle order statistic, mean of the central pair for even N
    pub fn compute_median(&self, samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// max - min (0 for an empty window)
    pub fn compute_range(&self, samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &x| {
                (min.min(x), max.max(x))
            });
        max - min
    }

    /// Count zero crossings
    ///
    /// A crossing is counted between consecutive samples when one is negative
    /// and the other is non-negative; an exact 0 counts as non-negative.
    pub fn compute_zero_crossings(&self, samples: &[f64]) -> usize {
        samples
            .windows(2)
            .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
            .count()
    }

    /// Root mean square amplitude
    pub fn compute_rms(&self, samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }

        let squared_sum: f64 = samples.iter().map(|&x| x * x).sum();
        (squared_sum / samples.len() as f64).sqrt()
    }
}

impl Default for TemporalFeatures {
    fn default() -> Self {
        Self::new()
    }
}
