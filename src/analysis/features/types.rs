// Types module - Data structures for PPG quality features
//
// This module defines the fixed-order feature vector consumed by the
// quality classifier. The order is part of the model contract: the model
// artifact expects exactly these 14 inputs in exactly this order.

use serde::{Deserialize, Serialize};

/// Number of features in a FeatureVector (model input width)
pub const FEATURE_COUNT: usize = 14;

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "mean",
    "std_dev",
    "skewness",
    "kurtosis",
    "range",
    "zero_crossings",
    "rms",
    "peak_to_peak",
    "median",
    "variance",
    "spectral_mean",
    "spectral_std",
    "spectral_max",
    "spectral_min",
];

/// Features extracted from a PPG sample window
///
/// Time-domain statistics followed by statistics of the half-spectrum
/// magnitudes. `Default` is the all-zero vector produced for an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Arithmetic mean of the samples
    pub mean: f64,

    /// Population standard deviation (divides by N)
    pub std_dev: f64,

    /// Third standardized moment (0 for a constant window)
    pub skewness: f64,

    /// Fourth standardized moment, non-excess (0 for a constant window)
    pub kurtosis: f64,

    /// max - min
    pub range: f64,

    /// Count of sign changes between consecutive samples (0 counts as non-negative)
    pub zero_crossings: f64,

    /// Root mean square amplitude
    pub rms: f64,

    /// max - min; always equal to `range`
    pub peak_to_peak: f64,

    /// Middle order statistic (mean of the two central values for even N)
    pub median: f64,

    /// Population variance
    pub variance: f64,

    /// Mean of the retained DFT magnitudes
    pub spectral_mean: f64,

    /// Population standard deviation of the retained DFT magnitudes
    pub spectral_std: f64,

    /// Largest retained DFT magnitude
    pub spectral_max: f64,

    /// Smallest retained DFT magnitude
    pub spectral_min: f64,
}

impl FeatureVector {
    /// Features as an array in model input order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.mean,
            self.std_dev,
            self.skewness,
            self.kurtosis,
            self.range,
            self.zero_crossings,
            self.rms,
            self.peak_to_peak,
            self.median,
            self.variance,
            self.spectral_mean,
            self.spectral_std,
            self.spectral_max,
            self.spectral_min,
        ]
    }

    /// Rebuild a vector from an array in model input order
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            mean: values[0],
            std_dev: values[1],
            skewness: values[2],
            kurtosis: values[3],
            range: values[4],
            zero_crossings: values[5],
            rms: values[6],
            peak_to_peak: values[7],
            median: values[8],
            variance: values[9],
            spectral_mean: values[10],
            spectral_std: values[11],
            spectral_max: values[12],
            spectral_min: values[13],
        }
    }

    /// (name, value) pairs in model input order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }

    /// True when every feature is a finite number
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|value| value.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_zero() {
        let features = FeatureVector::default();
        assert_eq!(features.to_array(), [0.0; FEATURE_COUNT]);
        assert!(features.is_finite());
    }

    #[test]
    fn test_array_order_matches_names() {
        let values: [f64; FEATURE_COUNT] = std::array::from_fn(|i| i as f64);
        let features = FeatureVector::from_array(values);

        assert_eq!(features.mean, 0.0);
        assert_eq!(features.zero_crossings, 5.0);
        assert_eq!(features.median, 8.0);
        assert_eq!(features.spectral_min, 13.0);

        for (i, (name, value)) in features.named().enumerate() {
            assert_eq!(name, FEATURE_NAMES[i]);
            assert_eq!(value, i as f64);
        }
    }

    #[test]
    fn test_non_finite_detection() {
        let mut features = FeatureVector::default();
        features.kurtosis = f64::NAN;
        assert!(!features.is_finite());
    }
}
