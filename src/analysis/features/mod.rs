// FeatureExtractor - statistical and spectral features for PPG quality
//
// This module turns a window of PPG samples into the fixed 14-feature vector
// the quality classifier consumes. Extraction is a pure function of the
// window contents: no state, no I/O, identical windows give identical vectors.
//
// Module organization:
// - types: FeatureVector and the model input order
// - fft: DFT half-spectrum magnitudes
// - spectral: mean/std/max/min over the magnitudes
// - temporal: moments, median, range, zero crossings, RMS
// - mod.rs: Coordinator (FeatureExtractor)

mod fft;
mod spectral;
mod temporal;
mod types;

pub use spectral::SpectralSummary;
pub use temporal::{Moments, DEGENERATE_STD};
pub use types::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

use fft::FftProcessor;
use spectral::SpectralFeatures;
use temporal::TemporalFeatures;

/// Feature vector plus spectral diagnostics
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FeatureReport {
    pub features: FeatureVector,
    /// Location of `spectral_max` within the retained half-spectrum
    pub spectral_peak_bin: Option<usize>,
    /// Number of retained DFT coefficients (⌊N/2⌋)
    pub retained_bins: usize,
}

/// FeatureExtractor coordinates the feature extraction pipeline
pub struct FeatureExtractor {
    fft_processor: FftProcessor,
    spectral_features: SpectralFeatures,
    temporal_features: TemporalFeatures,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            fft_processor: FftProcessor::new(),
            spectral_features: SpectralFeatures::new(),
            temporal_features: TemporalFeatures::new(),
        }
    }

    /// Extract the 14-feature vector from a window
    ///
    /// An empty window yields the all-zero vector.
    pub fn extract(&self, window: &[f64]) -> FeatureVector {
        self.extract_report(window).features
    }

    /// Extract features together with the spectral peak location
    pub fn extract_report(&self, window: &[f64]) -> FeatureReport {
        if window.is_empty() {
            return FeatureReport {
                features: FeatureVector::default(),
                spectral_peak_bin: None,
                retained_bins: 0,
            };
        }

        let moments = self.temporal_features.compute_moments(window);
        let range = self.temporal_features.compute_range(window);
        let zero_crossings = self.temporal_features.compute_zero_crossings(window);
        let rms = self.temporal_features.compute_rms(window);
        let median = self.temporal_features.compute_median(window);

        let magnitudes = self.fft_processor.half_spectrum_magnitudes(window);
        let spectral = self.spectral_features.summarize(&magnitudes);

        let features = FeatureVector {
            mean: moments.mean,
            std_dev: moments.std_dev,
            skewness: moments.skewness,
            kurtosis: moments.kurtosis,
            range,
            zero_crossings: zero_crossings as f64,
            rms,
            peak_to_peak: range,
            median,
            variance: moments.variance,
            spectral_mean: spectral.mean,
            spectral_std: spectral.std_dev,
            spectral_max: spectral.max,
            spectral_min: spectral.min,
        };

        FeatureReport {
            features,
            spectral_peak_bin: spectral.peak_bin,
            retained_bins: magnitudes.len(),
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
