// Analysis module - feature extraction and quality decision
//
// The pure half of the quality pipeline:
// - features: window → FeatureVector (time-domain + spectral statistics)
// - decision: ClassProbabilities → QualityResult
//
// Everything here is synchronous and side-effect free; scheduling, model
// lifecycle and publication live in `trigger`, `model`, `inference` and `engine`.

pub mod decision;
pub mod features;

pub use decision::{
    decide, ClassProbabilities, QualityClass, QualityResult, QualitySnapshot, CLASS_COUNT,
    PLACEHOLDER_LABEL,
};
pub use features::{FeatureExtractor, FeatureReport, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
