// Decision - map class probabilities onto a quality verdict
//
// The class set is fixed and ordered: bad, acceptable, excellent. The model
// emits one probability per class in that order; the verdict is the class
// with the highest probability, ties going to the lowest index.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InferenceError;

/// Number of quality classes (model output width)
pub const CLASS_COUNT: usize = 3;

/// Label shown before the first successful classification
pub const PLACEHOLDER_LABEL: &str = "--";

/// Signal quality classes in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityClass {
    /// Waveform unusable for heart-rate/HRV computation
    Bad,
    /// Usable with reduced confidence
    Acceptable,
    /// Clean waveform
    Excellent,
}

impl QualityClass {
    pub const ALL: [QualityClass; CLASS_COUNT] = [
        QualityClass::Bad,
        QualityClass::Acceptable,
        QualityClass::Excellent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityClass::Bad => "bad",
            QualityClass::Acceptable => "acceptable",
            QualityClass::Excellent => "excellent",
        }
    }

    /// Position in the model output vector
    pub fn index(&self) -> usize {
        match self {
            QualityClass::Bad => 0,
            QualityClass::Acceptable => 1,
            QualityClass::Excellent => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for QualityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One probability per QualityClass, in class order
///
/// Values are not renormalized; the model is expected to emit a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities([f64; CLASS_COUNT]);

impl ClassProbabilities {
    pub fn new(values: [f64; CLASS_COUNT]) -> Self {
        Self(values)
    }

    /// Validate raw model output
    ///
    /// # Errors
    /// - `ShapeMismatch` if the output does not have exactly 3 values
    /// - `NonFiniteOutput` if a value is NaN, infinite or negative
    pub fn from_model_output(output: &[f32]) -> Result<Self, InferenceError> {
        if output.len() != CLASS_COUNT {
            return Err(InferenceError::ShapeMismatch {
                expected: CLASS_COUNT,
                actual: output.len(),
            });
        }

        let mut values = [0.0; CLASS_COUNT];
        for (i, &value) in output.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(InferenceError::NonFiniteOutput { index: i });
            }
            values[i] = value as f64;
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> [f64; CLASS_COUNT] {
        self.0
    }

    pub fn get(&self, class: QualityClass) -> f64 {
        self.0[class.index()]
    }
}

/// Quality verdict for one evaluated window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    pub label: QualityClass,
    /// Probability of `label` as a percentage in [0, 100]
    pub confidence: f64,
}

/// Pick the most probable class
///
/// Ties resolve to the first class in `[bad, acceptable, excellent]` order.
/// NaN never wins; if every entry is NaN the result is `bad` with 0 confidence.
pub fn decide(probabilities: &ClassProbabilities) -> QualityResult {
    let values = probabilities.values();

    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &value) in values.iter().enumerate() {
        // Strict comparison keeps the lowest index among ties
        if value > best_value {
            best_value = value;
            best_index = i;
        }
    }

    let confidence = if best_value.is_finite() {
        (best_value * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    QualityResult {
        label: QualityClass::ALL[best_index],
        confidence,
    }
}

/// Latest published quality state as seen by consumers
///
/// Starts as `{label: "--", confidence: 0}` until the first classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub label: String,
    pub confidence: f64,
    /// Number of results published so far in this session
    pub evaluations: u64,
}

impl QualitySnapshot {
    pub fn from_result(result: &QualityResult, evaluations: u64) -> Self {
        Self {
            label: result.label.as_str().to_string(),
            confidence: result.confidence,
            evaluations,
        }
    }

    /// True until a classification has been published
    pub fn is_placeholder(&self) -> bool {
        self.evaluations == 0
    }
}

impl Default for QualitySnapshot {
    fn default() -> Self {
        Self {
            label: PLACEHOLDER_LABEL.to_string(),
            confidence: 0.0,
            evaluations: 0,
        }
    }
}
