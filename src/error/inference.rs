// Inference error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Inference error code constants
///
/// Error code range: 2001-2007
pub struct InferenceErrorCodes {}

impl InferenceErrorCodes {
    /// Model is not ready (not loaded, loading, or failed)
    pub const MODEL_UNAVAILABLE: i32 = 2001;

    /// Window is shorter than the minimum window length
    pub const INSUFFICIENT_DATA: i32 = 2002;

    /// Model input or output shape does not match the feature/class layout
    pub const SHAPE_MISMATCH: i32 = 2003;

    /// Forward pass produced NaN/infinite or negative probabilities
    pub const NON_FINITE_OUTPUT: i32 = 2004;

    /// Forward pass raised an error
    pub const FORWARD_FAILED: i32 = 2005;

    /// Inference task panicked or was cancelled by the runtime
    pub const TASK_ABORTED: i32 = 2006;

    /// Feature vector holds a value that is not finite as an f32 model input
    pub const NON_FINITE_FEATURES: i32 = 2007;
}

/// Log an inference error with structured context
pub fn log_inference_error(err: &InferenceError, context: &str) {
    error!(
        "Inference error in {}: code={}, component=InferenceOrchestrator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while running one classification pass
///
/// None of these are fatal: the session keeps the last published result.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// Model provider is not in the Ready state
    ModelUnavailable,

    /// Window below the minimum length
    InsufficientData { required: usize, available: usize },

    /// Tensor shape does not match what the model declares
    ShapeMismatch { expected: usize, actual: usize },

    /// Output contains values that are not valid probabilities
    NonFiniteOutput { index: usize },

    /// Model forward computation failed
    ForwardFailed { reason: String },

    /// Blocking task running the cycle did not complete
    TaskAborted { reason: String },

    /// Feature value at `index` cannot be fed to the model
    NonFiniteFeatures { index: usize },
}

impl InferenceError {
    /// Skipped cycles are expected during normal operation and logged at debug level
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            InferenceError::ModelUnavailable | InferenceError::InsufficientData { .. }
        )
    }
}

impl ErrorCode for InferenceError {
    fn code(&self) -> i32 {
        match self {
            InferenceError::ModelUnavailable => InferenceErrorCodes::MODEL_UNAVAILABLE,
            InferenceError::InsufficientData { .. } => InferenceErrorCodes::INSUFFICIENT_DATA,
            InferenceError::ShapeMismatch { .. } => InferenceErrorCodes::SHAPE_MISMATCH,
            InferenceError::NonFiniteOutput { .. } => InferenceErrorCodes::NON_FINITE_OUTPUT,
            InferenceError::ForwardFailed { .. } => InferenceErrorCodes::FORWARD_FAILED,
            InferenceError::TaskAborted { .. } => InferenceErrorCodes::TASK_ABORTED,
            InferenceError::NonFiniteFeatures { .. } => InferenceErrorCodes::NON_FINITE_FEATURES,
        }
    }

    fn message(&self) -> String {
        match self {
            InferenceError::ModelUnavailable => "Model not ready; inference skipped".to_string(),
            InferenceError::InsufficientData {
                required,
                available,
            } => {
                format!(
                    "Insufficient samples: need {}, got {}",
                    required, available
                )
            }
            InferenceError::ShapeMismatch { expected, actual } => {
                format!("Tensor shape mismatch: expected {}, got {}", expected, actual)
            }
            InferenceError::NonFiniteOutput { index } => {
                format!("Model produced an invalid probability at index {}", index)
            }
            InferenceError::ForwardFailed { reason } => {
                format!("Forward pass failed: {}", reason)
            }
            InferenceError::TaskAborted { reason } => {
                format!("Inference task aborted: {}", reason)
            }
            InferenceError::NonFiniteFeatures { index } => {
                format!("Feature at index {} is not a finite model input", index)
            }
        }
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InferenceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for InferenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_codes() {
        assert_eq!(InferenceError::ModelUnavailable.code(), 2001);
        assert_eq!(
            InferenceError::InsufficientData {
                required: 100,
                available: 20
            }
            .code(),
            InferenceErrorCodes::INSUFFICIENT_DATA
        );
        assert_eq!(
            InferenceError::NonFiniteOutput { index: 1 }.code(),
            InferenceErrorCodes::NON_FINITE_OUTPUT
        );
        assert_eq!(
            InferenceError::TaskAborted {
                reason: "panic".to_string()
            }
            .code(),
            2006
        );
        assert_eq!(InferenceError::NonFiniteFeatures { index: 3 }.code(), 2007);
    }

    #[test]
    fn test_skip_classification() {
        assert!(InferenceError::ModelUnavailable.is_skip());
        assert!(InferenceError::InsufficientData {
            required: 100,
            available: 0
        }
        .is_skip());
        assert!(!InferenceError::ForwardFailed {
            reason: "boom".to_string()
        }
        .is_skip());
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = InferenceError::InsufficientData {
            required: 100,
            available: 42,
        };
        assert!(err.message().contains("need 100"));
        assert!(err.message().contains("got 42"));
    }
}
