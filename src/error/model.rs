// Model provider error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 1001-1006
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Artifact could not be read from its source
    pub const ARTIFACT_UNREADABLE: i32 = 1001;

    /// Artifact was read but could not be parsed
    pub const ARTIFACT_MALFORMED: i32 = 1002;

    /// Artifact topology does not match the expected input/output shapes
    pub const SHAPE_MISMATCH: i32 = 1003;

    /// Model has not been loaded (or was unloaded)
    pub const NOT_LOADED: i32 = 1004;

    /// A previous load attempt failed and no reload was requested
    pub const LOAD_FAILED: i32 = 1005;

    /// Provider state lock was poisoned
    pub const STATE_POISONED: i32 = 1006;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=ModelProvider, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Model acquisition errors
///
/// These errors cover reading, parsing and validating the classifier artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Artifact source could not be read
    ArtifactUnreadable { location: String, reason: String },

    /// Artifact is not valid JSON or uses an unknown format
    ArtifactMalformed { reason: String },

    /// Layer dimensions are inconsistent or do not match 14 → 3
    ShapeMismatch { reason: String },

    /// No model available yet
    NotLoaded,

    /// Last load failed; the original failure is kept for diagnostics
    LoadFailed { reason: String },

    /// Provider state lock was poisoned
    StatePoisoned,
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::ArtifactUnreadable { .. } => ModelErrorCodes::ARTIFACT_UNREADABLE,
            ModelError::ArtifactMalformed { .. } => ModelErrorCodes::ARTIFACT_MALFORMED,
            ModelError::ShapeMismatch { .. } => ModelErrorCodes::SHAPE_MISMATCH,
            ModelError::NotLoaded => ModelErrorCodes::NOT_LOADED,
            ModelError::LoadFailed { .. } => ModelErrorCodes::LOAD_FAILED,
            ModelError::StatePoisoned => ModelErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::ArtifactUnreadable { location, reason } => {
                format!("Failed to read model artifact {}: {}", location, reason)
            }
            ModelError::ArtifactMalformed { reason } => {
                format!("Malformed model artifact: {}", reason)
            }
            ModelError::ShapeMismatch { reason } => {
                format!("Model shape mismatch: {}", reason)
            }
            ModelError::NotLoaded => "Model not loaded. Call load() first.".to_string(),
            ModelError::LoadFailed { reason } => {
                format!("Model load failed: {}. Call reload() to retry.", reason)
            }
            ModelError::StatePoisoned => "Model provider state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::ArtifactMalformed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_codes() {
        assert_eq!(
            ModelError::ArtifactUnreadable {
                location: "a".to_string(),
                reason: "b".to_string()
            }
            .code(),
            ModelErrorCodes::ARTIFACT_UNREADABLE
        );
        assert_eq!(
            ModelError::ShapeMismatch {
                reason: "x".to_string()
            }
            .code(),
            1003
        );
        assert_eq!(ModelError::NotLoaded.code(), ModelErrorCodes::NOT_LOADED);
        assert_eq!(ModelError::StatePoisoned.code(), 1006);
    }

    #[test]
    fn test_load_failed_message_mentions_reload() {
        let err = ModelError::LoadFailed {
            reason: "file missing".to_string(),
        };
        assert!(err.message().contains("file missing"));
        assert!(err.message().contains("reload()"));
        assert!(err.to_string().contains("code 1005"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ModelError = parse_err.into();
        assert!(matches!(err, ModelError::ArtifactMalformed { .. }));
    }
}
