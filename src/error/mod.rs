// Error types for the PPG signal-quality core
//
// This module defines custom error types for model loading, inference,
// sample ingestion and the record-store boundary. Every error carries a
// stable numeric code so hosts can react to failures without parsing text.

mod inference;
mod ingest;
mod model;
mod record;

pub use inference::{log_inference_error, InferenceError, InferenceErrorCodes};
pub use ingest::{log_ingest_error, IngestError, IngestErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};
pub use record::{log_record_error, RecordError, RecordErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the CLI, HTTP and embedding surfaces.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let model_err: &dyn ErrorCode = &ModelError::NotLoaded;
        assert_eq!(model_err.code(), ModelErrorCodes::NOT_LOADED);

        let inference_err: &dyn ErrorCode = &InferenceError::ModelUnavailable;
        assert_eq!(inference_err.code(), InferenceErrorCodes::MODEL_UNAVAILABLE);

        let ingest_err: &dyn ErrorCode = &IngestError::NonFiniteSample;
        assert_eq!(ingest_err.code(), IngestErrorCodes::NON_FINITE_SAMPLE);

        let record_err: &dyn ErrorCode = &RecordError::StorePoisoned;
        assert_eq!(record_err.code(), RecordErrorCodes::STORE_POISONED);
    }

    #[test]
    fn test_code_ranges_do_not_overlap() {
        let codes = [
            ModelErrorCodes::NOT_LOADED,
            InferenceErrorCodes::MODEL_UNAVAILABLE,
            IngestErrorCodes::QUEUE_FULL,
            RecordErrorCodes::INVALID_RECORD,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a / 1000, b / 1000);
            }
        }
    }
}
