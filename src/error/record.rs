// Record store error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Record store error code constants
///
/// Error code range: 4001-4003
pub struct RecordErrorCodes {}

impl RecordErrorCodes {
    /// Record failed validation (empty subject id, non-finite values)
    pub const INVALID_RECORD: i32 = 4001;

    /// No records stored for the requested subject
    pub const NOT_FOUND: i32 = 4002;

    /// Store lock was poisoned
    pub const STORE_POISONED: i32 = 4003;
}

/// Log a record store error with structured context
pub fn log_record_error(err: &RecordError, context: &str) {
    error!(
        "Record error in {}: code={}, component=RecordStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by the record store boundary
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Record is not acceptable for storage
    InvalidRecord { reason: String },

    /// Subject has no stored records
    NotFound { subject_id: String },

    /// Store lock was poisoned
    StorePoisoned,
}

impl ErrorCode for RecordError {
    fn code(&self) -> i32 {
        match self {
            RecordError::InvalidRecord { .. } => RecordErrorCodes::INVALID_RECORD,
            RecordError::NotFound { .. } => RecordErrorCodes::NOT_FOUND,
            RecordError::StorePoisoned => RecordErrorCodes::STORE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            RecordError::InvalidRecord { reason } => format!("Invalid record: {}", reason),
            RecordError::NotFound { subject_id } => {
                format!("No records found for subject {}", subject_id)
            }
            RecordError::StorePoisoned => "Record store lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecordError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RecordError {}
