// Sample ingestion error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Ingest error code constants
///
/// Error code range: 3001-3002
pub struct IngestErrorCodes {}

impl IngestErrorCodes {
    /// Sample queue is full; the producer outpaces the session
    pub const QUEUE_FULL: i32 = 3001;

    /// Sample is NaN or infinite and was rejected
    pub const NON_FINITE_SAMPLE: i32 = 3002;
}

/// Log an ingest error; these are recoverable so they are warnings
pub fn log_ingest_error(err: &IngestError, context: &str) {
    warn!(
        "Ingest error in {}: code={}, component=SampleQueue, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while moving samples into the session
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Queue has no free slot
    QueueFull { capacity: usize },

    /// Sample value is not finite
    NonFiniteSample,
}

impl ErrorCode for IngestError {
    fn code(&self) -> i32 {
        match self {
            IngestError::QueueFull { .. } => IngestErrorCodes::QUEUE_FULL,
            IngestError::NonFiniteSample => IngestErrorCodes::NON_FINITE_SAMPLE,
        }
    }

    fn message(&self) -> String {
        match self {
            IngestError::QueueFull { capacity } => {
                format!("Sample queue full (capacity {})", capacity)
            }
            IngestError::NonFiniteSample => "Sample is not a finite number".to_string(),
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IngestError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for IngestError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_codes() {
        assert_eq!(IngestError::QueueFull { capacity: 8 }.code(), 3001);
        assert_eq!(IngestError::NonFiniteSample.code(), 3002);
        assert!(IngestError::QueueFull { capacity: 8 }
            .message()
            .contains("capacity 8"));
    }
}
