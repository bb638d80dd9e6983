// Record store boundary - per-subject heart-rate/HRV history
//
// The quality core does not compute heart rate or HRV; downstream stages do,
// and persist one HealthRecord per measurement. This module defines the
// record shape, the storage trait hosts implement, and an in-memory store
// used by the CLI, the debug server and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::telemetry::now_timestamp_ms;

/// Value plus the estimator's confidence in it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRate {
    pub bpm: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hrv {
    /// Standard deviation of NN intervals, milliseconds
    pub sdnn: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub subject_id: String,
    pub heart_rate: HeartRate,
    pub hrv: Hrv,
    /// Milliseconds since the Unix epoch; defaults to the insert time
    #[serde(default = "now_timestamp_ms")]
    pub timestamp_ms: u64,
}

impl HealthRecord {
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.subject_id.trim().is_empty() {
            return Err(RecordError::InvalidRecord {
                reason: "subjectId is empty".to_string(),
            });
        }
        let values = [
            ("heartRate.bpm", self.heart_rate.bpm),
            ("heartRate.confidence", self.heart_rate.confidence),
            ("hrv.sdnn", self.hrv.sdnn),
            ("hrv.confidence", self.hrv.confidence),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(RecordError::InvalidRecord {
                    reason: format!("{} must be a non-negative number, got {}", name, value),
                });
            }
        }
        Ok(())
    }
}

/// Aggregate view over all records of one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_id: String,
    /// Mean bpm rounded to the nearest integer
    pub avg_heart_rate: i64,
    /// Mean SDNN rounded to the nearest integer
    pub avg_hrv: i64,
    /// Timestamp of the most recent record
    pub last_access_ms: u64,
    pub record_count: usize,
}

/// Storage backend for health records
pub trait RecordStore: Send + Sync {
    /// Validate and persist one record
    fn insert(&self, record: HealthRecord) -> Result<HealthRecord, RecordError>;

    /// Summarize every record stored for `subject_id`
    ///
    /// # Errors
    /// - `NotFound` when the subject has no records
    fn summary(&self, subject_id: &str) -> Result<SubjectSummary, RecordError>;

    /// Records for a subject, most recent first
    fn records(&self, subject_id: &str) -> Result<Vec<HealthRecord>, RecordError>;
}

/// Half-up rounding to the nearest integer
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Summarize a non-empty slice of records for one subject
pub fn summarize(subject_id: &str, records: &[HealthRecord]) -> Result<SubjectSummary, RecordError> {
    if records.is_empty() {
        return Err(RecordError::NotFound {
            subject_id: subject_id.to_string(),
        });
    }

    let count = records.len() as f64;
    let avg_heart_rate = records.iter().map(|r| r.heart_rate.bpm).sum::<f64>() / count;
    let avg_hrv = records.iter().map(|r| r.hrv.sdnn).sum::<f64>() / count;
    let last_access_ms = records.iter().map(|r| r.timestamp_ms).max().unwrap_or(0);

    Ok(SubjectSummary {
        subject_id: subject_id.to_string(),
        avg_heart_rate: round_half_up(avg_heart_rate),
        avg_hrv: round_half_up(avg_hrv),
        last_access_ms,
        record_count: records.len(),
    })
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    subjects: RwLock<HashMap<String, Vec<HealthRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.read().map(|map| map.len()).unwrap_or(0)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: HealthRecord) -> Result<HealthRecord, RecordError> {
        record.validate()?;
        let mut subjects = self
            .subjects
            .write()
            .map_err(|_| RecordError::StorePoisoned)?;
        subjects
            .entry(record.subject_id.clone())
            .or_default()
            .push(record.clone());
        log::debug!("[RecordStore] Stored record for subject {}", record.subject_id);
        Ok(record)
    }

    fn summary(&self, subject_id: &str) -> Result<SubjectSummary, RecordError> {
        let subjects = self
            .subjects
            .read()
            .map_err(|_| RecordError::StorePoisoned)?;
        let records = subjects.get(subject_id).map(Vec::as_slice).unwrap_or(&[]);
        summarize(subject_id, records)
    }

    fn records(&self, subject_id: &str) -> Result<Vec<HealthRecord>, RecordError> {
        let subjects = self
            .subjects
            .read()
            .map_err(|_| RecordError::StorePoisoned)?;
        let mut records = subjects.get(subject_id).cloned().unwrap_or_default();
        records.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, bpm: f64, sdnn: f64, timestamp_ms: u64) -> HealthRecord {
        HealthRecord {
            subject_id: subject.to_string(),
            heart_rate: HeartRate {
                bpm,
                confidence: 0.9,
            },
            hrv: Hrv {
                sdnn,
                confidence: 0.8,
            },
            timestamp_ms,
        }
    }

    #[test]
    fn test_summary_averages_are_rounded() {
        let store = InMemoryRecordStore::new();
        store.insert(record("s1", 70.0, 40.0, 1_000)).unwrap();
        store.insert(record("s1", 73.0, 45.0, 3_000)).unwrap();
        store.insert(record("s1", 72.0, 44.0, 2_000)).unwrap();

        let summary = store.summary("s1").unwrap();
        // 215 / 3 = 71.67, 129 / 3 = 43
        assert_eq!(summary.avg_heart_rate, 72);
        assert_eq!(summary.avg_hrv, 43);
        assert_eq!(summary.last_access_ms, 3_000);
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn test_half_values_round_up() {
        let store = InMemoryRecordStore::new();
        store.insert(record("s1", 70.0, 40.0, 1)).unwrap();
        store.insert(record("s1", 71.0, 41.0, 2)).unwrap();

        let summary = store.summary("s1").unwrap();
        assert_eq!(summary.avg_heart_rate, 71);
        assert_eq!(summary.avg_hrv, 41);
    }

    #[test]
    fn test_unknown_subject_not_found() {
        let store = InMemoryRecordStore::new();
        store.insert(record("s1", 70.0, 40.0, 1)).unwrap();

        assert_eq!(
            store.summary("s2").unwrap_err(),
            RecordError::NotFound {
                subject_id: "s2".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_records_rejected() {
        let store = InMemoryRecordStore::new();
        assert!(matches!(
            store.insert(record("  ", 70.0, 40.0, 1)),
            Err(RecordError::InvalidRecord { .. })
        ));
        assert!(matches!(
            store.insert(record("s1", f64::NAN, 40.0, 1)),
            Err(RecordError::InvalidRecord { .. })
        ));
        assert_eq!(store.subject_count(), 0);
    }

    #[test]
    fn test_records_most_recent_first() {
        let store = InMemoryRecordStore::new();
        store.insert(record("s1", 60.0, 30.0, 5)).unwrap();
        store.insert(record("s1", 61.0, 31.0, 9)).unwrap();
        store.insert(record("s1", 62.0, 32.0, 7)).unwrap();

        let stamps: Vec<u64> = store
            .records("s1")
            .unwrap()
            .iter()
            .map(|r| r.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![9, 7, 5]);
    }

    #[test]
    fn test_record_json_shape() {
        let parsed: HealthRecord = serde_json::from_str(
            r#"{"subjectId":"abc","heartRate":{"bpm":72,"confidence":0.9},"hrv":{"sdnn":41.5,"confidence":0.7}}"#,
        )
        .unwrap();
        assert_eq!(parsed.subject_id, "abc");
        assert!(parsed.timestamp_ms > 0);

        let json = serde_json::to_value(summarize("abc", &[parsed]).unwrap()).unwrap();
        assert_eq!(json["avgHeartRate"], 72);
        assert_eq!(json["avgHrv"], 42);
    }
}
