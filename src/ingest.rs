// Sample ingestion - lock-free SPSC queue between a capture thread and a session
//
// The capture side (frame processing, waveform extraction) runs on its own
// thread and must never block on the session. It pushes raw samples into an
// rtrb ring buffer; the session drains the consumer side from a tokio task
// (`QualitySession::spawn_ingest`).
//
// Flow:
// 1. Capture thread calls `SampleProducer::push(sample)`
// 2. Queue full → `IngestError::QueueFull`, the sample is dropped
// 3. Session task calls `SampleConsumer::drain` and feeds the trigger controller

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::IngestError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Producer half, owned by the capture thread
pub struct SampleProducer {
    inner: Producer<f64>,
    capacity: usize,
}

/// Consumer half, owned by the session's ingest task
pub struct SampleConsumer {
    inner: Consumer<f64>,
    capacity: usize,
}

/// Create a bounded sample queue
///
/// A capacity of 0 is raised to 1.
pub fn sample_queue(capacity: usize) -> (SampleProducer, SampleConsumer) {
    let capacity = capacity.max(1);
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        SampleProducer {
            inner: producer,
            capacity,
        },
        SampleConsumer {
            inner: consumer,
            capacity,
        },
    )
}

impl SampleProducer {
    /// Enqueue one sample without blocking
    ///
    /// # Errors
    /// - `NonFiniteSample` for NaN or infinite values
    /// - `QueueFull` when the consumer has fallen behind
    pub fn push(&mut self, sample: f64) -> Result<(), IngestError> {
        if !sample.is_finite() {
            return Err(IngestError::NonFiniteSample);
        }
        self.inner.push(sample).map_err(|_| IngestError::QueueFull {
            capacity: self.capacity,
        })
    }

    /// Enqueue as many samples as fit; returns the count accepted
    ///
    /// Non-finite values are skipped and do not count.
    pub fn push_slice(&mut self, samples: &[f64]) -> usize {
        let mut accepted = 0;
        for &sample in samples {
            match self.push(sample) {
                Ok(()) => accepted += 1,
                Err(IngestError::QueueFull { .. }) => break,
                Err(IngestError::NonFiniteSample) => {}
            }
        }
        accepted
    }

    pub fn free_slots(&self) -> usize {
        self.inner.slots()
    }

    /// True once the consumer half has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

impl SampleConsumer {
    /// Pop up to `max` queued samples into `out`; returns the count moved
    pub fn drain(&mut self, out: &mut Vec<f64>, max: usize) -> usize {
        let mut moved = 0;
        while moved < max {
            match self.inner.pop() {
                Ok(sample) => {
                    out.push(sample);
                    moved += 1;
                }
                Err(_) => break,
            }
        }
        moved
    }

    pub fn pending(&self) -> usize {
        self.inner.slots()
    }

    /// Queue fill level as a percentage
    pub fn occupancy_percent(&self) -> f32 {
        self.pending() as f32 / self.capacity as f32 * 100.0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the producer half has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}
