// Trigger controller - owns the sample window and decides when to evaluate
//
// State machine:
//
//   Idle ──push──▶ Buffering ──len ≥ min_window──▶ Ready ──fire──▶ Inferring
//     ▲                                                               │
//     └──────────────────────── complete (no rerun) ◀────────────────┘
//
// Single-flight: while a cycle is Inferring, further due triggers set one
// pending flag instead of starting another cycle. `complete()` turns that flag
// into a rerun over the latest window (latest window wins).
//
// Cancellation: `stop()` bumps the generation counter. A cycle carrying an
// older generation must discard its result. The cancelled cycle still counts
// as in flight until it completes, so a resumed window never overlaps it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const DEFAULT_MIN_WINDOW: usize = 100;
pub const DEFAULT_MAX_WINDOW: usize = 300;

/// Re-evaluation cadence once the window is long enough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Re-evaluate on every new sample
    EverySample,
    /// Re-evaluate after `samples` new samples
    EveryNSamples { samples: usize },
    /// Re-evaluate at most once per `millis`
    Interval { millis: u64 },
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::EverySample
    }
}

impl TriggerPolicy {
    fn is_due(&self, new_samples: usize, last_fire: Option<Instant>, now: Instant) -> bool {
        if new_samples == 0 {
            return false;
        }
        match *self {
            TriggerPolicy::EverySample => true,
            TriggerPolicy::EveryNSamples { samples } => new_samples >= samples.max(1),
            TriggerPolicy::Interval { millis } => match last_fire {
                Some(at) => now.saturating_duration_since(at) >= Duration::from_millis(millis),
                None => true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    Idle,
    Buffering,
    Ready,
    Inferring,
}

/// Immutable copy of the window handed to feature extraction
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub samples: Arc<[f64]>,
    /// Total samples accepted when the snapshot was taken
    pub sequence: u64,
    pub generation: u64,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Stopped,
    Buffering,
    NotDue,
}

#[derive(Debug, Clone)]
pub enum TriggerDecision {
    /// Start a cycle over this snapshot
    Fire(WindowSnapshot),
    /// A cycle is in flight; a rerun is now pending
    Coalesced,
    Skip(SkipReason),
}

pub struct TriggerController {
    window: VecDeque<f64>,
    min_window: usize,
    max_window: usize,
    policy: TriggerPolicy,
    generation: u64,
    sequence: u64,
    since_fire: usize,
    last_fire: Option<Instant>,
    /// Generation of the running cycle, if any
    in_flight: Option<u64>,
    pending: bool,
    stopped: bool,
}

impl TriggerController {
    /// `max_window` is raised to `min_window` when smaller
    pub fn new(min_window: usize, max_window: usize, policy: TriggerPolicy) -> Self {
        let max_window = max_window.max(min_window).max(1);
        Self {
            window: VecDeque::with_capacity(max_window),
            min_window,
            max_window,
            policy,
            generation: 0,
            sequence: 0,
            since_fire: 0,
            last_fire: None,
            in_flight: None,
            pending: false,
            stopped: false,
        }
    }

    pub fn push(&mut self, sample: f64) -> Result<TriggerDecision, IngestError> {
        self.push_at(sample, Instant::now())
    }

    /// Append one sample and decide whether a cycle should run
    ///
    /// # Errors
    /// - `NonFiniteSample` for NaN or infinite input (not appended)
    pub fn push_at(&mut self, sample: f64, now: Instant) -> Result<TriggerDecision, IngestError> {
        if !sample.is_finite() {
            return Err(IngestError::NonFiniteSample);
        }
        if self.stopped {
            return Ok(TriggerDecision::Skip(SkipReason::Stopped));
        }

        if self.window.len() == self.max_window {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.sequence += 1;
        self.since_fire += 1;

        if self.window.len() < self.min_window {
            return Ok(TriggerDecision::Skip(SkipReason::Buffering));
        }

        // Never more than one window length stale, whatever the cadence
        let due = self.policy.is_due(self.since_fire, self.last_fire, now)
            || self.since_fire >= self.max_window;
        if !due {
            return Ok(TriggerDecision::Skip(SkipReason::NotDue));
        }

        if self.in_flight.is_some() {
            self.pending = true;
            return Ok(TriggerDecision::Coalesced);
        }

        self.in_flight = Some(self.generation);
        Ok(TriggerDecision::Fire(self.take_snapshot(now)))
    }

    /// Finish the cycle started for `generation`
    ///
    /// Returns the rerun snapshot when triggers were coalesced meanwhile. The
    /// rerun always carries the current generation, so a cancelled cycle hands
    /// over to the window collected after `resume()`.
    pub fn complete(&mut self, generation: u64) -> Option<WindowSnapshot> {
        if self.in_flight != Some(generation) {
            return None;
        }
        if self.pending && !self.stopped && self.since_fire > 0 {
            self.pending = false;
            self.in_flight = Some(self.generation);
            return Some(self.take_snapshot(Instant::now()));
        }
        self.pending = false;
        self.in_flight = None;
        None
    }

    pub fn is_current(&self, generation: u64) -> bool {
        !self.stopped && generation == self.generation
    }

    /// Suppress triggers and invalidate any in-flight cycle
    ///
    /// The invalidated cycle keeps the single-flight slot until it calls
    /// `complete()`.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.generation += 1;
        self.pending = false;
    }

    /// Re-enable triggers with a fresh window
    pub fn resume(&mut self) {
        self.stopped = false;
        self.window.clear();
        self.since_fire = 0;
        self.last_fire = None;
    }

    pub fn state(&self) -> TriggerState {
        if self.stopped {
            TriggerState::Idle
        } else if self.in_flight.is_some() {
            TriggerState::Inferring
        } else if self.window.is_empty() {
            TriggerState::Idle
        } else if self.window.len() < self.min_window {
            TriggerState::Buffering
        } else {
            TriggerState::Ready
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while a cycle (current or cancelled) has not completed
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    fn take_snapshot(&mut self, now: Instant) -> WindowSnapshot {
        self.since_fire = 0;
        self.last_fire = Some(now);
        WindowSnapshot {
            samples: self.window.iter().copied().collect(),
            sequence: self.sequence,
            generation: self.generation,
        }
    }
}

impl Default for TriggerController {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WINDOW, DEFAULT_MAX_WINDOW, TriggerPolicy::default())
    }
}
