//! QualitySession: per-recording quality assessment pipeline.
//!
//! Samples are pushed synchronously. When the trigger controller fires, one
//! cycle task is spawned on the session's runtime; it extracts features and
//! runs inference on the blocking pool, publishes the decision, then asks the
//! controller for a coalesced rerun. There is never more than one current
//! cycle in flight, so results are published in evaluation order.
//!
//! `stop()` invalidates the in-flight cycle: it is allowed to finish but its
//! result is dropped. Publication happens under the controller lock, so once
//! `stop()` returns nothing further is published until `resume()`. A window
//! collected after `resume()` waits for the cancelled cycle to finish and then
//! runs as its rerun.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::analysis::{
    decide, ClassProbabilities, FeatureExtractor, FeatureReport, QualitySnapshot,
};
use crate::config::AppConfig;
use crate::error::{log_ingest_error, ErrorCode, InferenceError, IngestError};
use crate::inference::InferenceOrchestrator;
use crate::ingest::SampleConsumer;
use crate::managers::BroadcastChannelManager;
use crate::model::{ModelProvider, ModelSource, ModelState};
use crate::telemetry::{self, DiagnosticError};
use crate::tensor::TensorPool;
use crate::trigger::{TriggerController, TriggerDecision, TriggerState, WindowSnapshot};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// Samples moved from the ingest queue per drain
const INGEST_BATCH: usize = 256;

/// Point-in-time view of a session for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub trigger_state: TriggerState,
    pub window_len: usize,
    pub stopped: bool,
    pub model: ModelState,
    pub latest: QualitySnapshot,
    pub outstanding_tensors: usize,
}

/// Cheaply cloneable handle to one quality assessment pipeline
#[derive(Clone)]
pub struct QualitySession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: AppConfig,
    provider: Arc<ModelProvider>,
    orchestrator: InferenceOrchestrator,
    extractor: FeatureExtractor,
    trigger: Mutex<TriggerController>,
    broadcasts: BroadcastChannelManager,
    latest_tx: watch::Sender<QualitySnapshot>,
    evaluations: AtomicU64,
    active_cycles: AtomicUsize,
    idle: Notify,
    runtime: Handle,
}

impl QualitySession {
    /// Create a session around an existing model provider
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime; cycles are spawned on it.
    pub fn new(config: AppConfig, provider: Arc<ModelProvider>) -> Self {
        Self::with_runtime(config, provider, Handle::current())
    }

    /// Create a session whose cycles run on the given runtime
    pub fn with_runtime(config: AppConfig, provider: Arc<ModelProvider>, runtime: Handle) -> Self {
        let config = config.validated();
        let trigger = TriggerController::new(
            config.window.min_window,
            config.window.max_window,
            config.trigger.policy,
        );
        let orchestrator = InferenceOrchestrator::new(
            TensorPool::new(config.inference.pool_capacity),
            config.window.min_window,
        );

        let broadcasts = BroadcastChannelManager::new();
        broadcasts.init_quality(config.broadcast.result_capacity);
        broadcasts.init_features(config.broadcast.result_capacity);

        let (latest_tx, _) = watch::channel(QualitySnapshot::default());

        log::info!(
            "[QualitySession] Created (window {}..={}, policy {:?}, model {})",
            config.window.min_window,
            config.window.max_window,
            config.trigger.policy,
            provider.source().describe()
        );

        Self {
            inner: Arc::new(SessionInner {
                config,
                provider,
                orchestrator,
                extractor: FeatureExtractor::new(),
                trigger: Mutex::new(trigger),
                broadcasts,
                latest_tx,
                evaluations: AtomicU64::new(0),
                active_cycles: AtomicUsize::new(0),
                idle: Notify::new(),
                runtime,
            }),
        }
    }

    /// Create a session that loads its model from `config.model.path`
    ///
    /// The model is not loaded yet; call `load_model()`.
    pub fn from_config(config: AppConfig) -> Self {
        let provider = Arc::new(ModelProvider::new(ModelSource::File(
            config.model.path.clone(),
        )));
        Self::new(config, provider)
    }

    /// Load the session's model (idempotent, no automatic retry)
    pub async fn load_model(&self) -> Result<(), crate::error::ModelError> {
        self.inner.provider.load().await
    }

    // ========================================================================
    // SAMPLE INGESTION
    // ========================================================================

    /// Append one sample; spawns a cycle when the trigger fires
    ///
    /// # Errors
    /// - `NonFiniteSample` for NaN or infinite input (ignored by the window)
    pub fn push_sample(&self, sample: f64) -> Result<TriggerDecision, IngestError> {
        let decision = self.inner.lock_trigger().push(sample)?;
        if let TriggerDecision::Fire(snapshot) = &decision {
            self.inner.spawn_cycle(snapshot.clone());
        }
        Ok(decision)
    }

    /// Append samples in order; non-finite values are logged and skipped
    ///
    /// Returns the number of samples accepted.
    pub fn push_samples<I>(&self, samples: I) -> usize
    where
        I: IntoIterator<Item = f64>,
    {
        let mut accepted = 0;
        for sample in samples {
            match self.push_sample(sample) {
                Ok(_) => accepted += 1,
                Err(err) => log_ingest_error(&err, "push_samples"),
            }
        }
        accepted
    }

    /// Drain a lock-free sample queue into this session until the producer goes away
    pub fn spawn_ingest(&self, mut consumer: SampleConsumer) -> JoinHandle<()> {
        let session = self.clone();
        let poll = Duration::from_millis(self.inner.config.ingest.poll_interval_ms);

        self.inner.runtime.spawn(
            async move {
                let mut batch = Vec::with_capacity(INGEST_BATCH);
                loop {
                    batch.clear();
                    let moved = consumer.drain(&mut batch, INGEST_BATCH);
                    if moved > 0 {
                        telemetry::hub()
                            .record_queue_occupancy("samples", consumer.occupancy_percent());
                        session.push_samples(batch.iter().copied());
                        continue;
                    }
                    if consumer.is_abandoned() {
                        break;
                    }
                    tokio::time::sleep(poll).await;
                }
                tracing::debug!("sample producer dropped; ingest task finished");
            }
            .instrument(tracing::debug_span!("quality_ingest")),
        )
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Suppress triggers and discard the result of any in-flight cycle
    pub fn stop(&self) {
        self.inner.lock_trigger().stop();
        log::info!("[QualitySession] Stopped");
    }

    /// Re-enable triggers with an empty window
    pub fn resume(&self) {
        self.inner.lock_trigger().resume();
        log::info!("[QualitySession] Resumed");
    }

    /// Wait until no cycle task is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.active_cycles.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    // ========================================================================
    // OBSERVATION
    // ========================================================================

    /// Latest published snapshot (`"--"` / 0 before the first result)
    pub fn latest(&self) -> QualitySnapshot {
        self.inner.latest_tx.borrow().clone()
    }

    /// Watch channel carrying the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<QualitySnapshot> {
        self.inner.latest_tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        let (trigger_state, window_len, stopped) = {
            let trigger = self.inner.lock_trigger();
            (trigger.state(), trigger.len(), trigger.is_stopped())
        };
        SessionStatus {
            trigger_state,
            window_len,
            stopped,
            model: self.inner.provider.state(),
            latest: self.latest(),
            outstanding_tensors: self.inner.orchestrator.pool().outstanding(),
        }
    }

    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> &Arc<ModelProvider> {
        &self.inner.provider
    }

    pub fn tensor_pool(&self) -> &TensorPool {
        self.inner.orchestrator.pool()
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }
}

impl SessionInner {
    fn lock_trigger(&self) -> MutexGuard<'_, TriggerController> {
        // Controller updates are single assignments, so a poisoned guard is still consistent
        self.trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spawn_cycle(self: &Arc<Self>, snapshot: WindowSnapshot) {
        self.active_cycles.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.run_cycles(snapshot).await;
        });
    }

    async fn run_cycles(self: Arc<Self>, mut snapshot: WindowSnapshot) {
        loop {
            let generation = snapshot.generation;
            Arc::clone(&self).evaluate(snapshot).await;

            let next = self.lock_trigger().complete(generation);
            match next {
                Some(rerun) => snapshot = rerun,
                None => break,
            }
        }

        self.active_cycles.fetch_sub(1, Ordering::SeqCst);
        self.idle.notify_waiters();
    }

    async fn evaluate(self: Arc<Self>, snapshot: WindowSnapshot) {
        let span = tracing::debug_span!(
            "quality_cycle",
            sequence = snapshot.sequence,
            generation = snapshot.generation,
            window = snapshot.len()
        );
        let generation = snapshot.generation;

        let worker = Arc::clone(&self);
        let samples = Arc::clone(&snapshot.samples);
        let outcome = tokio::task::spawn_blocking(move || {
            let report = worker.extractor.extract_report(&samples);
            let probabilities =
                worker
                    .orchestrator
                    .run(&worker.provider, samples.len(), &report.features);
            (report, probabilities)
        })
        .instrument(span.clone())
        .await;

        let _entered = span.enter();
        let (report, probabilities) = match outcome {
            Ok(pair) => pair,
            Err(join_err) => {
                let err = InferenceError::TaskAborted {
                    reason: join_err.to_string(),
                };
                tracing::error!(code = err.code(), "inference task aborted: {}", err.message());
                telemetry::hub().record_error(DiagnosticError::Inference, err.message());
                return;
            }
        };

        self.publish(generation, report, probabilities);
    }

    fn publish(
        &self,
        generation: u64,
        report: FeatureReport,
        probabilities: Result<ClassProbabilities, InferenceError>,
    ) {
        let probabilities = match probabilities {
            Ok(probabilities) => probabilities,
            Err(err) if err.is_skip() => {
                tracing::debug!("cycle skipped: {}", err.message());
                return;
            }
            Err(err) => {
                // Keep the previous result
                telemetry::hub().record_error(DiagnosticError::Inference, err.message());
                return;
            }
        };

        let result = decide(&probabilities);

        let trigger = self.lock_trigger();
        if !trigger.is_current(generation) {
            tracing::debug!("discarding result from cancelled cycle");
            return;
        }

        let evaluations = self.evaluations.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest_tx
            .send_replace(QualitySnapshot::from_result(&result, evaluations));
        self.broadcasts.publish_quality(result);
        self.broadcasts.publish_features(report);
        drop(trigger);

        telemetry::hub().record_quality(&result);
        tracing::debug!(label = %result.label, confidence = result.confidence, "quality published");
    }
}
