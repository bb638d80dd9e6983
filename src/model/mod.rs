// Model module - classifier artifact lifecycle
//
// The ModelProvider is an owned service constructed once per session and
// shared by `Arc`. It acquires the classifier artifact asynchronously and
// exposes a small state machine:
//
//   Unloaded → Loading → Ready
//                      ↘ Failed
//
// There is no automatic retry. A failed provider stays failed (inference is
// a no-op) until the integrator calls `reload()`.

pub mod network;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::analysis::{CLASS_COUNT, FEATURE_COUNT};
use crate::error::{log_model_error, ErrorCode, InferenceError, ModelError};
use crate::telemetry::{self, DiagnosticError, ModelPhase};
use crate::tensor::{PooledTensor, TensorPool};

pub use network::{Activation, DenseNetwork, LayerArtifact, NetworkArtifact, ARTIFACT_FORMAT};

/// Classifier forward computation
///
/// Implementations are immutable after construction and shared read-only
/// across inference calls. All scratch memory must come from `pool` so
/// that it is released when the returned guards drop.
pub trait QualityModel: Send + Sync {
    /// Expected input width
    fn input_len(&self) -> usize;

    /// Produced output width
    fn output_len(&self) -> usize;

    /// Run one forward pass over a 1 × input_len row
    fn forward(&self, input: &PooledTensor, pool: &TensorPool)
        -> Result<PooledTensor, InferenceError>;
}

/// Where the provider acquires its model from
#[derive(Clone)]
pub enum ModelSource {
    /// JSON artifact on disk
    File(PathBuf),
    /// JSON artifact held in memory
    Inline(String),
    /// Already-constructed model supplied by the embedder
    Provided(Arc<dyn QualityModel>),
}

impl ModelSource {
    pub fn describe(&self) -> String {
        match self {
            ModelSource::File(path) => path.display().to_string(),
            ModelSource::Inline(_) => "<inline artifact>".to_string(),
            ModelSource::Provided(_) => "<provided model>".to_string(),
        }
    }
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelSource({})", self.describe())
    }
}

/// Observable provider state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed { reason: String },
}

enum Slot {
    Unloaded,
    Loading,
    Ready(Arc<dyn QualityModel>),
    Failed(ModelError),
}

/// Owned service that loads the classifier once and hands out shared references
pub struct ModelProvider {
    source: ModelSource,
    slot: RwLock<Slot>,
    /// Serializes load/reload so concurrent callers share one acquisition
    load_lock: tokio::sync::Mutex<()>,
}

impl ModelProvider {
    /// Create an unloaded provider for the given source
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            slot: RwLock::new(Slot::Unloaded),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a provider that is immediately Ready with the given model
    pub fn ready(model: Arc<dyn QualityModel>) -> Self {
        Self {
            source: ModelSource::Provided(Arc::clone(&model)),
            slot: RwLock::new(Slot::Ready(model)),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        match self.slot.read() {
            Ok(slot) => match &*slot {
                Slot::Unloaded => ModelState::Unloaded,
                Slot::Loading => ModelState::Loading,
                Slot::Ready(_) => ModelState::Ready,
                Slot::Failed(err) => ModelState::Failed {
                    reason: err.message(),
                },
            },
            Err(_) => ModelState::Failed {
                reason: ModelError::StatePoisoned.message(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    /// Shared reference to the loaded model
    ///
    /// # Errors
    /// - `NotLoaded` while Unloaded or Loading
    /// - `LoadFailed` after a failed load
    /// - `StatePoisoned` if the state lock is poisoned
    pub fn model(&self) -> Result<Arc<dyn QualityModel>, ModelError> {
        let slot = self.slot.read().map_err(|_| ModelError::StatePoisoned)?;
        match &*slot {
            Slot::Ready(model) => Ok(Arc::clone(model)),
            Slot::Failed(err) => Err(ModelError::LoadFailed {
                reason: err.message(),
            }),
            Slot::Unloaded | Slot::Loading => Err(ModelError::NotLoaded),
        }
    }

    /// Load the model once
    ///
    /// Returns immediately when already Ready. A provider in the Failed state
    /// reports the stored failure without retrying; use `reload()` to retry.
    pub async fn load(&self) -> Result<(), ModelError> {
        let _guard = self.load_lock.lock().await;

        {
            let slot = self.slot.read().map_err(|_| ModelError::StatePoisoned)?;
            match &*slot {
                Slot::Ready(_) => return Ok(()),
                Slot::Failed(err) => {
                    return Err(ModelError::LoadFailed {
                        reason: err.message(),
                    })
                }
                Slot::Unloaded | Slot::Loading => {}
            }
        }

        self.acquire().await
    }

    /// Discard any current model or failure and acquire the artifact again
    pub async fn reload(&self) -> Result<(), ModelError> {
        let _guard = self.load_lock.lock().await;
        self.acquire().await
    }

    /// Release the model; in-flight inference keeps its own `Arc` until it finishes
    pub fn unload(&self) -> Result<(), ModelError> {
        let mut slot = self.slot.write().map_err(|_| ModelError::StatePoisoned)?;
        *slot = Slot::Unloaded;
        telemetry::hub().record_model_phase(ModelPhase::Unloaded);
        log::info!("[ModelProvider] Model unloaded");
        Ok(())
    }

    async fn acquire(&self) -> Result<(), ModelError> {
        self.set_slot(Slot::Loading)?;
        telemetry::hub().record_model_phase(ModelPhase::LoadStarted);
        log::info!("[ModelProvider] Loading model from {}", self.source.describe());

        match self.read_source().await {
            Ok(model) => {
                self.set_slot(Slot::Ready(model))?;
                telemetry::hub().record_model_phase(ModelPhase::Ready);
                log::info!("[ModelProvider] Model ready");
                Ok(())
            }
            Err(err) => {
                log_model_error(&err, "load_model");
                telemetry::hub().record_model_phase(ModelPhase::Failed);
                telemetry::hub().record_error(DiagnosticError::ModelLoad, err.message());
                self.set_slot(Slot::Failed(err.clone()))?;
                Err(err)
            }
        }
    }

    async fn read_source(&self) -> Result<Arc<dyn QualityModel>, ModelError> {
        let model: Arc<dyn QualityModel> = match &self.source {
            ModelSource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|err| {
                    ModelError::ArtifactUnreadable {
                        location: path.display().to_string(),
                        reason: err.to_string(),
                    }
                })?;
                Arc::new(DenseNetwork::from_json(&text)?.expect_shape(FEATURE_COUNT, CLASS_COUNT)?)
            }
            ModelSource::Inline(text) => {
                Arc::new(DenseNetwork::from_json(text)?.expect_shape(FEATURE_COUNT, CLASS_COUNT)?)
            }
            ModelSource::Provided(model) => Arc::clone(model),
        };

        if model.input_len() != FEATURE_COUNT || model.output_len() != CLASS_COUNT {
            return Err(ModelError::ShapeMismatch {
                reason: format!(
                    "model maps {} → {}, expected {} → {}",
                    model.input_len(),
                    model.output_len(),
                    FEATURE_COUNT,
                    CLASS_COUNT
                ),
            });
        }
        Ok(model)
    }

    fn set_slot(&self, next: Slot) -> Result<(), ModelError> {
        let mut slot = self.slot.write().map_err(|_| ModelError::StatePoisoned)?;
        *slot = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 14 → 3 artifact whose softmax output favours `excellent`
    fn valid_artifact_json() -> String {
        let artifact = NetworkArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            input_size: FEATURE_COUNT,
            layers: vec![LayerArtifact {
                weights: vec![vec![0.0; FEATURE_COUNT]; CLASS_COUNT],
                bias: vec![0.0, 0.0, 2.0],
                activation: Activation::Softmax,
            }],
        };
        serde_json::to_string(&artifact).unwrap()
    }

    #[tokio::test]
    async fn test_inline_load_reaches_ready() {
        let provider = ModelProvider::new(ModelSource::Inline(valid_artifact_json()));
        assert_eq!(provider.state(), ModelState::Unloaded);
        assert!(matches!(provider.model(), Err(ModelError::NotLoaded)));

        provider.load().await.unwrap();
        assert_eq!(provider.state(), ModelState::Ready);
        assert!(provider.is_ready());

        let model = provider.model().unwrap();
        assert_eq!(model.input_len(), FEATURE_COUNT);
        assert_eq!(model.output_len(), CLASS_COUNT);
    }

    #[tokio::test]
    async fn test_load_is_idempotent_and_shares_model() {
        let provider = ModelProvider::new(ModelSource::Inline(valid_artifact_json()));
        provider.load().await.unwrap();
        let first = provider.model().unwrap();

        provider.load().await.unwrap();
        let second = provider.model().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_retry() {
        let provider = ModelProvider::new(ModelSource::File(PathBuf::from(
            "/nonexistent/quality_model.json",
        )));

        let err = provider.load().await.unwrap_err();
        assert!(matches!(err, ModelError::ArtifactUnreadable { .. }));
        assert!(matches!(provider.state(), ModelState::Failed { .. }));
        assert!(matches!(provider.model(), Err(ModelError::LoadFailed { .. })));

        // Second load reports the stored failure instead of retrying
        let err = provider.load().await.unwrap_err();
        assert!(matches!(err, ModelError::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn test_reload_recovers_after_fixing_artifact() {
        let dir = std::env::temp_dir().join(format!("ppg_quality_model_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.json");
        std::fs::write(&path, "{ broken").unwrap();

        let provider = ModelProvider::new(ModelSource::File(path.clone()));
        assert!(matches!(
            provider.load().await,
            Err(ModelError::ArtifactMalformed { .. })
        ));

        std::fs::write(&path, valid_artifact_json()).unwrap();
        provider.reload().await.unwrap();
        assert!(provider.is_ready());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_wrong_shape_artifact_fails() {
        let artifact = NetworkArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            input_size: 4,
            layers: vec![LayerArtifact {
                weights: vec![vec![0.0; 4]; 2],
                bias: vec![0.0; 2],
                activation: Activation::Softmax,
            }],
        };
        let provider =
            ModelProvider::new(ModelSource::Inline(serde_json::to_string(&artifact).unwrap()));

        assert!(matches!(
            provider.load().await,
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unload_then_reload() {
        let provider = ModelProvider::new(ModelSource::Inline(valid_artifact_json()));
        provider.load().await.unwrap();
        provider.unload().unwrap();
        assert_eq!(provider.state(), ModelState::Unloaded);
        assert!(provider.model().is_err());

        provider.reload().await.unwrap();
        assert!(provider.is_ready());
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_model() {
        let provider = Arc::new(ModelProvider::new(ModelSource::Inline(
            valid_artifact_json(),
        )));
        let a = tokio::spawn({
            let provider = Arc::clone(&provider);
            async move { provider.load().await }
        });
        let b = tokio::spawn({
            let provider = Arc::clone(&provider);
            async move { provider.load().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert!(provider.is_ready());
    }

    #[test]
    fn test_model_state_serializes() {
        let json = serde_json::to_value(ModelState::Failed {
            reason: "missing".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "missing");
    }
}
