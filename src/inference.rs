// Inference orchestrator - FeatureVector → ClassProbabilities
//
// One call builds a 1 × 14 input row, runs the model's forward pass and
// converts the 1 × 3 output into ClassProbabilities. Every transient tensor is
// borrowed from a bounded TensorPool; the RAII guards hand the buffers back on
// success, on error and during panic unwinding, so `pool().outstanding()` is 0
// once a call has returned.

use std::time::Instant;

use crate::analysis::{ClassProbabilities, FeatureVector, CLASS_COUNT, FEATURE_COUNT};
use crate::error::{log_inference_error, InferenceError};
use crate::model::{ModelProvider, QualityModel};
use crate::telemetry;
use crate::tensor::{TensorPool, TensorShape};
use crate::trigger::DEFAULT_MIN_WINDOW;

pub struct InferenceOrchestrator {
    pool: TensorPool,
    min_window: usize,
}

impl InferenceOrchestrator {
    pub fn new(pool: TensorPool, min_window: usize) -> Self {
        Self { pool, min_window }
    }

    /// Run one inference against the provider's current model
    ///
    /// # Errors
    /// - `InsufficientData` when `window_len < min_window`
    /// - `ModelUnavailable` when the provider is not Ready
    /// - Any error from `run_with_model`
    pub fn run(
        &self,
        provider: &ModelProvider,
        window_len: usize,
        features: &FeatureVector,
    ) -> Result<ClassProbabilities, InferenceError> {
        if window_len < self.min_window {
            return Err(InferenceError::InsufficientData {
                required: self.min_window,
                available: window_len,
            });
        }

        let model = provider.model().map_err(|err| {
            log::debug!("[InferenceOrchestrator] Skipping inference: {}", err);
            InferenceError::ModelUnavailable
        })?;

        self.run_with_model(model.as_ref(), features)
    }

    /// Run one forward pass with an explicit model
    pub fn run_with_model(
        &self,
        model: &dyn QualityModel,
        features: &FeatureVector,
    ) -> Result<ClassProbabilities, InferenceError> {
        let started = Instant::now();
        let result = self.forward(model, features);

        match &result {
            Ok(_) => {
                let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
                telemetry::hub().record_inference_latency(elapsed_ms);
            }
            Err(err) if !err.is_skip() => log_inference_error(err, "run_with_model"),
            Err(_) => {}
        }
        telemetry::hub().record_tensor_occupancy(self.pool.outstanding(), self.pool.retained());

        result
    }

    fn forward(
        &self,
        model: &dyn QualityModel,
        features: &FeatureVector,
    ) -> Result<ClassProbabilities, InferenceError> {
        if model.input_len() != FEATURE_COUNT {
            return Err(InferenceError::ShapeMismatch {
                expected: FEATURE_COUNT,
                actual: model.input_len(),
            });
        }

        let row = features.to_array().map(|value| value as f32);
        if let Some(index) = row.iter().position(|value| !value.is_finite()) {
            return Err(InferenceError::NonFiniteFeatures { index });
        }

        let mut input = self.pool.acquire(TensorShape::row(FEATURE_COUNT));
        input.copy_from_slice(&row);

        let output = model.forward(&input, &self.pool)?;
        if output.len() != CLASS_COUNT {
            return Err(InferenceError::ShapeMismatch {
                expected: CLASS_COUNT,
                actual: output.len(),
            });
        }

        ClassProbabilities::from_model_output(&output)
    }

    pub fn pool(&self) -> &TensorPool {
        &self.pool
    }

    pub fn min_window(&self) -> usize {
        self.min_window
    }
}

impl Default for InferenceOrchestrator {
    fn default() -> Self {
        Self::new(TensorPool::default(), DEFAULT_MIN_WINDOW)
    }
}
