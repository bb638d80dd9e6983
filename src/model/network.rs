// DenseNetwork - feed-forward classifier loaded from a JSON artifact
//
// Artifact layout ("dense-v1"):
//
// {
//   "format": "dense-v1",
//   "input_size": 14,
//   "layers": [
//     { "weights": [[...input_size...], ...units...], "bias": [...units...], "activation": "relu" },
//     { "weights": [...], "bias": [...], "activation": "softmax" }
//   ]
// }
//
// Weights are row-major: `weights[out][in]`. The network is immutable after
// construction and safe to share across threads.

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, ModelError};
use crate::model::QualityModel;
use crate::tensor::{PooledTensor, TensorPool, TensorShape};

/// Format tag accepted by `DenseNetwork::from_artifact`
pub const ARTIFACT_FORMAT: &str = "dense-v1";

/// Per-layer activation function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn apply(&self, values: &mut [f32]) {
        match self {
            Activation::Linear => {}
            Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Sigmoid => values
                .iter_mut()
                .for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
            Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Softmax => {
                let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for v in values.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                if sum > 0.0 {
                    values.iter_mut().for_each(|v| *v /= sum);
                }
            }
        }
    }
}

/// Serialized form of one dense layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerArtifact {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

/// Serialized network topology and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkArtifact {
    pub format: String,
    pub input_size: usize,
    pub layers: Vec<LayerArtifact>,
}

struct DenseLayer {
    /// Row-major out_size × in_size
    weights: Vec<f32>,
    bias: Vec<f32>,
    in_size: usize,
    out_size: usize,
    activation: Activation,
}

impl DenseLayer {
    fn apply(&self, input: &[f32], output: &mut [f32]) {
        for (o, out) in output.iter_mut().enumerate() {
            let row = &self.weights[o * self.in_size..(o + 1) * self.in_size];
            let dot: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum();
            *out = dot + self.bias[o];
        }
        self.activation.apply(output);
    }
}

/// Validated dense feed-forward network
pub struct DenseNetwork {
    input_size: usize,
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Parse and validate a JSON artifact
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let artifact: NetworkArtifact = serde_json::from_str(text)?;
        Self::from_artifact(artifact)
    }

    /// Validate an artifact and build the network
    ///
    /// # Errors
    /// - `ArtifactMalformed` for an unknown format, no layers, or non-finite weights
    /// - `ShapeMismatch` when layer dimensions do not chain
    pub fn from_artifact(artifact: NetworkArtifact) -> Result<Self, ModelError> {
        if artifact.format != ARTIFACT_FORMAT {
            return Err(ModelError::ArtifactMalformed {
                reason: format!(
                    "unsupported format '{}', expected '{}'",
                    artifact.format, ARTIFACT_FORMAT
                ),
            });
        }
        if artifact.layers.is_empty() {
            return Err(ModelError::ArtifactMalformed {
                reason: "network has no layers".to_string(),
            });
        }
        if artifact.input_size == 0 {
            return Err(ModelError::ShapeMismatch {
                reason: "input_size must be greater than 0".to_string(),
            });
        }

        let mut layers = Vec::with_capacity(artifact.layers.len());
        let mut in_size = artifact.input_size;
        for (index, layer) in artifact.layers.into_iter().enumerate() {
            let out_size = layer.bias.len();
            if out_size == 0 || layer.weights.len() != out_size {
                return Err(ModelError::ShapeMismatch {
                    reason: format!(
                        "layer {}: {} weight rows for {} biases",
                        index,
                        layer.weights.len(),
                        out_size
                    ),
                });
            }
            if let Some(row) = layer.weights.iter().position(|row| row.len() != in_size) {
                return Err(ModelError::ShapeMismatch {
                    reason: format!(
                        "layer {} row {}: expected {} inputs, got {}",
                        index,
                        row,
                        in_size,
                        layer.weights[row].len()
                    ),
                });
            }

            let weights: Vec<f32> = layer.weights.into_iter().flatten().collect();
            if weights.iter().chain(&layer.bias).any(|v| !v.is_finite()) {
                return Err(ModelError::ArtifactMalformed {
                    reason: format!("layer {} contains non-finite parameters", index),
                });
            }

            layers.push(DenseLayer {
                weights,
                bias: layer.bias,
                in_size,
                out_size,
                activation: layer.activation,
            });
            in_size = out_size;
        }

        Ok(Self {
            input_size: artifact.input_size,
            layers,
        })
    }

    /// Reject networks whose outer shape is not `input → output`
    pub fn expect_shape(self, input: usize, output: usize) -> Result<Self, ModelError> {
        if self.input_size != input || self.output_len() != output {
            return Err(ModelError::ShapeMismatch {
                reason: format!(
                    "network maps {} → {}, expected {} → {}",
                    self.input_size,
                    self.output_len(),
                    input,
                    output
                ),
            });
        }
        Ok(self)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl QualityModel for DenseNetwork {
    fn input_len(&self) -> usize {
        self.input_size
    }

    fn output_len(&self) -> usize {
        self.layers.last().map(|layer| layer.out_size).unwrap_or(0)
    }

    fn forward(
        &self,
        input: &PooledTensor,
        pool: &TensorPool,
    ) -> Result<PooledTensor, InferenceError> {
        if input.len() != self.input_size {
            return Err(InferenceError::ShapeMismatch {
                expected: self.input_size,
                actual: input.len(),
            });
        }

        let mut current: Option<PooledTensor> = None;
        for layer in &self.layers {
            let mut output = pool.acquire(TensorShape::row(layer.out_size));
            let source: &[f32] = match &current {
                Some(activations) => &activations[..],
                None => &input[..],
            };
            layer.apply(source, &mut output);
            // Replacing `current` releases the previous activation row
            current = Some(output);
        }

        let output = current.ok_or_else(|| InferenceError::ForwardFailed {
            reason: "network has no layers".to_string(),
        })?;
        if let Some(index) = output.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFiniteOutput { index });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_artifact(size: usize, activation: Activation) -> NetworkArtifact {
        NetworkArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            input_size: size,
            layers: vec![LayerArtifact {
                weights: (0..size)
                    .map(|o| (0..size).map(|i| if i == o { 1.0 } else { 0.0 }).collect())
                    .collect(),
                bias: vec![0.0; size],
                activation,
            }],
        }
    }

    fn run(network: &DenseNetwork, values: &[f32]) -> Vec<f32> {
        let pool = TensorPool::new(4);
        let mut input = pool.acquire(TensorShape::row(values.len()));
        input.copy_from_slice(values);
        let output = network.forward(&input, &pool).unwrap();
        output.to_vec()
    }

    #[test]
    fn test_linear_identity() {
        let network = DenseNetwork::from_artifact(identity_artifact(3, Activation::Linear)).unwrap();
        assert_eq!(run(&network, &[1.0, -2.0, 3.0]), vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_relu_and_softmax() {
        let network = DenseNetwork::from_artifact(identity_artifact(3, Activation::Relu)).unwrap();
        assert_eq!(run(&network, &[1.0, -2.0, 3.0]), vec![1.0, 0.0, 3.0]);

        let network =
            DenseNetwork::from_artifact(identity_artifact(3, Activation::Softmax)).unwrap();
        let output = run(&network, &[0.0, 0.0, 0.0]);
        for value in &output {
            assert!((value - 1.0 / 3.0).abs() < 1e-6);
        }
        let output = run(&network, &[1000.0, 0.0, 0.0]);
        assert!((output[0] - 1.0).abs() < 1e-6, "softmax must be overflow-safe");
    }

    #[test]
    fn test_two_layer_chain() {
        let json = r#"{
            "format": "dense-v1",
            "input_size": 2,
            "layers": [
                { "weights": [[1.0, 1.0], [1.0, -1.0], [0.0, 2.0]], "bias": [0.0, 0.0, -1.0], "activation": "relu" },
                { "weights": [[1.0, 0.0, 0.0], [0.0, 1.0, 1.0]], "bias": [0.5, 0.0] }
            ]
        }"#;
        let network = DenseNetwork::from_json(json).unwrap();
        assert_eq!(network.layer_count(), 2);
        assert_eq!(network.input_len(), 2);
        assert_eq!(network.output_len(), 2);

        // hidden = relu([3, -1, 3]) = [3, 0, 3]; out = [3.5, 3]
        assert_eq!(run(&network, &[1.0, 2.0]), vec![3.5, 3.0]);
    }

    #[test]
    fn test_forward_releases_intermediate_tensors() {
        let json = r#"{
            "format": "dense-v1",
            "input_size": 2,
            "layers": [
                { "weights": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.0], "activation": "tanh" },
                { "weights": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.0], "activation": "sigmoid" },
                { "weights": [[1.0, 1.0]], "bias": [0.0] }
            ]
        }"#;
        let network = DenseNetwork::from_json(json).unwrap();
        let pool = TensorPool::new(4);
        for _ in 0..50 {
            let input = pool.acquire(TensorShape::row(2));
            let output = network.forward(&input, &pool).unwrap();
            assert_eq!(pool.outstanding(), 2);
            drop(output);
            drop(input);
        }
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.allocations() <= 4);
    }

    #[test]
    fn test_rejects_bad_artifacts() {
        let mut artifact = identity_artifact(3, Activation::Linear);
        artifact.format = "tfjs-layers".to_string();
        assert!(matches!(
            DenseNetwork::from_artifact(artifact),
            Err(ModelError::ArtifactMalformed { .. })
        ));

        let mut artifact = identity_artifact(3, Activation::Linear);
        artifact.layers[0].weights[1].pop();
        assert!(matches!(
            DenseNetwork::from_artifact(artifact),
            Err(ModelError::ShapeMismatch { .. })
        ));

        let mut artifact = identity_artifact(3, Activation::Linear);
        artifact.layers[0].bias[0] = f32::NAN;
        assert!(matches!(
            DenseNetwork::from_artifact(artifact),
            Err(ModelError::ArtifactMalformed { .. })
        ));

        let mut artifact = identity_artifact(3, Activation::Linear);
        artifact.layers.clear();
        assert!(DenseNetwork::from_artifact(artifact).is_err());

        assert!(matches!(
            DenseNetwork::from_json("not json"),
            Err(ModelError::ArtifactMalformed { .. })
        ));
    }

    #[test]
    fn test_expect_shape() {
        let network = DenseNetwork::from_artifact(identity_artifact(3, Activation::Linear)).unwrap();
        assert!(matches!(
            network.expect_shape(14, 3),
            Err(ModelError::ShapeMismatch { .. })
        ));

        let network = DenseNetwork::from_artifact(identity_artifact(3, Activation::Linear)).unwrap();
        assert!(network.expect_shape(3, 3).is_ok());
    }

    #[test]
    fn test_forward_rejects_wrong_input_width() {
        let network = DenseNetwork::from_artifact(identity_artifact(3, Activation::Linear)).unwrap();
        let pool = TensorPool::new(2);
        let input = pool.acquire(TensorShape::row(5));
        assert_eq!(
            network.forward(&input, &pool).unwrap_err(),
            InferenceError::ShapeMismatch {
                expected: 3,
                actual: 5
            }
        );
    }
}
