//! Fixture utilities for the deterministic CLI harness.
//!
//! This module loads PPG sample traces from disk, generates synthetic traces,
//! parses optional expectation JSON, and replays traces through the quality
//! pipeline offline. Offline replay evaluates every trigger in order (no
//! coalescing), so its output is reproducible for CI.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::{decide, FeatureExtractor, QualityClass, QualityResult};
use crate::config::AppConfig;
use crate::error::ErrorCode;
use crate::inference::InferenceOrchestrator;
use crate::model::QualityModel;
use crate::tensor::TensorPool;
use crate::trigger::{TriggerController, TriggerDecision};

/// Default location for fixture traces.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Extensions recognised as sample traces.
const TRACE_EXTENSIONS: [&str; 2] = ["json", "txt"];

/// Parse samples from text: a JSON array, or numbers separated by whitespace/commas.
pub fn parse_samples(text: &str) -> Result<Vec<f64>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("parsing JSON sample array");
    }

    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(index, token)| {
            token
                .parse::<f64>()
                .with_context(|| format!("sample {} is not a number: '{}'", index, token))
        })
        .collect()
}

/// Load a sample trace from disk.
pub fn load_samples(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_samples(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Write a trace as a JSON array.
pub fn write_samples(path: &Path, samples: &[f64]) -> Result<()> {
    let json = serde_json::to_string(samples)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

/// Parameters for a synthetic fingertip PPG trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticPpg {
    pub sample_rate_hz: f64,
    pub heart_rate_bpm: f64,
    /// Peak amplitude of uniform noise added to each sample
    pub noise: f64,
    /// Amplitude of a slow respiratory baseline wander
    pub baseline_wander: f64,
    pub seed: u64,
}

impl Default for SyntheticPpg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 30.0,
            heart_rate_bpm: 72.0,
            noise: 0.05,
            baseline_wander: 0.1,
            seed: 7,
        }
    }
}

impl SyntheticPpg {
    /// Generate `len` samples: systolic peak, dicrotic wave, drift and noise
    pub fn generate(&self, len: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let beat_period = 60.0 / self.heart_rate_bpm.max(1.0);
        let sample_rate = self.sample_rate_hz.max(1.0);

        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate;
                let phase = (t % beat_period) / beat_period;
                let systolic = (-((phase - 0.2) / 0.07).powi(2)).exp();
                let dicrotic = 0.4 * (-((phase - 0.45) / 0.1).powi(2)).exp();
                let wander =
                    self.baseline_wander * (2.0 * std::f64::consts::PI * 0.25 * t).sin();
                let noise = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                systolic + dicrotic + wander + noise - 0.5
            })
            .collect()
    }
}

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub trace_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture trace.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub samples: Vec<f64>,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureExpectations {
    /// Label the final result must carry
    #[serde(default)]
    pub final_label: Option<QualityClass>,
    /// Minimum confidence of the final result
    #[serde(default)]
    pub min_confidence: Option<f64>,
    /// Exact number of evaluations expected
    #[serde(default)]
    pub evaluations: Option<usize>,
}

impl FixtureExpectations {
    pub fn verify(&self, actual: &[AssessedWindow]) -> std::result::Result<(), Vec<String>> {
        let mut failures = Vec::new();
        let last = actual.last().map(|window| window.result);

        if let Some(expected) = self.evaluations {
            if actual.len() != expected {
                failures.push(format!(
                    "expected {} evaluations, got {}",
                    expected,
                    actual.len()
                ));
            }
        }
        if let Some(label) = self.final_label {
            match last {
                Some(result) if result.label == label => {}
                Some(result) => failures.push(format!(
                    "expected final label {}, got {}",
                    label, result.label
                )),
                None => failures.push(format!("expected final label {}, got none", label)),
            }
        }
        if let Some(min) = self.min_confidence {
            let confidence = last.map(|result| result.confidence).unwrap_or(0.0);
            if confidence < min {
                failures.push(format!(
                    "expected confidence ≥ {:.1}, got {:.1}",
                    min, confidence
                ));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixture traces; `*.expect.json` files are expectations, not traces.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if is_trace(&path) {
                fixtures.push(self.metadata_for_path(&path)?);
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load a fixture by name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let trace_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&trace_path)?;
        let samples = load_samples(&trace_path)?;

        let expectations = match override_expect.or(metadata.expect_path.clone()) {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            samples,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        TRACE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{fixture}.{ext}")))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| anyhow!("Fixture '{fixture}' not found in {}", self.root.display()))
    }

    fn metadata_for_path(&self, trace_path: &Path) -> Result<FixtureMetadata> {
        let name = trace_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", trace_path.display()))?
            .to_string();
        let expect_path = trace_path.with_file_name(format!("{name}.expect.json"));
        Ok(FixtureMetadata {
            name,
            trace_path: trace_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn is_trace(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.ends_with(".expect.json") {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TRACE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// One evaluated window from an offline replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssessedWindow {
    /// Samples consumed when the window was evaluated
    pub sequence: u64,
    pub window_len: usize,
    pub result: QualityResult,
}

/// Replays traces through trigger, extraction, inference and decision.
pub struct FixtureProcessor {
    config: AppConfig,
    extractor: FeatureExtractor,
    orchestrator: InferenceOrchestrator,
}

impl FixtureProcessor {
    pub fn new(config: AppConfig) -> Self {
        let config = config.validated();
        let orchestrator = InferenceOrchestrator::new(
            TensorPool::new(config.inference.pool_capacity),
            config.window.min_window,
        );
        Self {
            config,
            extractor: FeatureExtractor::new(),
            orchestrator,
        }
    }

    /// Evaluate every trigger in order; failed cycles are skipped like in a live session
    pub fn run(&self, samples: &[f64], model: &dyn QualityModel) -> Result<Vec<AssessedWindow>> {
        let mut trigger = TriggerController::new(
            self.config.window.min_window,
            self.config.window.max_window,
            self.config.trigger.policy,
        );
        let mut results = Vec::new();

        for (index, &sample) in samples.iter().enumerate() {
            let decision = trigger
                .push(sample)
                .map_err(|err| anyhow!("sample {}: {}", index, err.message()))?;
            let TriggerDecision::Fire(snapshot) = decision else {
                continue;
            };

            let features = self.extractor.extract(&snapshot.samples);
            if let Ok(probabilities) = self.orchestrator.run_with_model(model, &features) {
                results.push(AssessedWindow {
                    sequence: snapshot.sequence,
                    window_len: snapshot.len(),
                    result: decide(&probabilities),
                });
            }
            trigger.complete(snapshot.generation);
        }

        Ok(results)
    }

    pub fn tensor_pool(&self) -> &TensorPool {
        self.orchestrator.pool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FEATURE_COUNT;
    use crate::error::InferenceError;
    use crate::tensor::{PooledTensor, TensorShape};
    use crate::trigger::TriggerPolicy;

    struct ConstantModel;

    impl QualityModel for ConstantModel {
        fn input_len(&self) -> usize {
            FEATURE_COUNT
        }

        fn output_len(&self) -> usize {
            3
        }

        fn forward(
            &self,
            _input: &PooledTensor,
            pool: &TensorPool,
        ) -> Result<PooledTensor, InferenceError> {
            let mut out = pool.acquire(TensorShape::row(3));
            out.copy_from_slice(&[0.1, 0.3, 0.6]);
            Ok(out)
        }
    }

    #[test]
    fn test_parse_json_and_text_samples() {
        assert_eq!(parse_samples("[1, 2.5, -3]").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(
            parse_samples("1\n2.5  -3,4\n").unwrap(),
            vec![1.0, 2.5, -3.0, 4.0]
        );
        assert!(parse_samples("1 two 3").is_err());
        assert!(parse_samples("").unwrap().is_empty());
    }

    #[test]
    fn test_synthetic_trace_is_deterministic() {
        let synth = SyntheticPpg::default();
        let a = synth.generate(300);
        let b = synth.generate(300);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.is_finite()));

        let other = SyntheticPpg {
            seed: 8,
            ..SyntheticPpg::default()
        };
        assert_ne!(a, other.generate(300));
    }

    #[test]
    fn test_offline_replay_every_sample() {
        let processor = FixtureProcessor::new(AppConfig::default());
        let samples = SyntheticPpg::default().generate(150);

        let windows = processor.run(&samples, &ConstantModel).unwrap();
        // Samples 100..=150 each fire once
        assert_eq!(windows.len(), 51);
        assert_eq!(windows[0].sequence, 100);
        assert_eq!(windows[0].result.label, QualityClass::Excellent);
        assert_eq!(processor.tensor_pool().outstanding(), 0);
    }

    #[test]
    fn test_offline_replay_every_n_samples() {
        let mut config = AppConfig::default();
        config.trigger.policy = TriggerPolicy::EveryNSamples { samples: 25 };
        let processor = FixtureProcessor::new(config);
        let samples = SyntheticPpg::default().generate(200);

        let windows = processor.run(&samples, &ConstantModel).unwrap();
        let sequences: Vec<u64> = windows.iter().map(|w| w.sequence).collect();
        assert_eq!(sequences, vec![100, 125, 150, 175, 200]);
    }

    #[test]
    fn test_non_finite_sample_reports_index() {
        let processor = FixtureProcessor::new(AppConfig::default());
        let err = processor.run(&[0.0, f64::NAN], &ConstantModel).unwrap_err();
        assert!(err.to_string().contains("sample 1"));
    }

    #[test]
    fn test_expectations_verify() {
        let expectations = FixtureExpectations {
            final_label: Some(QualityClass::Excellent),
            min_confidence: Some(50.0),
            evaluations: Some(1),
        };
        let window = AssessedWindow {
            sequence: 100,
            window_len: 100,
            result: QualityResult {
                label: QualityClass::Excellent,
                confidence: 60.0,
            },
        };
        assert!(expectations.verify(&[window]).is_ok());

        let failures = expectations.verify(&[]).unwrap_err();
        assert_eq!(failures.len(), 3);
    }

    #[test]
    fn test_catalog_discovers_traces() {
        let root = std::env::temp_dir().join(format!("ppg_fixtures_{}", std::process::id()));
        fs::create_dir_all(&root).unwrap();
        write_samples(&root.join("clean.json"), &[1.0, 2.0]).unwrap();
        fs::write(root.join("clean.expect.json"), r#"{"final_label":"excellent"}"#).unwrap();
        fs::write(root.join("noisy.txt"), "1 2 3").unwrap();
        fs::write(root.join("notes.md"), "ignored").unwrap();

        let catalog = FixtureCatalog::new(&root);
        let fixtures = catalog.discover().unwrap();
        let names: Vec<&str> = fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["clean", "noisy"]);
        assert!(fixtures[0].expect_path.is_some());

        let data = catalog.load("clean", None).unwrap();
        assert_eq!(data.samples, vec![1.0, 2.0]);
        assert_eq!(
            data.expectations.unwrap().final_label,
            Some(QualityClass::Excellent)
        );

        fs::remove_dir_all(&root).ok();
    }
}
