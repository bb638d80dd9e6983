//! Configuration management for the quality session
//!
//! Runtime configuration is loaded from JSON so that window sizes, trigger
//! cadence and the model artifact location can be tuned without rebuilding.
//! Every section has defaults; a missing or malformed file falls back to
//! them with a warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::tensor::DEFAULT_POOL_CAPACITY;
use crate::trigger::{TriggerPolicy, DEFAULT_MAX_WINDOW, DEFAULT_MIN_WINDOW};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "assets/quality_config.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub trigger: TriggerConfig,
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub ingest: IngestConfig,
    pub broadcast: BroadcastConfig,
}

/// Sample window bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Samples required before features are extracted
    pub min_window: usize,
    /// Window capacity; oldest samples are evicted beyond this
    pub max_window: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_window: DEFAULT_MIN_WINDOW,
            max_window: DEFAULT_MAX_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub policy: TriggerPolicy,
}

/// Classifier artifact location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/quality_model.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Idle tensors kept for reuse
    pub pool_capacity: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Lock-free sample queue between a producer thread and the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub queue_capacity: usize,
    /// Drain loop sleep when the queue is empty
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            poll_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Buffered results per subscriber before it lags
    pub result_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            result_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid.
    /// The result is always passed through `validated()`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        };
        config.validated()
    }

    /// Load configuration from the default assets location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Clamp inconsistent values into a usable configuration
    pub fn validated(mut self) -> Self {
        if self.window.min_window == 0 {
            log::warn!("[Config] min_window must be at least 1, using 1");
            self.window.min_window = 1;
        }
        if self.window.max_window < self.window.min_window {
            log::warn!(
                "[Config] max_window {} below min_window {}, raising",
                self.window.max_window,
                self.window.min_window
            );
            self.window.max_window = self.window.min_window;
        }

        match &mut self.trigger.policy {
            TriggerPolicy::EveryNSamples { samples } => {
                *samples = (*samples).clamp(1, self.window.max_window);
            }
            TriggerPolicy::Interval { .. } | TriggerPolicy::EverySample => {}
        }

        self.inference.pool_capacity = self.inference.pool_capacity.max(1);
        self.ingest.queue_capacity = self.ingest.queue_capacity.max(1);
        self.ingest.poll_interval_ms = self.ingest.poll_interval_ms.max(1);
        self.broadcast.result_capacity = self.broadcast.result_capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.window.min_window, 100);
        assert_eq!(config.window.max_window, 300);
        assert_eq!(config.trigger.policy, TriggerPolicy::EverySample);
        assert_eq!(config.inference.pool_capacity, 8);
        assert_eq!(config.ingest.queue_capacity, 1024);
        assert_eq!(config.broadcast.result_capacity, 64);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = AppConfig::default();
        config.trigger.policy = TriggerPolicy::EveryNSamples { samples: 25 };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_section_defaults() {
        let parsed: AppConfig = serde_json::from_str(
            r#"{ "window": { "max_window": 500 }, "trigger": { "policy": { "kind": "interval", "millis": 250 } } }"#,
        )
        .unwrap();

        assert_eq!(parsed.window.min_window, 100);
        assert_eq!(parsed.window.max_window, 500);
        assert_eq!(parsed.trigger.policy, TriggerPolicy::Interval { millis: 250 });
        assert_eq!(parsed.ingest, IngestConfig::default());
    }

    #[test]
    fn test_validated_clamps_inconsistent_values() {
        let mut config = AppConfig::default();
        config.window.min_window = 200;
        config.window.max_window = 50;
        config.trigger.policy = TriggerPolicy::EveryNSamples { samples: 10_000 };
        config.inference.pool_capacity = 0;

        let config = config.validated();
        assert_eq!(config.window.max_window, 200);
        assert_eq!(
            config.trigger.policy,
            TriggerPolicy::EveryNSamples { samples: 200 }
        );
        assert_eq!(config.inference.pool_capacity, 1);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/quality_config.json");
        assert_eq!(config, AppConfig::default());
    }
}
