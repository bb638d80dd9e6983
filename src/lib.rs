// PPG Signal-Quality Core
// Windowed feature extraction and classifier inference over a PPG sample stream

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod inference;
pub mod ingest;
pub mod managers;
pub mod model;
pub mod records;
pub mod telemetry;
pub mod tensor;
pub mod trigger;

// Re-exports for convenience
pub use analysis::{
    decide, ClassProbabilities, FeatureExtractor, FeatureVector, QualityClass, QualityResult,
    QualitySnapshot,
};
pub use config::AppConfig;
pub use engine::QualitySession;
pub use inference::InferenceOrchestrator;
pub use model::{ModelProvider, ModelSource, ModelState, QualityModel};
pub use trigger::{TriggerController, TriggerPolicy, TriggerState};

use once_cell::sync::OnceCell;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install a `tracing-subscriber` fmt subscriber; `log` records are bridged into it
///
/// Safe to call more than once. If the host already installed a global
/// subscriber this is a no-op.
pub fn init_logging() {
    LOGGING.get_or_init(|| {
        let verbose = std::env::var("PPG_LOG")
            .map(|value| value == "debug" || value == "trace")
            .unwrap_or(false);
        let level = if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        if tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .is_err()
        {
            log::debug!("global subscriber already installed");
        }
    });
}
