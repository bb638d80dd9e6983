//! Engine module housing the quality session.
//!
//! `QualitySession` wires the trigger controller, feature extractor, model
//! provider and inference orchestrator together and publishes results to
//! subscribers. CLI and HTTP adapters drive it through the same API.

pub mod core;

pub use core::{QualitySession, SessionStatus};
