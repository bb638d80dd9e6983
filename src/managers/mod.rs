// Managers Module
//
// Focused manager types owned by a QualitySession.
//
// - BroadcastChannelManager: tokio broadcast channels for results and diagnostics

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
