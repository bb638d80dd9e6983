// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::analysis::{FeatureReport, QualityResult};

type Slot<T> = Mutex<Option<broadcast::Sender<T>>>;

/// Manages the session's tokio broadcast channels
///
/// # Channel Types
/// - Quality: every published QualityResult, in evaluation order
/// - Features: the FeatureReport behind each evaluation (diagnostics)
///
/// Channels must be initialized before anyone can subscribe; subscribing to an
/// uninitialized channel returns `None`.
pub struct BroadcastChannelManager {
    quality: Slot<QualityResult>,
    features: Slot<FeatureReport>,
}

fn lock<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<broadcast::Sender<T>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    pub fn new() -> Self {
        Self {
            quality: Mutex::new(None),
            features: Mutex::new(None),
        }
    }

    // ========================================================================
    // QUALITY CHANNEL
    // ========================================================================

    /// Initialize the quality result channel
    ///
    /// Replaces any previous channel; existing receivers see it close.
    /// Lagging subscribers lose the oldest results beyond `capacity`.
    pub fn init_quality(&self, capacity: usize) -> broadcast::Sender<QualityResult> {
        let (tx, _) = broadcast::channel(capacity.max(1));
        *lock(&self.quality) = Some(tx.clone());
        tx
    }

    /// Subscribe to quality results, or `None` before `init_quality()`
    pub fn subscribe_quality(&self) -> Option<broadcast::Receiver<QualityResult>> {
        lock(&self.quality).as_ref().map(|tx| tx.subscribe())
    }

    /// Publish to current subscribers; returns how many received it
    pub fn publish_quality(&self, result: QualityResult) -> usize {
        lock(&self.quality)
            .as_ref()
            .and_then(|tx| tx.send(result).ok())
            .unwrap_or(0)
    }

    // ========================================================================
    // FEATURES CHANNEL (DIAGNOSTICS)
    // ========================================================================

    pub fn init_features(&self, capacity: usize) -> broadcast::Sender<FeatureReport> {
        let (tx, _) = broadcast::channel(capacity.max(1));
        *lock(&self.features) = Some(tx.clone());
        tx
    }

    pub fn subscribe_features(&self) -> Option<broadcast::Receiver<FeatureReport>> {
        lock(&self.features).as_ref().map(|tx| tx.subscribe())
    }

    pub fn publish_features(&self, report: FeatureReport) -> usize {
        lock(&self.features)
            .as_ref()
            .and_then(|tx| tx.send(report).ok())
            .unwrap_or(0)
    }

    /// Drop all senders so subscriber streams terminate
    pub fn close_all(&self) {
        lock(&self.quality).take();
        lock(&self.features).take();
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FeatureVector, QualityClass};

    #[test]
    fn test_quality_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_quality().is_none());

        let _tx = manager.init_quality(8);
        assert!(manager.subscribe_quality().is_some());
    }

    #[test]
    fn test_quality_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        manager.init_quality(8);

        let mut rx1 = manager.subscribe_quality().unwrap();
        let mut rx2 = manager.subscribe_quality().unwrap();

        let result = QualityResult {
            label: QualityClass::Excellent,
            confidence: 91.0,
        };
        assert_eq!(manager.publish_quality(result), 2);

        assert_eq!(rx1.try_recv().unwrap(), result);
        assert_eq!(rx2.try_recv().unwrap(), result);
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let manager = BroadcastChannelManager::new();
        let result = QualityResult {
            label: QualityClass::Bad,
            confidence: 10.0,
        };
        assert_eq!(manager.publish_quality(result), 0);

        manager.init_quality(4);
        assert_eq!(manager.publish_quality(result), 0);
    }

    #[test]
    fn test_features_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();
        assert!(manager.subscribe_features().is_none());

        manager.init_features(4);
        let mut rx = manager.subscribe_features().unwrap();
        let report = FeatureReport {
            features: FeatureVector::default(),
            spectral_peak_bin: None,
            retained_bins: 0,
        };
        assert_eq!(manager.publish_features(report), 1);
        assert_eq!(rx.try_recv().unwrap(), report);
    }

    #[test]
    fn test_close_all_ends_streams() {
        let manager = BroadcastChannelManager::new();
        manager.init_quality(4);
        let mut rx = manager.subscribe_quality().unwrap();

        manager.close_all();
        assert!(manager.subscribe_quality().is_none());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }
}
