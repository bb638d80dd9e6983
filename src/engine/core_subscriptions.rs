use futures::future;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::analysis::{FeatureReport, QualityResult, QualitySnapshot};

use super::QualitySession;

impl QualitySession {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// Receiver for every published result, in evaluation order
    pub fn subscribe_results(&self) -> Option<broadcast::Receiver<QualityResult>> {
        self.inner.broadcasts.subscribe_quality()
    }

    pub fn subscribe_features(&self) -> Option<broadcast::Receiver<FeatureReport>> {
        self.inner.broadcasts.subscribe_features()
    }

    /// Stream of published results; lagged items are skipped
    pub fn result_stream(&self) -> impl Stream<Item = QualityResult> + Unpin + Send + 'static {
        let receiver = self
            .subscribe_results()
            .unwrap_or_else(|| broadcast::channel(1).1);
        BroadcastStream::new(receiver).filter_map(|item| future::ready(item.ok()))
    }

    /// Stream of feature reports behind each published result
    pub fn feature_stream(&self) -> impl Stream<Item = FeatureReport> + Unpin + Send + 'static {
        let receiver = self
            .subscribe_features()
            .unwrap_or_else(|| broadcast::channel(1).1);
        BroadcastStream::new(receiver).filter_map(|item| future::ready(item.ok()))
    }

    /// Stream of the latest snapshot, starting with the current value
    pub fn snapshot_stream(&self) -> impl Stream<Item = QualitySnapshot> + Unpin + Send + 'static {
        WatchStream::new(self.subscribe())
    }
}
