//! Change source trait and channel adapters.
//!
//! The coalescer never looks at what a source yields. It only needs to know
//! that *something* changed, or that the source is finished.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

/// A stream of opaque "something changed" notifications.
///
/// Implementations discard payloads. Closure is terminal, not an error.
/// `next_change` must be cancel safe: the worker drops the future whenever
/// a timer or cancellation wins the race, and no change may be lost then.
#[async_trait]
pub trait ChangeSource: Send {
    /// Wait for the next change.
    ///
    /// Returns `Some(())` when a change occurred and `None` once the
    /// producer has closed the source.
    async fn next_change(&mut self) -> Option<()>;
}

#[async_trait]
impl<T: Send> ChangeSource for mpsc::Receiver<T> {
    async fn next_change(&mut self) -> Option<()> {
        self.recv().await.map(|_| ())
    }
}

#[async_trait]
impl<T: Send> ChangeSource for mpsc::UnboundedReceiver<T> {
    async fn next_change(&mut self) -> Option<()> {
        self.recv().await.map(|_| ())
    }
}

#[async_trait]
impl<T: Clone + Send> ChangeSource for broadcast::Receiver<T> {
    async fn next_change(&mut self) -> Option<()> {
        match self.recv().await {
            Ok(_) => Some(()),
            // Missed messages still mean the watched state moved on.
            Err(broadcast::error::RecvError::Lagged(n)) => {
                crate::debug_event!("source", "lagged", "{n} messages skipped");
                Some(())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[async_trait]
impl<T: Send + Sync> ChangeSource for watch::Receiver<T> {
    async fn next_change(&mut self) -> Option<()> {
        self.changed().await.ok()
    }
}
