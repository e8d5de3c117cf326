//! Position sources.
//!
//! A [`PositionSource`] hands out [`Subscription`]s that yield position fixes
//! or failures. Dropping a subscription releases whatever the source started
//! for it, so no watcher outlives its consumer.

mod channel;
mod replay;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::PositionError;
use crate::geo::GeoPoint;

pub use channel::{ChannelSource, PositionFeed};
pub use replay::{ReplaySource, TrackEntry};

/// One delivery from a position source.
pub type PositionFix = Result<GeoPoint, PositionError>;

/// Buffered fixes per subscription. Consumers recompute in O(1) so this only
/// absorbs bursts.
const SUBSCRIPTION_BUFFER: usize = 64;

/// Watch options forwarded to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// Oldest cached fix the source may hand back.
    pub maximum_age: Duration,
    /// How long to wait for the first fix before reporting a timeout.
    pub timeout: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Anything that can push position fixes.
pub trait PositionSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Start watching. Must be called from within a tokio runtime.
    fn subscribe(&self, options: PositionOptions) -> Subscription;
}

/// A live position watch. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<PositionFix>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Create a subscription whose fixes come from `rx`, with `worker` aborted on drop.
    pub(crate) fn new(rx: mpsc::Receiver<PositionFix>, worker: Option<JoinHandle<()>>) -> Self {
        Self { rx, worker }
    }

    pub(crate) fn channel() -> (mpsc::Sender<PositionFix>, mpsc::Receiver<PositionFix>) {
        mpsc::channel(SUBSCRIPTION_BUFFER)
    }

    /// Next fix, or `None` once the source is exhausted.
    pub async fn next(&mut self) -> Option<PositionFix> {
        self.rx.recv().await
    }

    /// Explicit form of dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
