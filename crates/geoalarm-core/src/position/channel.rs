//! Push-based position source for embedding.
//!
//! The host holds a [`PositionFeed`] and pushes fixes as its platform reports
//! them; every subscription sees every fix pushed while it is alive.

use tokio::sync::broadcast;

use super::{PositionFix, PositionOptions, PositionSource, Subscription};

const FEED_CAPACITY: usize = 16;

/// Sending half, owned by whatever talks to the platform location API.
#[derive(Debug, Clone)]
pub struct PositionFeed {
    tx: broadcast::Sender<PositionFix>,
}

impl PositionFeed {
    /// Push a fix. Returns how many subscriptions received it.
    pub fn push(&self, fix: PositionFix) -> usize {
        self.tx.send(fix).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[derive(Debug, Clone)]
pub struct ChannelSource {
    tx: broadcast::Sender<PositionFix>,
}

impl ChannelSource {
    pub fn pair() -> (PositionFeed, Self) {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        (PositionFeed { tx: tx.clone() }, Self { tx })
    }
}

impl PositionSource for ChannelSource {
    fn name(&self) -> &str {
        "channel"
    }

    fn subscribe(&self, _options: PositionOptions) -> Subscription {
        let mut feed = self.tx.subscribe();
        let (tx, rx) = Subscription::channel();
        let worker = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(fix) => {
                        if tx.send(fix).await.is_err() {
                            return;
                        }
                    }
                    // Older fixes are superseded by newer ones anyway.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "position feed lagged; dropping stale fixes");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        Subscription::new(rx, Some(worker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PositionError;
    use crate::geo::GeoPoint;

    #[tokio::test]
    async fn forwards_fixes_and_releases_on_drop() {
        let (feed, source) = ChannelSource::pair();
        let mut sub = source.subscribe(PositionOptions::default());
        assert_eq!(feed.subscriber_count(), 1);

        let p = GeoPoint::new(10.0, 20.0).unwrap();
        feed.push(Ok(p));
        feed.push(Err(PositionError::PermissionDenied));
        assert_eq!(sub.next().await, Some(Ok(p)));
        assert_eq!(sub.next().await, Some(Err(PositionError::PermissionDenied)));

        sub.unsubscribe();
        // The forwarding task is aborted; let the runtime reap it.
        for _ in 0..10 {
            if feed.subscriber_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(feed.subscriber_count(), 0);
    }
}
