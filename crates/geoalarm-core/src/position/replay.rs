//! Replays a recorded track as a position source.
//!
//! Track files hold one entry per line:
//!
//! ```text
//! # comment
//! 18.5204,73.8567
//! error:timeout
//! ```

use std::path::Path;
use std::time::Duration;

use super::{PositionFix, PositionOptions, PositionSource, Subscription};
use crate::error::{CoreError, PositionError, ValidationError};
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackEntry {
    Fix(GeoPoint),
    Failure(PositionError),
}

impl TrackEntry {
    fn into_fix(self) -> PositionFix {
        match self {
            TrackEntry::Fix(p) => Ok(p),
            TrackEntry::Failure(e) => Err(e),
        }
    }
}

/// Plays its entries in order, one every `interval`, then ends the stream.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    entries: Vec<TrackEntry>,
    interval: Duration,
}

impl ReplaySource {
    pub fn new(entries: Vec<TrackEntry>, interval: Duration) -> Self {
        Self { entries, interval }
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    /// Parse track text. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str, interval: Duration) -> Result<Self, ValidationError> {
        let mut entries = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = match line.strip_prefix("error:") {
                Some(kind) => TrackEntry::Failure(parse_failure(kind.trim(), line)?),
                None => TrackEntry::Fix(line.parse()?),
            };
            entries.push(entry);
        }
        Ok(Self::new(entries, interval))
    }

    pub async fn load(path: &Path, interval: Duration) -> Result<Self, CoreError> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&text, interval)?)
    }
}

fn parse_failure(kind: &str, line: &str) -> Result<PositionError, ValidationError> {
    match kind {
        "permission_denied" => Ok(PositionError::PermissionDenied),
        "unavailable" => Ok(PositionError::Unavailable),
        "timeout" => Ok(PositionError::Timeout),
        _ => Err(ValidationError::MalformedCoordinate(line.to_string())),
    }
}

impl PositionSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn subscribe(&self, options: PositionOptions) -> Subscription {
        tracing::debug!(
            entries = self.entries.len(),
            interval_ms = self.interval.as_millis() as u64,
            high_accuracy = options.high_accuracy,
            "replaying track"
        );
        let (tx, rx) = Subscription::channel();
        let entries = self.entries.clone();
        let interval = self.interval;
        let worker = tokio::spawn(async move {
            for (i, entry) in entries.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(interval).await;
                }
                if tx.send(entry.into_fix()).await.is_err() {
                    return;
                }
            }
        });
        Subscription::new(rx, Some(worker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixes_failures_and_comments() {
        let src = ReplaySource::parse(
            "# morning commute\n18.5,73.86\n\nerror:timeout\n 18.51 , 73.86 \n",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(src.entries().len(), 3);
        assert_eq!(src.entries()[1], TrackEntry::Failure(PositionError::Timeout));
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(ReplaySource::parse("error:lost", Duration::ZERO).is_err());
        assert!(ReplaySource::parse("not a point", Duration::ZERO).is_err());
        assert!(ReplaySource::parse("95,0", Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn replays_in_order_then_ends() {
        let src = ReplaySource::parse("1,1\nerror:unavailable\n2,2", Duration::from_secs(5)).unwrap();
        let mut sub = src.subscribe(PositionOptions::default());
        assert_eq!(sub.next().await, Some(Ok(GeoPoint::new(1.0, 1.0).unwrap())));
        assert_eq!(sub.next().await, Some(Err(PositionError::Unavailable)));
        assert_eq!(sub.next().await, Some(Ok(GeoPoint::new(2.0, 2.0).unwrap())));
        assert_eq!(sub.next().await, None);
    }
}
