use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall-clock time that advances with the tokio clock.
///
/// Anchored once at construction; afterwards `now()` moves with
/// `tokio::time::Instant`, so paused-time tests see consistent cooldowns.
#[derive(Debug, Clone, Copy)]
pub struct MonitorClock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl MonitorClock {
    pub fn start() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin_utc,
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_default();
        self.origin_utc + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_tokio_time() {
        let origin = Utc::now();
        let clock = MonitorClock::anchored_at(origin);
        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert_eq!(clock.now() - origin, chrono::Duration::seconds(90));
    }
}
