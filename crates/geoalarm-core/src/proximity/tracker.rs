//! Proximity tracker state machine.
//!
//! The tracker owns the user-controlled inputs (destination, threshold,
//! notification toggle) plus the latest position fix and the alert gate.
//! It has no timers of its own: the caller passes `now` into every
//! time-dependent operation and is responsible for calling `tick()`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut tracker = ProximityTracker::default();
//! tracker.set_destination(dest, Utc::now());
//! tracker.update_position(fix, Utc::now());
//! if let Some(alert) = tracker.tick(Utc::now()) {
//!     sink.deliver(&alert);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    evaluate_proximity, should_notify, Countdown, NotificationPolicy, NotifyGate,
    ProximityReading, ProximityState, ThresholdKm,
};
use crate::error::PositionError;
use crate::events::Event;
use crate::geo::GeoPoint;

pub const DEFAULT_ALERT_TITLE: &str = "Almost there";

/// A notification the tracker decided to fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub distance_meters: f64,
    pub threshold_km: ThresholdKm,
    pub at: DateTime<Utc>,
}

/// Full view of the tracker for a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximitySnapshot {
    pub destination: Option<GeoPoint>,
    pub position: Option<GeoPoint>,
    pub position_error: Option<PositionError>,
    pub threshold_km: ThresholdKm,
    pub notifications_enabled: bool,
    #[serde(flatten)]
    pub state: ProximityState,
    pub can_snooze: bool,
    pub countdown: Countdown,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProximityTracker {
    destination: Option<GeoPoint>,
    threshold: ThresholdKm,
    current: Option<GeoPoint>,
    /// Most recent source failure; cleared by the next good fix.
    position_error: Option<PositionError>,
    gate: NotifyGate,
    policy: NotificationPolicy,
    alert_title: String,
}

impl Default for ProximityTracker {
    fn default() -> Self {
        Self::new(ThresholdKm::default(), true, NotificationPolicy::default())
    }
}

impl ProximityTracker {
    pub fn new(threshold: ThresholdKm, notifications_enabled: bool, policy: NotificationPolicy) -> Self {
        Self {
            destination: None,
            threshold,
            current: None,
            position_error: None,
            gate: NotifyGate {
                enabled: notifications_enabled,
                last_notified_at: None,
                snoozed_until: None,
            },
            policy,
            alert_title: DEFAULT_ALERT_TITLE.to_string(),
        }
    }

    pub fn with_alert_title(mut self, title: impl Into<String>) -> Self {
        self.alert_title = title.into();
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn destination(&self) -> Option<&GeoPoint> {
        self.destination.as_ref()
    }

    pub fn position(&self) -> Option<&GeoPoint> {
        self.current.as_ref()
    }

    pub fn position_error(&self) -> Option<PositionError> {
        self.position_error
    }

    pub fn threshold(&self) -> ThresholdKm {
        self.threshold
    }

    pub fn notifications_enabled(&self) -> bool {
        self.gate.enabled
    }

    pub fn policy(&self) -> &NotificationPolicy {
        &self.policy
    }

    pub fn reading(&self) -> ProximityReading {
        evaluate_proximity(self.current.as_ref(), self.destination.as_ref(), self.threshold)
    }

    pub fn state(&self) -> ProximityState {
        let reading = self.reading();
        ProximityState {
            distance_meters: reading.distance_meters,
            is_near: reading.is_near,
            last_notified_at: self.gate.last_notified_at,
            snoozed_until: self.gate.snoozed_until,
        }
    }

    pub fn should_notify(&self, now: DateTime<Utc>, is_near: bool) -> bool {
        should_notify(&self.policy, &self.gate, now, is_near)
    }

    /// The "I'm up" control is offered only with a destination and no live snooze.
    pub fn can_snooze(&self, now: DateTime<Utc>) -> bool {
        self.destination.is_some() && !self.gate.is_snoozed(now)
    }

    /// Time until the next alert could fire. Never mutates the gate.
    ///
    /// `Idle` whenever no alert could fire at all: notifications off, no
    /// destination, or not near it.
    pub fn countdown(&self, now: DateTime<Utc>) -> Countdown {
        if let Some(until) = self.gate.snoozed_until.filter(|until| now < *until) {
            return Countdown::Snoozed {
                remaining_secs: ceil_secs(until - now),
            };
        }
        let reading = self.reading();
        if !self.gate.enabled || !reading.is_near {
            return Countdown::Idle;
        }
        match self.gate.last_notified_at {
            Some(last) => {
                let remaining = self
                    .policy
                    .cooldown(true)
                    .checked_sub(&(now - last))
                    .unwrap_or_else(chrono::Duration::zero);
                if remaining > chrono::Duration::zero() {
                    Countdown::CoolingDown {
                        remaining_secs: ceil_secs(remaining),
                    }
                } else {
                    Countdown::Ready
                }
            }
            None => Countdown::Ready,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ProximitySnapshot {
        ProximitySnapshot {
            destination: self.destination,
            position: self.current,
            position_error: self.position_error,
            threshold_km: self.threshold,
            notifications_enabled: self.gate.enabled,
            state: self.state(),
            can_snooze: self.can_snooze(now),
            countdown: self.countdown(now),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Pick a new destination. Starts a fresh alarm: cooldown and snooze are cleared.
    pub fn set_destination(&mut self, destination: GeoPoint, now: DateTime<Utc>) -> Event {
        self.destination = Some(destination);
        self.gate.last_notified_at = None;
        self.gate.snoozed_until = None;
        tracing::debug!(%destination, "destination set");
        Event::DestinationSet {
            destination,
            at: now,
        }
    }

    /// Clear the destination and all alert timing. Threshold and toggle survive.
    pub fn reset_destination(&mut self, now: DateTime<Utc>) -> Event {
        self.destination = None;
        self.gate.last_notified_at = None;
        self.gate.snoozed_until = None;
        tracing::debug!("destination cleared");
        Event::DestinationCleared { at: now }
    }

    /// Change the radius. Re-arms the alert immediately.
    pub fn set_threshold(&mut self, threshold: ThresholdKm, now: DateTime<Utc>) -> Event {
        self.threshold = threshold;
        self.gate.last_notified_at = None;
        Event::ThresholdChanged {
            threshold_km: threshold,
            at: now,
        }
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool, now: DateTime<Utc>) -> Event {
        self.gate.enabled = enabled;
        Event::NotificationsToggled { enabled, at: now }
    }

    pub fn update_position(&mut self, position: GeoPoint, now: DateTime<Utc>) -> Event {
        self.current = Some(position);
        self.position_error = None;
        let reading = self.reading();
        Event::PositionUpdated {
            position,
            distance_meters: reading.distance_meters,
            is_near: reading.is_near,
            at: now,
        }
    }

    /// A failed fix drops the current position so the distance goes unknown.
    pub fn position_failed(&mut self, error: PositionError, now: DateTime<Utc>) -> Event {
        self.current = None;
        self.position_error = Some(error);
        Event::PositionLost { error, at: now }
    }

    /// Suppress alerts for the policy's snooze length.
    pub fn snooze(&mut self, now: DateTime<Utc>) -> Event {
        self.snooze_for(self.policy.snooze, now)
    }

    pub fn snooze_for(&mut self, duration: chrono::Duration, now: DateTime<Utc>) -> Event {
        let until = now
            .checked_add_signed(duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.gate.snoozed_until = Some(until);
        Event::Snoozed { until, at: now }
    }

    /// Recompute and, if the gate allows, claim an alert at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Notification> {
        let reading = self.reading();
        if !self.should_notify(now, reading.is_near) {
            return None;
        }
        let distance_meters = reading.distance_meters?;
        self.gate.last_notified_at = Some(now);
        Some(Notification {
            title: self.alert_title.clone(),
            body: format!(
                "You are {} from your destination.",
                format_distance(distance_meters)
            ),
            distance_meters,
            threshold_km: self.threshold,
            at: now,
        })
    }
}

/// `"850 m"` below a kilometer, `"1.25 km"` above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{meters:.0} m")
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

fn ceil_secs(d: chrono::Duration) -> i64 {
    let ms = d.num_milliseconds();
    ms.saturating_add(999).div_euclid(1000)
}
