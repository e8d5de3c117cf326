//! Proximity evaluation and notification gating.
//!
//! Everything here is a pure function of its inputs. [`ProximityTracker`]
//! holds the inputs and recomputes the derived state on demand.

mod tracker;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::{compute_distance, GeoPoint};

pub use tracker::{format_distance, Notification, ProximitySnapshot, ProximityTracker, DEFAULT_ALERT_TITLE};

/// Radius that counts as "near the destination".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ThresholdKm {
    Two,
    Three,
    Four,
    #[default]
    Five,
    Ten,
    Twenty,
}

impl ThresholdKm {
    pub const ALL: [ThresholdKm; 6] = [
        ThresholdKm::Two,
        ThresholdKm::Three,
        ThresholdKm::Four,
        ThresholdKm::Five,
        ThresholdKm::Ten,
        ThresholdKm::Twenty,
    ];

    pub fn km(self) -> u32 {
        match self {
            ThresholdKm::Two => 2,
            ThresholdKm::Three => 3,
            ThresholdKm::Four => 4,
            ThresholdKm::Five => 5,
            ThresholdKm::Ten => 10,
            ThresholdKm::Twenty => 20,
        }
    }

    pub fn meters(self) -> f64 {
        f64::from(self.km()) * 1000.0
    }
}

impl TryFrom<u32> for ThresholdKm {
    type Error = ValidationError;

    fn try_from(km: u32) -> Result<Self, Self::Error> {
        ThresholdKm::ALL
            .into_iter()
            .find(|t| t.km() == km)
            .ok_or_else(|| ValidationError::UnsupportedThreshold(km.to_string()))
    }
}

impl From<ThresholdKm> for u32 {
    fn from(t: ThresholdKm) -> Self {
        t.km()
    }
}

impl FromStr for ThresholdKm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let km: u32 = s
            .trim()
            .parse()
            .map_err(|_| ValidationError::UnsupportedThreshold(s.to_string()))?;
        ThresholdKm::try_from(km)
    }
}

impl fmt::Display for ThresholdKm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} km", self.km())
    }
}

/// Distance and near/far classification for one set of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProximityReading {
    pub distance_meters: Option<f64>,
    pub is_near: bool,
}

/// Derived proximity state. Always rebuilt whole, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProximityState {
    pub distance_meters: Option<f64>,
    pub is_near: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

/// Classify `current` against `destination`.
///
/// Either point missing yields `{ None, false }`; a lost position fix is not
/// an error here, just an absent input.
pub fn evaluate_proximity(
    current: Option<&GeoPoint>,
    destination: Option<&GeoPoint>,
    threshold: ThresholdKm,
) -> ProximityReading {
    match (current, destination) {
        (Some(current), Some(destination)) => {
            let d = compute_distance(current, destination);
            ProximityReading {
                distance_meters: Some(d),
                is_near: d <= threshold.meters(),
            }
        }
        _ => ProximityReading::default(),
    }
}

/// Cooldown and snooze durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPolicy {
    /// Minimum gap between alerts while near.
    pub cooldown_near: Duration,
    /// Minimum gap between alerts while far.
    pub cooldown_far: Duration,
    /// Length of an "I'm up" snooze.
    pub snooze: Duration,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            cooldown_near: Duration::seconds(30),
            cooldown_far: Duration::seconds(60),
            snooze: Duration::minutes(5),
        }
    }
}

impl NotificationPolicy {
    pub fn cooldown(&self, is_near: bool) -> Duration {
        if is_near {
            self.cooldown_near
        } else {
            self.cooldown_far
        }
    }
}

/// The mutable part of the alarm that gates delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifyGate {
    pub enabled: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl NotifyGate {
    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| now < until)
    }
}

/// Decide whether an alert may fire at `now`.
///
/// Requires delivery enabled, `is_near`, no active snooze and the cooldown
/// elapsed since the previous alert. A gate that never fired is eligible.
pub fn should_notify(
    policy: &NotificationPolicy,
    gate: &NotifyGate,
    now: DateTime<Utc>,
    is_near: bool,
) -> bool {
    if !gate.enabled || !is_near || gate.is_snoozed(now) {
        return false;
    }
    match gate.last_notified_at {
        Some(last) => now - last >= policy.cooldown(is_near),
        None => true,
    }
}

/// Read-only projection of how long until the next alert could fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Countdown {
    /// Nothing can fire right now.
    Idle,
    Snoozed { remaining_secs: i64 },
    CoolingDown { remaining_secs: i64 },
    Ready,
}
