use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PositionError;
use crate::geo::GeoPoint;
use crate::proximity::{Notification, ProximitySnapshot, ThresholdKm};

/// Every state change in the tracker produces an Event.
/// The CLI prints them as JSON lines; a GUI would render from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    DestinationSet {
        destination: GeoPoint,
        at: DateTime<Utc>,
    },
    DestinationCleared {
        at: DateTime<Utc>,
    },
    ThresholdChanged {
        threshold_km: ThresholdKm,
        at: DateTime<Utc>,
    },
    NotificationsToggled {
        enabled: bool,
        at: DateTime<Utc>,
    },
    PositionUpdated {
        position: GeoPoint,
        distance_meters: Option<f64>,
        is_near: bool,
        at: DateTime<Utc>,
    },
    /// The position source reported a failure; distance is unknown until the next fix.
    PositionLost {
        error: PositionError,
        at: DateTime<Utc>,
    },
    Snoozed {
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// An alert fired. `delivered` is false when the sink lacked permission.
    ProximityAlert {
        notification: Notification,
        delivered: bool,
    },
    StateSnapshot(ProximitySnapshot),
}
