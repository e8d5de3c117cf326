//! # geoalarm Core Library
//!
//! This library provides the core logic for geoalarm, a proximity alarm
//! that watches the user's position and notifies them when they get close
//! to a chosen destination. The CLI binary is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Geo**: validated coordinates and great-circle distance
//! - **Proximity**: pure near/far evaluation, cooldown and snooze gating,
//!   and the [`ProximityTracker`] state machine that takes `now` as input
//! - **Capabilities**: [`PositionSource`] and [`NotificationSink`] traits so
//!   the logic runs without any platform API
//! - **Monitor**: the tokio task that owns the timers and the subscription
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ProximityTracker`]: Alarm state machine
//! - [`ProximityMonitor`]: Timer and subscription owner
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod geo;
pub mod monitor;
pub mod notify;
pub mod position;
pub mod proximity;
pub mod storage;

pub use error::{ConfigError, CoreError, MonitorError, PositionError, ValidationError};
pub use events::Event;
pub use geo::{compute_distance, GeoPoint};
pub use monitor::{Command, MonitorConfig, MonitorHandle, ProximityMonitor};
pub use notify::{MemorySink, NotificationSink, Permission, TerminalSink};
pub use position::{ChannelSource, PositionFeed, PositionOptions, PositionSource, ReplaySource};
pub use proximity::{
    evaluate_proximity, should_notify, Countdown, Notification, NotificationPolicy,
    ProximityReading, ProximitySnapshot, ProximityState, ProximityTracker, ThresholdKm,
};
pub use storage::Config;
