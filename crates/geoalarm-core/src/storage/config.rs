//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default proximity threshold
//! - Notification toggle, title and cooldown/snooze lengths
//! - Recheck and countdown timer periods
//! - Position watch options
//!
//! Configuration is stored at `~/.config/geoalarm/config.toml`. The
//! destination itself is never persisted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::monitor::MonitorConfig;
use crate::position::PositionOptions;
use crate::proximity::{NotificationPolicy, ProximityTracker, ThresholdKm};

const FILE_NAME: &str = "config.toml";

/// Upper bound for cooldowns and snooze: one day.
const MAX_ALERT_SECS: u64 = 86_400;
/// Upper bound for timer periods: one hour.
const MAX_TIMER_SECS: u64 = 3_600;
/// Upper bound for position watch durations: one hour.
const MAX_POSITION_MS: u64 = 3_600_000;

/// Proximity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityConfig {
    #[serde(default)]
    pub threshold_km: ThresholdKm,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_cooldown_near")]
    pub cooldown_near_secs: u64,
    #[serde(default = "default_cooldown_far")]
    pub cooldown_far_secs: u64,
    /// Length of the "I'm up" snooze.
    #[serde(default = "default_snooze")]
    pub snooze_secs: u64,
}

/// Timer periods for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersConfig {
    #[serde(default = "default_recheck")]
    pub recheck_secs: u64,
    #[serde(default = "default_countdown")]
    pub countdown_secs: u64,
}

/// Position watch options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    #[serde(default = "default_maximum_age")]
    pub maximum_age_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/geoalarm/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub position: PositionConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_title() -> String {
    crate::proximity::DEFAULT_ALERT_TITLE.to_string()
}
fn default_cooldown_near() -> u64 {
    30
}
fn default_cooldown_far() -> u64 {
    60
}
fn default_snooze() -> u64 {
    300
}
fn default_recheck() -> u64 {
    30
}
fn default_countdown() -> u64 {
    1
}
fn default_maximum_age() -> u64 {
    1_000
}
fn default_timeout() -> u64 {
    10_000
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_km: ThresholdKm::default(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_title(),
            cooldown_near_secs: default_cooldown_near(),
            cooldown_far_secs: default_cooldown_far(),
            snooze_secs: default_snooze(),
        }
    }
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            recheck_secs: default_recheck(),
            countdown_secs: default_countdown(),
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age_ms: default_maximum_age(),
            timeout_ms: default_timeout(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole section".to_string()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounded = [
            ("timers.recheck_secs", self.timers.recheck_secs, MAX_TIMER_SECS),
            ("timers.countdown_secs", self.timers.countdown_secs, MAX_TIMER_SECS),
            ("notifications.cooldown_near_secs", self.notifications.cooldown_near_secs, MAX_ALERT_SECS),
            ("notifications.cooldown_far_secs", self.notifications.cooldown_far_secs, MAX_ALERT_SECS),
            ("notifications.snooze_secs", self.notifications.snooze_secs, MAX_ALERT_SECS),
            ("position.timeout_ms", self.position.timeout_ms, MAX_POSITION_MS),
        ];
        for (key, value, max) in bounded {
            if value == 0 || value > max {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be between 1 and {max}"),
                });
            }
        }
        if self.position.maximum_age_ms > MAX_POSITION_MS {
            return Err(ConfigError::InvalidValue {
                key: "position.maximum_age_ms".to_string(),
                message: format!("must be at most {MAX_POSITION_MS}"),
            });
        }
        Ok(())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join(FILE_NAME))
    }

    /// Load from the default directory, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is not valid for it.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Update a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.apply(key, value)?;
        self.save()?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default config");
            Self::default()
        })
    }

    pub fn policy(&self) -> NotificationPolicy {
        // Saturates on values `validate` would reject.
        let secs = |s: u64| {
            i64::try_from(s)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX)
        };
        NotificationPolicy {
            cooldown_near: secs(self.notifications.cooldown_near_secs),
            cooldown_far: secs(self.notifications.cooldown_far_secs),
            snooze: secs(self.notifications.snooze_secs),
        }
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.position.high_accuracy,
            maximum_age: Duration::from_millis(self.position.maximum_age_ms),
            timeout: Duration::from_millis(self.position.timeout_ms),
        }
    }

    /// A fresh tracker with this config's threshold, toggle and timings.
    pub fn tracker(&self) -> ProximityTracker {
        ProximityTracker::new(
            self.proximity.threshold_km,
            self.notifications.enabled,
            self.policy(),
        )
        .with_alert_title(self.notifications.title.clone())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            recheck_every: Duration::from_secs(self.timers.recheck_secs),
            countdown_every: Duration::from_secs(self.timers.countdown_secs),
            position: self.position_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.proximity.threshold_km, ThresholdKm::Five);
        assert_eq!(parsed.notifications.snooze_secs, 300);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.timers.recheck_secs, 30);
        assert_eq!(parsed.position.timeout_ms, 10_000);
    }

    #[test]
    fn rejects_unsupported_threshold_in_file() {
        assert!(toml::from_str::<Config>("[proximity]\nthreshold_km = 7\n").is_err());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("proximity.threshold_km").as_deref(), Some("5"));
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("notifications.title").as_deref(), Some("Almost there"));
        assert!(cfg.get("notifications.missing").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("proximity.threshold_km", "10").unwrap();
        cfg.apply("notifications.enabled", "false").unwrap();
        cfg.apply("notifications.title", "Wake up").unwrap();
        assert_eq!(cfg.proximity.threshold_km, ThresholdKm::Ten);
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.notifications.title, "Wake up");
    }

    #[test]
    fn apply_rejects_bad_input() {
        let mut cfg = Config::default();
        assert!(cfg.apply("proximity.threshold_km", "7").is_err());
        assert!(cfg.apply("notifications.enabled", "yes please").is_err());
        assert!(cfg.apply("timers.countdown_secs", "0").is_err());
        assert!(cfg.apply("timers.recheck_secs", "3601").is_err());
        assert!(cfg.apply("notifications.snooze_secs", "100000000000000000").is_err());
        assert!(cfg.apply("notifications.snooze_secs", "9000000000000").is_err());
        assert!(cfg.apply("notifications.cooldown_near_secs", "86401").is_err());
        assert!(cfg.apply("position.maximum_age_ms", "3600001").is_err());
        assert!(cfg.apply("timers", "1").is_err());
        assert!(cfg.apply("nope.key", "1").is_err());
        // Nothing stuck from the failed attempts.
        assert_eq!(cfg.proximity.threshold_km, ThresholdKm::Five);
        assert_eq!(cfg.timers.countdown_secs, 1);
        assert_eq!(cfg.notifications.snooze_secs, 300);

        // The bounds themselves are accepted.
        cfg.apply("notifications.snooze_secs", "86400").unwrap();
        cfg.apply("timers.recheck_secs", "3600").unwrap();
        assert_eq!(cfg.policy().snooze, chrono::Duration::days(1));
    }

    #[test]
    fn policy_saturates_on_unvalidated_values() {
        let mut cfg = Config::default();
        cfg.notifications.snooze_secs = u64::MAX;
        cfg.notifications.cooldown_near_secs = 100_000_000_000_000_000;
        assert!(cfg.validate().is_err());
        let policy = cfg.policy();
        assert_eq!(policy.snooze, chrono::Duration::MAX);
        assert_eq!(policy.cooldown_near, chrono::Duration::MAX);

        let now = chrono::Utc::now();
        let mut tracker = ProximityTracker::new(ThresholdKm::Five, true, policy);
        tracker.snooze(now);
        assert!(tracker.state().snoozed_until.is_some_and(|until| until > now));
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.notifications.cooldown_near_secs, 30);

        let mut edited = cfg.clone();
        edited.apply("notifications.snooze_secs", "120").unwrap();
        edited.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.notifications.snooze_secs, 120);
    }

    #[test]
    fn derived_policy_and_tracker() {
        let mut cfg = Config::default();
        cfg.apply("proximity.threshold_km", "2").unwrap();
        let policy = cfg.policy();
        assert_eq!(policy, NotificationPolicy::default());
        let tracker = cfg.tracker();
        assert_eq!(tracker.threshold(), ThresholdKm::Two);
        assert!(tracker.notifications_enabled());
        assert_eq!(cfg.monitor_config().recheck_every, Duration::from_secs(30));
    }
}
