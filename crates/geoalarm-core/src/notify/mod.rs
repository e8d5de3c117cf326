//! Notification delivery.
//!
//! Sinks are stateless apart from their permission. A sink that is not
//! granted swallows deliveries; the tracker keeps computing regardless.

use std::io::Write;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::proximity::Notification;

/// Outcome of a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// The user dismissed the prompt without choosing.
    #[default]
    Default,
}

/// Every notification backend implements this trait.
pub trait NotificationSink: Send + Sync {
    /// Unique identifier for logs (e.g. "terminal", "memory").
    fn name(&self) -> &str;

    /// Ask the platform for permission. May prompt the user.
    fn request_permission(&self) -> Permission;

    /// Current permission without prompting.
    fn permission(&self) -> Permission;

    /// Show a notification. Returns `Ok(false)` without side effects when
    /// permission has not been granted.
    fn deliver(&self, notification: &Notification) -> Result<bool, CoreError>;
}

/// Writes a bell and a one-line banner to stderr.
pub struct TerminalSink {
    permission: Mutex<Permission>,
    /// What `request_permission` resolves to.
    grant: Permission,
}

impl TerminalSink {
    pub fn new(enabled: bool) -> Self {
        Self {
            permission: Mutex::new(Permission::Default),
            grant: if enabled {
                Permission::Granted
            } else {
                Permission::Denied
            },
        }
    }
}

impl NotificationSink for TerminalSink {
    fn name(&self) -> &str {
        "terminal"
    }

    fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock().unwrap_or_else(|e| e.into_inner());
        *permission = self.grant;
        *permission
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, notification: &Notification) -> Result<bool, CoreError> {
        if self.permission() != Permission::Granted {
            return Ok(false);
        }
        let mut err = std::io::stderr().lock();
        writeln!(err, "\x07[{}] {}", notification.title, notification.body)?;
        Ok(true)
    }
}

/// Keeps every delivered notification in memory.
#[derive(Debug)]
pub struct MemorySink {
    grant: Permission,
    permission: Mutex<Permission>,
    delivered: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new(grant: Permission) -> Self {
        Self {
            grant,
            permission: Mutex::new(Permission::Default),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted)
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl NotificationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock().unwrap_or_else(|e| e.into_inner());
        *permission = self.grant;
        *permission
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, notification: &Notification) -> Result<bool, CoreError> {
        if self.permission() != Permission::Granted {
            return Ok(false);
        }
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::ThresholdKm;
    use chrono::Utc;

    fn sample() -> Notification {
        Notification {
            title: "Almost there".into(),
            body: "You are 900 m from your destination.".into(),
            distance_meters: 900.0,
            threshold_km: ThresholdKm::Two,
            at: Utc::now(),
        }
    }

    #[test]
    fn nothing_delivered_before_permission() {
        let sink = MemorySink::granted();
        assert_eq!(sink.permission(), Permission::Default);
        assert!(!sink.deliver(&sample()).unwrap());
        assert!(sink.delivered().is_empty());

        assert_eq!(sink.request_permission(), Permission::Granted);
        assert!(sink.deliver(&sample()).unwrap());
        assert_eq!(sink.delivered().len(), 1);
    }

    #[test]
    fn denied_sink_is_silent() {
        let sink = MemorySink::new(Permission::Denied);
        assert_eq!(sink.request_permission(), Permission::Denied);
        assert!(!sink.deliver(&sample()).unwrap());
        assert!(sink.delivered().is_empty());
    }

    #[test]
    fn disabled_terminal_sink_denies() {
        let sink = TerminalSink::new(false);
        assert_eq!(sink.request_permission(), Permission::Denied);
        assert!(!sink.deliver(&sample()).unwrap());
    }
}
