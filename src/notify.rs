//! User notification channel.
//!
//! The engines never talk to this module directly: they return typed
//! outcomes, and the shell forwards messages to a [`NotificationSink`].
//! [`SingleSlotNotifier`] reproduces the product's toast behavior: one
//! active notification at a time, new replaces old, auto-dismiss after
//! four seconds.

use std::time::{Duration, Instant};

use console::style;

/// How long a notification stays active before auto-dismissing.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Notification severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One user-facing notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    posted_at: Instant,
}

/// Destination for user-facing messages.
pub trait NotificationSink {
    fn notify(&mut self, message: &str, severity: Severity);
}

/// Holds at most one live notification; a new one replaces the old, and the
/// slot empties once the TTL elapses.
#[derive(Debug)]
pub struct SingleSlotNotifier {
    slot: Option<Notification>,
    ttl: Duration,
}

impl SingleSlotNotifier {
    pub fn new() -> Self {
        Self {
            slot: None,
            ttl: NOTIFICATION_TTL,
        }
    }

    /// Override the auto-dismiss interval (useful for testing).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The active notification, if one is live and unexpired.
    pub fn current(&self) -> Option<&Notification> {
        self.slot
            .as_ref()
            .filter(|n| n.posted_at.elapsed() < self.ttl)
    }
}

impl Default for SingleSlotNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for SingleSlotNotifier {
    fn notify(&mut self, message: &str, severity: Severity) {
        self.slot = Some(Notification {
            message: message.to_string(),
            severity,
            posted_at: Instant::now(),
        });
    }
}

/// Prints notifications to the terminal, styled by severity.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&mut self, message: &str, severity: Severity) {
        let line = match severity {
            Severity::Info => style(message).cyan(),
            Severity::Success => style(message).green(),
            Severity::Warning => style(message).yellow(),
            Severity::Error => style(message).red().bold(),
        };
        eprintln!("{line}");
    }
}
