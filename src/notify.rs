//! User-facing notifications
//!
//! The dashboard decides *which* message to show and *when*; a [`Notifier`]
//! only renders it. Notifications are fire-and-forget.

use colored::Colorize;
use std::sync::Mutex;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationVariant {
    Success,
    Error,
}

/// A titled message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Error,
        }
    }

    /// Initial or refreshed session list could not be loaded
    pub fn load_failed() -> Self {
        Self::error("Error", "Failed to load study sessions")
    }

    pub fn joined() -> Self {
        Self::success("Success", "Successfully joined the session")
    }

    pub fn already_joined() -> Self {
        Self::error("Already joined", "You have already joined this session")
    }

    pub fn join_failed() -> Self {
        Self::error("Error", "Failed to join session")
    }

    pub fn created() -> Self {
        Self::success("Success", "Study session created")
    }

    pub fn create_failed() -> Self {
        Self::error("Error", "Failed to create session")
    }

    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Error
    }
}

/// Sink for user-facing notifications
pub trait Notifier: Send + Sync + std::fmt::Debug {
    fn notify(&self, notification: Notification);
}

/// Prints notifications to the terminal
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            NotificationVariant::Success => {
                tracing::info!(title = %notification.title, "{}", notification.description);
                println!(
                    "{} {}",
                    format!("{}:", notification.title).green().bold(),
                    notification.description
                );
            }
            NotificationVariant::Error => {
                tracing::warn!(title = %notification.title, "{}", notification.description);
                eprintln!(
                    "{} {}",
                    format!("{}:", notification.title).red().bold(),
                    notification.description
                );
            }
        }
    }
}

/// Keeps every notification in memory
///
/// # Examples
///
/// ```
/// use studydash::notify::{Notification, Notifier, RecordingNotifier};
///
/// let notifier = RecordingNotifier::default();
/// notifier.notify(Notification::joined());
/// assert_eq!(notifier.take(), vec![Notification::joined()]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Drain the recorded notifications
    pub fn take(&self) -> Vec<Notification> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *seen)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}
