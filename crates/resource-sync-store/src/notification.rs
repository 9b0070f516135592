//! User-facing notifications.

use campus_records::Resource;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Added,
    Updated,
    Deleted,
    Error,
}

/// A mutation that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// A toast: a kind, a short title and a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn added<R: Resource>(record: &R) -> Self {
        Self {
            kind: NotificationKind::Added,
            title: format!("{} Added", R::LABEL),
            description: format!("{} has been added successfully.", record.display_name()),
        }
    }

    pub fn updated<R: Resource>(record: &R) -> Self {
        Self {
            kind: NotificationKind::Updated,
            title: format!("{} Updated", R::LABEL),
            description: format!("{} has been updated.", record.display_name()),
        }
    }

    pub fn deleted<R: Resource>() -> Self {
        Self {
            kind: NotificationKind::Deleted,
            title: format!("{} Deleted", R::LABEL),
            description: format!("{} has been removed.", R::DELETED_LABEL),
        }
    }

    pub fn load_failed<R: Resource>() -> Self {
        Self::error(format!(
            "Failed to load {}. Please try again.",
            R::COLLECTION_LABEL
        ))
    }

    pub fn mutation_failed<R: Resource>(operation: Operation) -> Self {
        Self::error(format!(
            "Failed to {} {}. Please try again.",
            operation,
            R::LABEL.to_lowercase()
        ))
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: "Error".to_string(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Receives every notification a store raises.
///
/// Called synchronously from the store; implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        if notification.is_error() {
            warn!(title = %notification.title, "{}", notification.description);
        } else {
            info!(title = %notification.title, "{}", notification.description);
        }
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // A closed receiver just means nobody is listening any more.
        let _ = self.tx.send(notification);
    }
}

/// Fan-out to several notifiers.
impl Notifier for Vec<Arc<dyn Notifier>> {
    fn notify(&self, notification: Notification) {
        if let Some((last, rest)) = self.split_last() {
            for notifier in rest {
                notifier.notify(notification.clone());
            }
            last.notify(notification);
        }
    }
}
