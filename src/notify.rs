//! User-facing notifications.
//!
//! The service reports each terminal outcome of an action exactly once through a
//! [`NotificationSink`]. Presentation is up to the sink: [`TracingNotifier`] writes to
//! the log, [`MemoryNotifier`] keeps them for inspection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    GetVariablesFailed,
    GetVariableFailed,
    CreateVariableSuccess,
    CreateVariableFailed,
    UpdateVariableSuccess,
    UpdateVariableFailed,
    DeleteVariableSuccess,
    DeleteVariableFailed,
    AddLabelFailed,
    RemoveLabelFailed,
    ExportFailed,
    /// A hydration failed for a reason other than cancellation
    ResolutionFailed,
}

impl NotificationKind {
    /// Level implied by the kind.
    #[must_use]
    pub const fn level(self) -> NotificationLevel {
        match self {
            Self::CreateVariableSuccess
            | Self::UpdateVariableSuccess
            | Self::DeleteVariableSuccess => NotificationLevel::Success,
            _ => NotificationLevel::Error,
        }
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    /// Create a notification; the level follows from `kind`.
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            level: kind.level(),
            kind,
            message: message.into(),
        }
    }

    pub fn get_variables_failed() -> Self {
        Self::new(NotificationKind::GetVariablesFailed, "Failed to fetch variables")
    }

    pub fn get_variable_failed() -> Self {
        Self::new(NotificationKind::GetVariableFailed, "Failed to fetch variable")
    }

    pub fn create_variable_success(name: &str) -> Self {
        Self::new(
            NotificationKind::CreateVariableSuccess,
            format!("Successfully created new variable: {name}"),
        )
    }

    pub fn create_variable_failed(reason: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::CreateVariableFailed,
            format!("Failed to create variable: {reason}"),
        )
    }

    pub fn update_variable_success(name: &str) -> Self {
        Self::new(
            NotificationKind::UpdateVariableSuccess,
            format!("Successfully updated variable: {name}"),
        )
    }

    pub fn update_variable_failed(reason: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::UpdateVariableFailed,
            format!("Failed to update variable: {reason}"),
        )
    }

    pub fn delete_variable_success() -> Self {
        Self::new(NotificationKind::DeleteVariableSuccess, "Successfully deleted the variable")
    }

    pub fn delete_variable_failed(reason: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::DeleteVariableFailed,
            format!("Failed to delete variable: {reason}"),
        )
    }

    pub fn add_label_failed() -> Self {
        Self::new(NotificationKind::AddLabelFailed, "Failed to add label to variable")
    }

    pub fn remove_label_failed() -> Self {
        Self::new(NotificationKind::RemoveLabelFailed, "Failed to remove label from variable")
    }

    pub fn export_failed(reason: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::ExportFailed,
            format!("Failed to export variable as template: {reason}"),
        )
    }

    pub fn resolution_failed(context_id: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::ResolutionFailed,
            format!("Failed to resolve variables for {context_id}: {reason}"),
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Receives notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                info!(kind = ?notification.kind, "{}", notification.message);
            }
            NotificationLevel::Error => {
                error!(kind = ?notification.kind, "{}", notification.message);
            }
        }
    }
}

/// Sink that records notifications in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Kinds received so far, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.notifications().into_iter().map(|n| n.kind).collect()
    }

    /// Drop everything received.
    pub fn clear(&self) {
        self.received.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap_or_else(PoisonError::into_inner).push(notification);
    }
}
