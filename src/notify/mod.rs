//! Deferred user notifications.
//!
//! The platform capability is abstracted by [`Notifier`]; the
//! [`NotificationScheduler`] arms one-shot timers against it.

use async_trait::async_trait;
use thiserror::Error;

pub mod console;
pub mod scheduler;

pub use console::ConsoleNotifier;
pub use scheduler::NotificationScheduler;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Notification permission state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; a request may still be granted.
    Default,
}

/// A notification ready for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
}

/// Platform notification capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Current permission without prompting.
    fn permission(&self) -> Permission;

    /// Ask for permission.
    async fn request_permission(&self) -> Permission;

    async fn show(&self, notification: Notification) -> Result<(), NotifyError>;
}
