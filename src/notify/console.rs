//! Terminal notifier.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{Notification, Notifier, NotifyError, Permission};

/// Prints notifications to stderr. Always permitted.
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!("Notification: {} - {}", notification.title, notification.body);

        let line = format!("\n[{}] {}\n", notification.title, notification.body);
        let mut stderr = tokio::io::stderr();
        stderr.write_all(line.as_bytes()).await?;
        stderr.flush().await?;
        Ok(())
    }
}
