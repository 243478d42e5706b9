//! Command handler trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{Message, StoredMessage, ViewModel};

/// Failure talking to a command back-end.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Why a command produced no result message.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The argument did not have the expected shape. Raised before any
    /// external call; the text is the alert shown to the user.
    #[error("{0}")]
    Usage(String),

    /// The back-end call failed.
    #[error("{alert} ({source})")]
    Service {
        alert: String,
        #[source]
        source: ServiceError,
    },
}

impl CommandError {
    pub fn usage(alert: impl Into<String>) -> Self {
        CommandError::Usage(alert.into())
    }

    pub fn service(alert: impl Into<String>, source: ServiceError) -> Self {
        CommandError::Service {
            alert: alert.into(),
            source,
        }
    }

    /// Text of the alert message shown in place of a result.
    pub fn alert(&self) -> &str {
        match self {
            CommandError::Usage(alert) => alert,
            CommandError::Service { alert, .. } => alert,
        }
    }
}

/// Behavior behind one command token.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Build the result message for `args`. The caller publishes it on
    /// success and turns an error into an alert.
    async fn execute(&self, args: &str) -> Result<Message, CommandError>;

    /// View of a stored result of this command.
    fn present(&self, stored: &StoredMessage) -> ViewModel {
        ViewModel::from_message(&stored.message)
    }
}
