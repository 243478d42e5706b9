//! Input dispatch.
//!
//! Each submission takes exactly one of two paths, chosen synchronously:
//! - command path: `/name<whitespace>...` is looked up in the registry and
//!   its handler is spawned without waiting for it
//! - plain path: anything else is published verbatim as a plain message

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::commands::{CommandHandler, CommandRegistry, COMMAND_PREFIX};
use crate::message::{Identity, Message, MessageId};
use crate::store::{MessageStore, StoreError};

/// Alert for a command token nobody registered.
pub const UNRECOGNIZED_ALERT: &str = "Oops, i do not recognize that command ¯\\_(ツ)_/¯";

/// Outcome of one submission.
#[derive(Debug)]
pub enum Dispatch {
    /// A handler was started. Dropping the handle leaves it running.
    Command { token: String, task: JoinHandle<()> },
    /// The token is not registered; an alert was injected locally.
    Unrecognized { token: String, alert: MessageId },
    /// No identity is attached, so the command was not run.
    NoIdentity { token: String },
    /// Plain text. `None` when nothing was published.
    Plain(Option<MessageId>),
}

/// Split command input into token and argument string.
///
/// Matches a prefix character, one or more lowercase ASCII letters and a
/// whitespace character at the start of `input`. The argument is everything
/// after that whitespace and may be empty.
pub fn parse_command(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix(COMMAND_PREFIX)?;
    let name_len = rest
        .find(|c: char| !c.is_ascii_lowercase())
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }

    let separator = rest[name_len..].chars().next()?;
    if !separator.is_whitespace() {
        return None;
    }

    let token_end = COMMAND_PREFIX.len_utf8() + name_len;
    let args_start = token_end + separator.len_utf8();
    Some((&input[..token_end], &input[args_start..]))
}

pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    store: Arc<MessageStore>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>, store: Arc<MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Route one submission. Must be called from within a tokio runtime.
    pub async fn dispatch(&self, input: &str) -> Dispatch {
        match parse_command(input) {
            Some((token, args)) => self.dispatch_command(token, args).await,
            None => self.dispatch_plain(input).await,
        }
    }

    async fn dispatch_command(&self, token: &str, args: &str) -> Dispatch {
        let Some(identity) = self.store.identity().await else {
            tracing::debug!("No identity, {} not run", token);
            return Dispatch::NoIdentity {
                token: token.to_string(),
            };
        };

        let Some(definition) = self.registry.find(token) else {
            tracing::debug!("Unrecognized command {}", token);
            return match self.store.push_alert_as(&identity, UNRECOGNIZED_ALERT).await {
                Some(alert) => Dispatch::Unrecognized {
                    token: token.to_string(),
                    alert,
                },
                None => Dispatch::NoIdentity {
                    token: token.to_string(),
                },
            };
        };

        tracing::debug!("Dispatching {} with '{}'", token, args);
        let task = tokio::spawn(run_handler(
            token.to_string(),
            Arc::clone(definition.handler()),
            args.to_string(),
            identity,
            Arc::clone(&self.store),
        ));

        Dispatch::Command {
            token: token.to_string(),
            task,
        }
    }

    async fn dispatch_plain(&self, input: &str) -> Dispatch {
        match self.store.publish(Message::plain(input)).await {
            Ok(id) => Dispatch::Plain(Some(id)),
            Err(StoreError::NoIdentity) => {
                tracing::debug!("No identity, plain message dropped");
                Dispatch::Plain(None)
            }
            Err(e) => {
                tracing::warn!("Failed to publish message: {}", e);
                Dispatch::Plain(None)
            }
        }
    }
}

/// Run a handler to completion: publish its result or surface its alert.
///
/// Both land only if `identity`, the sender, is still attached.
async fn run_handler(
    token: String,
    handler: Arc<dyn CommandHandler>,
    args: String,
    identity: Identity,
    store: Arc<MessageStore>,
) {
    match handler.execute(&args).await {
        Ok(message) => match store.publish_as(&identity, message).await {
            Ok(id) => tracing::debug!("{} result published as {}", token, id),
            Err(e) => tracing::debug!("{} result not published: {}", token, e),
        },
        Err(e) => {
            tracing::warn!("{} failed: {}", token, e);
            store.push_alert_as(&identity, e.alert()).await;
        }
    }
}
