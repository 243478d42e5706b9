//! Remote feed contract.
//!
//! The feed is an ordered, subscribable key-value store partitioned by
//! identity. Messages live under `chats/{identity}/messages/{id}`; the
//! command catalog lives under `commands`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::message::{Identity, Message, MessageId, MessagePatch};

pub mod file;
pub mod memory;

pub use file::FileFeed;
pub use memory::MemoryFeed;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Path of a message partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeedPath(String);

impl FeedPath {
    /// `chats/{identity}/messages`
    pub fn messages(identity: &Identity) -> Self {
        Self(format!("chats/{}/messages", identity))
    }

    /// Path of one entry in this partition.
    pub fn child(&self, id: &MessageId) -> String {
        format!("{}/{}", self.0, id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Child event kinds a listener can register for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedEventKind {
    Added,
    Removed,
    Changed,
}

/// A child event with the snapshot it refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    Added { id: MessageId, message: Message },
    Removed { id: MessageId, message: Message },
    Changed { id: MessageId, message: Message },
}

impl FeedEvent {
    pub fn kind(&self) -> FeedEventKind {
        match self {
            FeedEvent::Added { .. } => FeedEventKind::Added,
            FeedEvent::Removed { .. } => FeedEventKind::Removed,
            FeedEvent::Changed { .. } => FeedEventKind::Changed,
        }
    }
}

/// Where a listener's events are delivered. Several registrations may share
/// one sink; the feed emits into it in feed order.
pub type EventSink = mpsc::UnboundedSender<FeedEvent>;

/// Entry of the `commands` catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CommandHint {
    pub cmd: String,
    pub desc: String,
}

/// The remote store the message history is mirrored from.
#[async_trait]
pub trait Feed: Send + Sync {
    /// One-time read of a partition, in append order.
    async fn once(&self, path: &FeedPath) -> Result<Vec<(MessageId, Message)>>;

    /// Register a listener. `Added` listeners first receive every existing
    /// child in append order.
    async fn on(&self, path: &FeedPath, kind: FeedEventKind, sink: EventSink) -> Result<()>;

    /// Append a message under a feed-generated key.
    async fn push(&self, path: &FeedPath, message: Message) -> Result<MessageId>;

    async fn remove(&self, path: &FeedPath, id: &MessageId) -> Result<()>;

    async fn update(&self, path: &FeedPath, id: &MessageId, patch: &MessagePatch) -> Result<()>;

    /// Externally seeded command catalog, keyed by token.
    async fn command_catalog(&self) -> Result<BTreeMap<String, CommandHint>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_paths() {
        let identity = Identity::new("uid-1").unwrap();
        let path = FeedPath::messages(&identity);

        assert_eq!(path.as_str(), "chats/uid-1/messages");
        assert_eq!(path.child(&MessageId::new("m1")), "chats/uid-1/messages/m1");
    }
}
