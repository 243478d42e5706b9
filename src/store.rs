//! Local mirror of the remote message feed.
//!
//! The store keeps an ordered map of message id to message. Remote entries
//! arrive through feed listeners; alerts and the greeting are injected
//! locally and never reach the feed.

use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::feed::{Feed, FeedError, FeedEvent, FeedEventKind, FeedPath};
use crate::message::{Identity, Message, MessageId, MessagePatch, StoredMessage};

/// Greeting shown when a fresh identity has no history.
pub const GREETING: &str = "Hi, what can i do for you ?";

const CHANGE_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No active identity")]
    NoIdentity,

    #[error("Identity {0} is no longer attached")]
    Detached(Identity),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Change notifications for whoever renders local state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Added(StoredMessage),
    Removed(MessageId),
    /// A remote entry changed. Local state is left as is.
    Changed(StoredMessage),
    Cleared,
}

struct Attachment {
    identity: Identity,
    path: FeedPath,
    consumer: JoinHandle<()>,
}

type Messages = Arc<Mutex<IndexMap<MessageId, Message>>>;

/// Message store bound to one feed.
pub struct MessageStore {
    feed: Arc<dyn Feed>,
    messages: Messages,
    attachment: tokio::sync::Mutex<Option<Attachment>>,
    changes: broadcast::Sender<StoreEvent>,
}

impl MessageStore {
    pub fn new(feed: Arc<dyn Feed>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            feed,
            messages: Arc::new(Mutex::new(IndexMap::new())),
            attachment: tokio::sync::Mutex::new(None),
            changes,
        }
    }

    pub fn feed(&self) -> &Arc<dyn Feed> {
        &self.feed
    }

    /// Subscribe to local state changes.
    pub fn changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.changes.subscribe()
    }

    /// Identity the store is attached for, if any.
    pub async fn identity(&self) -> Option<Identity> {
        self.attachment.lock().await.as_ref().map(|a| a.identity.clone())
    }

    pub async fn is_attached(&self) -> bool {
        self.attachment.lock().await.is_some()
    }

    /// Attach to the identity's partition.
    ///
    /// Attaching again for the same identity is a no-op. Attaching for a
    /// different identity detaches the previous one first.
    pub async fn attach(&self, identity: Identity) -> Result<()> {
        let mut attachment = self.attachment.lock().await;

        if let Some(current) = attachment.as_ref() {
            if current.identity == identity {
                tracing::debug!("Store already attached for {}", identity);
                return Ok(());
            }
            tracing::info!("Switching store from {} to {}", current.identity, identity);
        }
        if let Some(previous) = attachment.take() {
            self.release(previous).await;
        }

        let path = FeedPath::messages(&identity);

        if self.feed.once(&path).await?.is_empty() {
            self.insert_local(Message::plain(GREETING));
        }

        let (sink, events) = mpsc::unbounded_channel();
        for kind in [FeedEventKind::Added, FeedEventKind::Removed, FeedEventKind::Changed] {
            self.feed.on(&path, kind, sink.clone()).await?;
        }
        drop(sink);

        let consumer = tokio::spawn(reconcile(
            events,
            Arc::clone(&self.messages),
            self.changes.clone(),
        ));

        tracing::info!("Store attached to {}", path);
        *attachment = Some(Attachment {
            identity,
            path,
            consumer,
        });
        Ok(())
    }

    /// Drop the subscriptions and clear local state.
    pub async fn detach(&self) {
        if let Some(attachment) = self.attachment.lock().await.take() {
            tracing::info!("Store detached from {}", attachment.path);
            self.release(attachment).await;
        }
    }

    async fn release(&self, attachment: Attachment) {
        attachment.consumer.abort();
        // Wait for the consumer to drop its receiver so the feed sees the
        // listeners as closed.
        let _ = attachment.consumer.await;
        self.lock_messages().clear();
        let _ = self.changes.send(StoreEvent::Cleared);
    }

    async fn current_path(&self) -> Result<FeedPath> {
        self.attachment
            .lock()
            .await
            .as_ref()
            .map(|a| a.path.clone())
            .ok_or(StoreError::NoIdentity)
    }

    /// Push a message to the feed. It shows up locally once the feed
    /// confirms it through the `Added` listener.
    pub async fn publish(&self, message: Message) -> Result<MessageId> {
        let path = self.current_path().await?;
        let id = self.feed.push(&path, message).await?;
        tracing::debug!("Published {} to {}", id, path);
        Ok(id)
    }

    /// Publish on behalf of `identity`, refusing when the store has since
    /// been detached or switched to another identity.
    pub async fn publish_as(&self, identity: &Identity, message: Message) -> Result<MessageId> {
        let attachment = self.attachment.lock().await;
        let path = match attachment.as_ref() {
            Some(current) if current.identity == *identity => current.path.clone(),
            _ => return Err(StoreError::Detached(identity.clone())),
        };

        // The attachment lock is held so the identity cannot change mid-push.
        let id = self.feed.push(&path, message).await?;
        tracing::debug!("Published {} to {}", id, path);
        Ok(id)
    }

    pub async fn remove(&self, id: &MessageId) -> Result<()> {
        let path = self.current_path().await?;
        self.feed.remove(&path, id).await?;
        Ok(())
    }

    pub async fn update(&self, id: &MessageId, patch: &MessagePatch) -> Result<()> {
        let path = self.current_path().await?;
        self.feed.update(&path, id, patch).await?;
        Ok(())
    }

    /// Inject a plain alert into local state only.
    pub fn push_alert(&self, text: impl Into<String>) -> MessageId {
        let text = text.into();
        tracing::debug!("Alert: {}", text);
        self.insert_local(Message::plain(text))
    }

    /// Inject an alert only while `identity` is still attached.
    pub async fn push_alert_as(&self, identity: &Identity, text: impl Into<String>) -> Option<MessageId> {
        let attachment = self.attachment.lock().await;
        match attachment.as_ref() {
            Some(current) if current.identity == *identity => Some(self.push_alert(text)),
            _ => {
                tracing::debug!("Dropping alert for detached identity {}", identity);
                None
            }
        }
    }

    fn insert_local(&self, message: Message) -> MessageId {
        let id = MessageId::local();
        self.lock_messages().insert(id.clone(), message.clone());
        let _ = self
            .changes
            .send(StoreEvent::Added(StoredMessage::new(id.clone(), message)));
        id
    }

    /// Snapshot of local state in display order.
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.lock_messages()
            .iter()
            .map(|(id, message)| StoredMessage::new(id.clone(), message.clone()))
            .collect()
    }

    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.lock_messages().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_messages().is_empty()
    }

    fn lock_messages(&self) -> MutexGuard<'_, IndexMap<MessageId, Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Apply feed events to local state in feed order.
async fn reconcile(
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
    messages: Messages,
    changes: broadcast::Sender<StoreEvent>,
) {
    while let Some(event) = events.recv().await {
        let change = match event {
            FeedEvent::Added { id, message } => {
                messages
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id.clone(), message.clone());
                StoreEvent::Added(StoredMessage::new(id, message))
            }
            FeedEvent::Removed { id, .. } => {
                let removed = messages
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .shift_remove(&id);
                if removed.is_none() {
                    tracing::debug!("Removed event for unknown message {}", id);
                    continue;
                }
                StoreEvent::Removed(id)
            }
            FeedEvent::Changed { id, message } => StoreEvent::Changed(StoredMessage::new(id, message)),
        };
        let _ = changes.send(change);
    }
    tracing::debug!("Feed event stream closed");
}
