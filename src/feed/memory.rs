//! In-process feed.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CommandHint, EventSink, Feed, FeedError, FeedEvent, FeedEventKind, FeedPath, Result};
use crate::message::{Message, MessageId, MessagePatch};

struct Listener {
    kind: FeedEventKind,
    sink: EventSink,
}

#[derive(Default)]
struct Partition {
    entries: IndexMap<MessageId, Message>,
    listeners: Vec<Listener>,
}

impl Partition {
    /// Deliver an event to matching listeners, dropping the ones whose
    /// consumer has gone away.
    fn emit(&mut self, event: FeedEvent) {
        let kind = event.kind();
        self.listeners.retain(|listener| {
            if listener.kind != kind {
                return !listener.sink.is_closed();
            }
            listener.sink.send(event.clone()).is_ok()
        });
    }
}

struct FeedState {
    partitions: HashMap<FeedPath, Partition>,
    catalog: BTreeMap<String, CommandHint>,
    keys: ulid::Generator,
}

/// Ordered keyed store held in memory. Keys are monotonic ULIDs, so key
/// order equals append order.
pub struct MemoryFeed {
    state: Mutex<FeedState>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FeedState {
                partitions: HashMap::new(),
                catalog: BTreeMap::new(),
                keys: ulid::Generator::new(),
            }),
        }
    }

    /// Seed the `commands` catalog.
    pub fn with_catalog(self, catalog: BTreeMap<String, CommandHint>) -> Self {
        self.state().catalog = catalog;
        self
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live listener registrations on a partition.
    pub fn listener_count(&self, path: &FeedPath) -> usize {
        self.state()
            .partitions
            .get(path)
            .map_or(0, |p| p.listeners.iter().filter(|l| !l.sink.is_closed()).count())
    }

    /// Whether a partition has been touched or seeded.
    pub fn has_partition(&self, path: &FeedPath) -> bool {
        self.state().partitions.contains_key(path)
    }

    /// Load existing entries without emitting events. A partition that is
    /// already present is left as is; returns whether the entries were used.
    pub fn seed(&self, path: &FeedPath, entries: Vec<(MessageId, Message)>) -> bool {
        let mut state = self.state();
        if state.partitions.contains_key(path) {
            return false;
        }
        let partition = state.partitions.entry(path.clone()).or_default();
        partition.entries.extend(entries);
        true
    }

    /// Replace the catalog.
    pub fn set_catalog(&self, catalog: BTreeMap<String, CommandHint>) {
        self.state().catalog = catalog;
    }

    pub fn get(&self, path: &FeedPath, id: &MessageId) -> Option<Message> {
        self.state()
            .partitions
            .get(path)
            .and_then(|p| p.entries.get(id).cloned())
    }

    /// Append under a fresh key, running `persist` first.
    ///
    /// Key generation, `persist` and the insert happen under one lock, so
    /// concurrent pushes keep key order equal to append order. Nothing is
    /// inserted or emitted when `persist` fails.
    pub fn push_with<F>(&self, path: &FeedPath, message: Message, persist: F) -> Result<MessageId>
    where
        F: FnOnce(&MessageId, &Message) -> Result<()>,
    {
        let mut state = self.state();
        let key = state
            .keys
            .generate()
            .map_err(|e| FeedError::KeyGeneration(e.to_string()))?;
        let id = MessageId::new(key.to_string());

        persist(&id, &message)?;

        let partition = state.partitions.entry(path.clone()).or_default();
        partition.entries.insert(id.clone(), message.clone());
        partition.emit(FeedEvent::Added {
            id: id.clone(),
            message,
        });
        tracing::debug!("Feed {}: child added", path);
        Ok(id)
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Feed for MemoryFeed {
    async fn once(&self, path: &FeedPath) -> Result<Vec<(MessageId, Message)>> {
        Ok(self
            .state()
            .partitions
            .get(path)
            .map(|p| {
                p.entries
                    .iter()
                    .map(|(id, message)| (id.clone(), message.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn on(&self, path: &FeedPath, kind: FeedEventKind, sink: EventSink) -> Result<()> {
        let mut state = self.state();
        let partition = state.partitions.entry(path.clone()).or_default();

        if kind == FeedEventKind::Added {
            for (id, message) in &partition.entries {
                let event = FeedEvent::Added {
                    id: id.clone(),
                    message: message.clone(),
                };
                if sink.send(event).is_err() {
                    return Ok(());
                }
            }
        }

        partition.listeners.push(Listener { kind, sink });
        tracing::debug!("Feed {}: listener attached for {:?}", path, kind);
        Ok(())
    }

    async fn push(&self, path: &FeedPath, message: Message) -> Result<MessageId> {
        self.push_with(path, message, |_, _| Ok(()))
    }

    async fn remove(&self, path: &FeedPath, id: &MessageId) -> Result<()> {
        let mut state = self.state();
        let partition = state
            .partitions
            .get_mut(path)
            .ok_or_else(|| FeedError::NotFound(path.child(id)))?;
        let message = partition
            .entries
            .shift_remove(id)
            .ok_or_else(|| FeedError::NotFound(path.child(id)))?;

        partition.emit(FeedEvent::Removed {
            id: id.clone(),
            message,
        });
        tracing::debug!("Feed {}: child removed", path);
        Ok(())
    }

    async fn update(&self, path: &FeedPath, id: &MessageId, patch: &MessagePatch) -> Result<()> {
        let mut state = self.state();
        let partition = state
            .partitions
            .get_mut(path)
            .ok_or_else(|| FeedError::NotFound(path.child(id)))?;
        let entry = partition
            .entries
            .get_mut(id)
            .ok_or_else(|| FeedError::NotFound(path.child(id)))?;

        patch.apply(entry);
        let message = entry.clone();
        partition.emit(FeedEvent::Changed {
            id: id.clone(),
            message,
        });
        tracing::debug!("Feed {}: child changed", path);
        Ok(())
    }

    async fn command_catalog(&self) -> Result<BTreeMap<String, CommandHint>> {
        Ok(self.state().catalog.clone())
    }
}
