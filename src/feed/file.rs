//! Feed persisted as JSON files.
//!
//! Layout under the root directory:
//! - chats/{identity}/messages/{id}.json : one message per file
//! - commands.json                       : command catalog
//!
//! Partitions are loaded into an in-process [`MemoryFeed`] on first access;
//! every write goes to disk before listeners are notified.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{CommandHint, EventSink, Feed, FeedError, FeedEventKind, FeedPath, MemoryFeed, Result};
use crate::message::{Message, MessageId, MessagePatch};

/// Catalog file name.
pub const CATALOG_FILE: &str = "commands.json";

pub struct FileFeed {
    root: PathBuf,
    inner: MemoryFeed,
}

impl FileFeed {
    /// Open a feed rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let inner = MemoryFeed::new();
        let catalog_path = root.join(CATALOG_FILE);
        if catalog_path.exists() {
            let content = fs::read_to_string(&catalog_path)?;
            let catalog: BTreeMap<String, CommandHint> = serde_json::from_str(&content)?;
            tracing::debug!("Loaded {} catalog entries from {}", catalog.len(), catalog_path.display());
            inner.set_catalog(catalog);
        }

        Ok(Self { root, inner })
    }

    /// Write the command catalog.
    pub fn save_catalog(&self, catalog: &BTreeMap<String, CommandHint>) -> Result<()> {
        let content = serde_json::to_string_pretty(catalog)?;
        fs::write(self.root.join(CATALOG_FILE), content)?;
        self.inner.set_catalog(catalog.clone());
        Ok(())
    }

    fn partition_dir(&self, path: &FeedPath) -> PathBuf {
        self.root.join(path.as_str())
    }

    fn entry_path(&self, path: &FeedPath, id: &MessageId) -> PathBuf {
        self.partition_dir(path).join(format!("{}.json", id))
    }

    /// Load a partition from disk the first time it is touched.
    fn ensure_loaded(&self, path: &FeedPath) -> Result<()> {
        if self.inner.has_partition(path) {
            return Ok(());
        }

        let dir = self.partition_dir(path);
        let mut entries = Vec::new();

        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_path = entry.path();

                if file_path.extension().map_or(false, |ext| ext == "json") {
                    let Some(stem) = file_path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    let content = fs::read_to_string(&file_path)?;
                    match serde_json::from_str::<Message>(&content) {
                        Ok(message) => entries.push((MessageId::new(stem), message)),
                        Err(e) => {
                            tracing::warn!("Skipping unreadable message {}: {}", file_path.display(), e);
                        }
                    }
                }
            }
        }

        // Keys are monotonic, so key order is append order.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let count = entries.len();
        if self.inner.seed(path, entries) {
            tracing::debug!("Loaded {} messages for {}", count, path);
        }
        Ok(())
    }

    fn write_entry(&self, path: &FeedPath, id: &MessageId, message: &Message) -> Result<()> {
        let dir = self.partition_dir(path);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let content = serde_json::to_string_pretty(message)?;
        fs::write(self.entry_path(path, id), content)?;
        Ok(())
    }
}

#[async_trait]
impl Feed for FileFeed {
    async fn once(&self, path: &FeedPath) -> Result<Vec<(MessageId, Message)>> {
        self.ensure_loaded(path)?;
        self.inner.once(path).await
    }

    async fn on(&self, path: &FeedPath, kind: FeedEventKind, sink: EventSink) -> Result<()> {
        self.ensure_loaded(path)?;
        self.inner.on(path, kind, sink).await
    }

    async fn push(&self, path: &FeedPath, message: Message) -> Result<MessageId> {
        self.ensure_loaded(path)?;
        self.inner
            .push_with(path, message, |id, message| self.write_entry(path, id, message))
    }

    async fn remove(&self, path: &FeedPath, id: &MessageId) -> Result<()> {
        self.ensure_loaded(path)?;
        if self.inner.get(path, id).is_none() {
            return Err(FeedError::NotFound(path.child(id)));
        }

        let file_path = self.entry_path(path, id);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
        }
        self.inner.remove(path, id).await
    }

    async fn update(&self, path: &FeedPath, id: &MessageId, patch: &MessagePatch) -> Result<()> {
        self.ensure_loaded(path)?;
        let mut message = self
            .inner
            .get(path, id)
            .ok_or_else(|| FeedError::NotFound(path.child(id)))?;

        patch.apply(&mut message);
        self.write_entry(path, id, &message)?;
        self.inner.update(path, id, patch).await
    }

    async fn command_catalog(&self) -> Result<BTreeMap<String, CommandHint>> {
        self.inner.command_catalog().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Identity;

    fn path() -> FeedPath {
        FeedPath::messages(&Identity::new("alice").unwrap())
    }

    #[tokio::test]
    async fn test_messages_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();

        let feed = FileFeed::open(temp_dir.path()).unwrap();
        feed.push(&path(), Message::plain("first")).await.unwrap();
        let second = feed.push(&path(), Message::plain("second")).await.unwrap();
        feed.push(&path(), Message::plain("third")).await.unwrap();
        feed.remove(&path(), &second).await.unwrap();
        drop(feed);

        let reopened = FileFeed::open(temp_dir.path()).unwrap();
        let snapshot = reopened.once(&path()).await.unwrap();
        let bodies: Vec<_> = snapshot.iter().map(|(_, m)| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "third"]);
        assert!(temp_dir.path().join("chats/alice/messages").exists());
    }

    #[tokio::test]
    async fn test_update_is_persisted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = FileFeed::open(temp_dir.path()).unwrap();
        let id = feed.push(&path(), Message::plain("draft")).await.unwrap();

        let patch = MessagePatch { body: Some("final".to_string()) };
        feed.update(&path(), &id, &patch).await.unwrap();

        let reopened = FileFeed::open(temp_dir.path()).unwrap();
        let snapshot = reopened.once(&path()).await.unwrap();
        assert_eq!(snapshot[0].1.body, "final");
    }

    #[tokio::test]
    async fn test_catalog_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = FileFeed::open(temp_dir.path()).unwrap();
        assert!(feed.command_catalog().await.unwrap().is_empty());

        let mut catalog = BTreeMap::new();
        catalog.insert(
            "/remind".to_string(),
            CommandHint { cmd: "/remind".to_string(), desc: "Set a reminder".to_string() },
        );
        feed.save_catalog(&catalog).unwrap();

        let reopened = FileFeed::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.command_catalog().await.unwrap(), catalog);
    }

    #[tokio::test]
    async fn test_remove_missing_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = FileFeed::open(temp_dir.path()).unwrap();
        let err = feed.remove(&path(), &MessageId::new("missing")).await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_pushes_keep_order_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = std::sync::Arc::new(FileFeed::open(temp_dir.path()).unwrap());

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let feed = std::sync::Arc::clone(&feed);
                tokio::spawn(async move {
                    feed.push(&path(), Message::plain(format!("m{}", i))).await.unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let live: Vec<_> = feed.once(&path()).await.unwrap().into_iter().map(|(id, _)| id).collect();
        let mut sorted = live.clone();
        sorted.sort();
        assert_eq!(live, sorted);

        let reopened = FileFeed::open(temp_dir.path()).unwrap();
        let reloaded: Vec<_> = reopened.once(&path()).await.unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(live.len(), 200);
        assert_eq!(live, reloaded);
    }
}
