//! Bot context.
//!
//! Owns the command registry, message store, notification scheduler and
//! dispatcher for one session, and is handed to whatever front-end drives it.

use std::sync::{Arc, RwLock};

use crate::commands::{builtin_registry, CommandHints, CommandRegistry};
use crate::config::Settings;
use crate::dispatch::{CommandDispatcher, Dispatch};
use crate::feed::Feed;
use crate::message::{Identity, StoredMessage, ViewModel};
use crate::notify::{ConsoleNotifier, NotificationScheduler, Notifier};
use crate::store::{MessageStore, Result};

pub struct Bot {
    registry: Arc<CommandRegistry>,
    store: Arc<MessageStore>,
    scheduler: Arc<NotificationScheduler>,
    dispatcher: CommandDispatcher,
    hints: RwLock<CommandHints>,
}

impl Bot {
    pub fn new(
        registry: CommandRegistry,
        store: MessageStore,
        scheduler: Arc<NotificationScheduler>,
    ) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(store);
        let dispatcher = CommandDispatcher::new(Arc::clone(&registry), Arc::clone(&store));

        Self {
            registry,
            store,
            scheduler,
            dispatcher,
            hints: RwLock::new(CommandHints::default()),
        }
    }

    /// Wire the built-in commands and the console notifier from settings.
    pub fn from_settings(settings: &Settings, feed: Arc<dyn Feed>) -> Self {
        let notifier: Option<Arc<dyn Notifier>> = if settings.notifications.enabled {
            Some(Arc::new(ConsoleNotifier::new()))
        } else {
            tracing::info!("Notifications disabled, reminders will not fire");
            None
        };

        let mut scheduler = NotificationScheduler::new(notifier);
        if let Some(icon) = &settings.notifications.icon {
            scheduler = scheduler.with_icon(icon.clone());
        }
        let scheduler = Arc::new(scheduler);

        let registry = builtin_registry(settings, Arc::clone(&scheduler));
        Self::new(registry, MessageStore::new(feed), scheduler)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<NotificationScheduler> {
        &self.scheduler
    }

    /// Attach the store for `identity` and load the command catalog.
    pub async fn sign_in(&self, identity: Identity) -> Result<()> {
        tracing::info!("Signing in as {}", identity);
        self.store.attach(identity).await?;

        if let Some(permission) = self.scheduler.request_permission().await {
            tracing::debug!("Reminders notify with permission {:?}", permission);
        }

        let catalog = self.store.feed().command_catalog().await?;
        tracing::debug!("Loaded {} catalog hints", catalog.len());
        *self.hints.write().unwrap_or_else(|e| e.into_inner()) = CommandHints::from_catalog(catalog);
        Ok(())
    }

    pub async fn sign_out(&self) {
        self.store.detach().await;
        *self.hints.write().unwrap_or_else(|e| e.into_inner()) = CommandHints::default();
        tracing::info!("Signed out");
    }

    /// Submit one line of user input.
    pub async fn submit(&self, input: &str) -> Dispatch {
        self.dispatcher.dispatch(input).await
    }

    /// Build the view of a stored message.
    ///
    /// Command results go through their handler's `present`, which may have
    /// side effects (a reminder arms its notification). Everything else gets
    /// the plain view.
    pub fn present(&self, stored: &StoredMessage) -> ViewModel {
        let handler = stored
            .message
            .command()
            .and_then(|token| self.registry.find(token));

        match handler {
            Some(definition) => definition.handler().present(stored),
            None => ViewModel::from_message(&stored.message),
        }
    }

    /// Hints for partially typed input, as `(cmd, desc)` pairs.
    ///
    /// Uses the feed's catalog when one was loaded at sign-in, the registry
    /// otherwise.
    pub fn hints(&self, partial: &str) -> Vec<(String, String)> {
        let hints = self.hints.read().unwrap_or_else(|e| e.into_inner());
        if !hints.is_empty() {
            return hints
                .matching(partial)
                .into_iter()
                .map(|h| (h.cmd.clone(), h.desc.clone()))
                .collect();
        }

        self.registry
            .prefix_search(partial)
            .into_iter()
            .map(|c| (c.token().to_string(), c.description().to_string()))
            .collect()
    }
}
