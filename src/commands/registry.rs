//! Command registry.
//!
//! Definitions are registered once at boot and never removed. Invalid
//! definitions are logged and dropped; the bot keeps working with the rest.

use std::sync::Arc;
use thiserror::Error;

use super::handler::CommandHandler;

/// First character of every command token.
pub const COMMAND_PREFIX: char = '/';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command token '{0}' must start with '/'")]
    MissingPrefix(String),

    #[error("command token '{0}' must be lowercase letters after the prefix")]
    InvalidToken(String),

    #[error("command '{0}' has no description")]
    MissingDescription(String),

    #[error("command '{0}' is already registered")]
    Duplicate(String),
}

/// A registered command: token, description and the handler behind it.
#[derive(Clone)]
pub struct CommandDefinition {
    token: String,
    description: String,
    handler: Arc<dyn CommandHandler>,
}

impl CommandDefinition {
    pub fn new(
        token: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            token: token.into(),
            description: description.into(),
            handler,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    /// Structural check run at registration.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let Some(name) = self.token.strip_prefix(COMMAND_PREFIX) else {
            return Err(RegistryError::MissingPrefix(self.token.clone()));
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(RegistryError::InvalidToken(self.token.clone()));
        }
        if self.description.trim().is_empty() {
            return Err(RegistryError::MissingDescription(self.token.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("token", &self.token)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Append-only set of commands, kept in registration order.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDefinition>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Returns `false` (and logs why) when the
    /// definition is rejected; nothing is registered in that case.
    pub fn register(&mut self, definition: CommandDefinition) -> bool {
        let checked = definition.validate().and_then(|()| {
            if self.find(definition.token()).is_some() {
                Err(RegistryError::Duplicate(definition.token.clone()))
            } else {
                Ok(())
            }
        });

        match checked {
            Ok(()) => {
                tracing::debug!("Registered command {}", definition.token());
                self.commands.push(definition);
                true
            }
            Err(e) => {
                tracing::warn!("Cannot add command: {}", e);
                false
            }
        }
    }

    /// Exact token lookup.
    pub fn find(&self, token: &str) -> Option<&CommandDefinition> {
        self.commands.iter().find(|c| c.token == token)
    }

    /// Commands whose token starts with `partial`, in registration order.
    /// Empty input matches nothing.
    pub fn prefix_search(&self, partial: &str) -> Vec<&CommandDefinition> {
        if partial.is_empty() {
            return Vec::new();
        }
        self.commands
            .iter()
            .filter(|c| c.token.starts_with(partial))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::handler::CommandError;
    use crate::message::Message;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn execute(&self, args: &str) -> Result<Message, CommandError> {
            Ok(Message::plain(args))
        }
    }

    fn def(token: &str, description: &str) -> CommandDefinition {
        CommandDefinition::new(token, description, Arc::new(Echo))
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        assert!(registry.register(def("/remind", "Set a reminder")));
        assert!(registry.register(def("/yesno", "Ask a question")));
        assert!(registry.register(def("/roll", "Roll a die")));
        registry
    }

    #[test]
    fn test_validation_rejects_bad_definitions() {
        assert_eq!(
            def("remind", "x").validate(),
            Err(RegistryError::MissingPrefix("remind".to_string()))
        );
        assert_eq!(def("/", "x").validate(), Err(RegistryError::InvalidToken("/".to_string())));
        assert_eq!(
            def("/Remind", "x").validate(),
            Err(RegistryError::InvalidToken("/Remind".to_string()))
        );
        assert_eq!(
            def("/remind", "  ").validate(),
            Err(RegistryError::MissingDescription("/remind".to_string()))
        );
        assert!(def("/remind", "x").validate().is_ok());
    }

    #[test]
    fn test_register_drops_invalid_and_duplicates() {
        let mut registry = registry();

        assert!(!registry.register(def("oops", "no prefix")));
        assert!(!registry.register(def("/remind", "again")));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find("/remind").unwrap().description(), "Set a reminder");
    }

    #[test]
    fn test_find_is_exact() {
        let registry = registry();

        assert!(registry.find("/yesno").is_some());
        assert!(registry.find("/yes").is_none());
        assert!(registry.find("/YESNO").is_none());
    }

    #[test]
    fn test_prefix_search_keeps_registration_order() {
        let registry = registry();

        let tokens: Vec<_> = registry.prefix_search("/r").iter().map(|c| c.token()).collect();
        assert_eq!(tokens, vec!["/remind", "/roll"]);

        assert_eq!(registry.prefix_search("/").len(), 3);
        assert!(registry.prefix_search("").is_empty());
        assert!(registry.prefix_search("/x").is_empty());
    }
}
