//! Live input hints.

use std::collections::BTreeMap;

use super::registry::CommandRegistry;
use crate::feed::CommandHint;

/// Command hints shown while the user types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandHints {
    entries: Vec<CommandHint>,
}

impl CommandHints {
    /// Hints from the feed's `commands` catalog.
    pub fn from_catalog(catalog: BTreeMap<String, CommandHint>) -> Self {
        Self {
            entries: catalog.into_values().collect(),
        }
    }

    /// Hints derived from the registered commands.
    pub fn from_registry(registry: &CommandRegistry) -> Self {
        Self {
            entries: registry
                .iter()
                .map(|c| CommandHint {
                    cmd: c.token().to_string(),
                    desc: c.description().to_string(),
                })
                .collect(),
        }
    }

    /// Catalog form, keyed by token.
    pub fn to_catalog(&self) -> BTreeMap<String, CommandHint> {
        self.entries
            .iter()
            .map(|h| (h.cmd.clone(), h.clone()))
            .collect()
    }

    /// Hints whose command starts with `input`. Empty input shows nothing.
    pub fn matching(&self, input: &str) -> Vec<&CommandHint> {
        if input.is_empty() {
            return Vec::new();
        }
        self.entries.iter().filter(|h| h.cmd.starts_with(input)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
