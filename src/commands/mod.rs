//! Bot commands.
//!
//! - Command registry and definitions
//! - Handlers for `/yesno`, `/remind` and `/shorten`
//! - Input hints from the command catalog

use std::sync::Arc;

pub mod handler;
pub mod hints;
pub mod registry;
pub mod remind;
pub mod shorten;
pub mod yesno;

pub use handler::{CommandError, CommandHandler, ServiceError};
pub use hints::CommandHints;
pub use registry::{CommandDefinition, CommandRegistry, RegistryError, COMMAND_PREFIX};
pub use remind::RearmPolicy;

use crate::config::Settings;
use crate::notify::NotificationScheduler;

/// Registry with the built-in commands wired to the configured back-ends.
pub fn builtin_registry(settings: &Settings, scheduler: Arc<NotificationScheduler>) -> CommandRegistry {
    let services = &settings.services;

    let oracle = Arc::new(yesno::HttpYesNoOracle::with_endpoint(
        services.yesno.endpoint.clone(),
    ));
    let shortener = Arc::new(shorten::HttpUrlShortener::with_endpoint(
        services.shortener.endpoint.clone(),
        services.shortener.api_key.clone(),
    ));
    let remind = remind::RemindHandler::new(scheduler)
        .with_title(settings.reminders.title.clone())
        .with_policy(settings.reminders.rearm);

    let mut registry = CommandRegistry::new();
    registry.register(CommandDefinition::new(
        yesno::TOKEN,
        yesno::DESCRIPTION,
        Arc::new(yesno::YesNoHandler::new(oracle)),
    ));
    registry.register(CommandDefinition::new(
        remind::TOKEN,
        remind::DESCRIPTION,
        Arc::new(remind),
    ));
    registry.register(CommandDefinition::new(
        shorten::TOKEN,
        shorten::DESCRIPTION,
        Arc::new(shorten::ShortenHandler::new(shortener)),
    ));

    tracing::debug!("Registered {} built-in commands", registry.len());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let scheduler = Arc::new(NotificationScheduler::new(None));
        let registry = builtin_registry(&Settings::default(), scheduler);

        let tokens: Vec<_> = registry.iter().map(|c| c.token()).collect();
        assert_eq!(tokens, vec!["/yesno", "/remind", "/shorten"]);
        assert!(registry.find("/remind").unwrap().description().contains("after"));
    }
}
