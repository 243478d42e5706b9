//! Slackbot library root.

pub mod bot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod logging;
pub mod message;
pub mod notify;
pub mod store;

pub use bot::Bot;
pub use cli::Commands;
pub use commands::{CommandDefinition, CommandHandler, CommandRegistry};
pub use config::{load_settings, Settings};
pub use dispatch::{CommandDispatcher, Dispatch};
pub use error::{Error, Result};
pub use feed::{Feed, FileFeed, MemoryFeed};
pub use message::{Identity, Message, MessageId, ViewModel};
pub use store::{MessageStore, StoreEvent};
