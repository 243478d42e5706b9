//! CLI commands for Slackbot using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::bot::Bot;
use crate::commands::{builtin_registry, CommandHints};
use crate::config::{get_settings_path, load_settings_or_default, save_settings_to, Settings};
use crate::dispatch::Dispatch;
use crate::feed::{Feed, FeedPath, FileFeed};
use crate::message::{Identity, MessageId, StoredMessage, ViewDetail, ViewModel};
use crate::notify::NotificationScheduler;
use crate::store::{StoreEvent, GREETING};

/// How long `send` waits for the feed to echo results back.
const ECHO_WINDOW: Duration = Duration::from_millis(250);

/// Slackbot - chat bot with slash commands over a synced message feed.
#[derive(Parser)]
#[command(name = "slackbot")]
#[command(version)]
#[command(about = "Slackbot - your friendly slash-command bot", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive chat session
    Chat {
        /// Identity to chat as
        #[arg(long, env = "SLACKBOT_USER")]
        user: String,
    },

    /// Submit one message or command
    Send {
        #[arg(long, env = "SLACKBOT_USER")]
        user: String,

        /// Text to submit, e.g. "/yesno is it friday"
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Print the stored history
    History {
        #[arg(long, env = "SLACKBOT_USER")]
        user: String,
    },

    /// List commands, optionally matching a partial token
    Commands {
        partial: Option<String>,
    },

    /// Remove a message from the feed
    Remove {
        #[arg(long, env = "SLACKBOT_USER")]
        user: String,

        /// Message id as shown by `history`
        id: String,
    },

    /// Write default settings and the command catalog
    Setup {
        /// Overwrite existing settings
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Chat { user } => cmd_chat(user).await,
            Command::Send { user, text } => cmd_send(user, &text.join(" ")).await,
            Command::History { user } => cmd_history(user).await,
            Command::Commands { partial } => cmd_commands(partial.as_deref()).await,
            Command::Remove { user, id } => cmd_remove(user, id).await,
            Command::Setup { force } => cmd_setup(*force).await,
        }
    }
}

fn open_bot(settings: &Settings) -> Result<Bot> {
    let feed = FileFeed::open(settings.data_dir()?)?;
    Ok(Bot::from_settings(settings, Arc::new(feed)))
}

/// One-line rendering of a message view.
fn render(id: &MessageId, view: &ViewModel) -> String {
    let author = if view.is_bot_message() { "bot" } else if id.is_local() { "!" } else { "you" };
    let mut line = format!("[{}] {:>3}: {}", id, author, view.text);

    match &view.detail {
        ViewDetail::None => {}
        ViewDetail::Image(url) => line.push_str(&format!("\n        image: {}", url)),
        ViewDetail::Reminder { subject, created_at } => line.push_str(&format!(
            "\n        reminder: {} (set {})",
            subject,
            created_at.format("%Y-%m-%d %H:%M:%S")
        )),
        ViewDetail::ShortUrl(short) => line.push_str(&format!("\n        short url: {}", short)),
    }
    line
}

fn print_stored(bot: &Bot, stored: &StoredMessage) {
    println!("{}", render(&stored.id, &bot.present(stored)));
}

async fn cmd_chat(user: &str) -> Result<()> {
    let settings = load_settings_or_default();
    let bot = open_bot(&settings)?;
    let identity = Identity::new(user)?;

    let mut changes = bot.store().changes();
    bot.sign_in(identity.clone()).await?;

    println!("Chatting as {}. Type :hints <partial>, :rm <id> or :quit.", identity);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = changes.recv() => match event {
                Ok(StoreEvent::Added(stored)) => print_stored(&bot, &stored),
                Ok(StoreEvent::Removed(id)) => println!("[{}] removed", id),
                Ok(StoreEvent::Changed(stored)) => tracing::debug!("Message {} changed remotely", stored.id),
                Ok(StoreEvent::Cleared) => {}
                Err(RecvError::Lagged(n)) => tracing::warn!("Skipped {} store events", n),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_chat_line(&bot, &line).await? {
                    break;
                }
            }
        }
    }

    bot.sign_out().await;
    Ok(())
}

/// Returns false when the session should end.
async fn handle_chat_line(bot: &Bot, line: &str) -> Result<bool> {
    if line.trim() == ":quit" {
        return Ok(false);
    }

    if let Some(partial) = line.strip_prefix(":hints") {
        let hints = bot.hints(partial.trim());
        if hints.is_empty() {
            println!("no matching commands");
        }
        for (cmd, desc) in hints {
            println!("  {:<10} {}", cmd, desc);
        }
        return Ok(true);
    }

    if let Some(id) = line.strip_prefix(":rm ") {
        if let Err(e) = bot.store().remove(&MessageId::new(id.trim())).await {
            println!("could not remove {}: {}", id.trim(), e);
        }
        return Ok(true);
    }

    if !line.is_empty() {
        // Handler tasks finish on their own and report through the store.
        let _ = bot.submit(line).await;
    }
    Ok(true)
}

async fn cmd_send(user: &str, text: &str) -> Result<()> {
    let settings = load_settings_or_default();
    let bot = open_bot(&settings)?;
    let identity = Identity::new(user)?;

    let history: HashSet<MessageId> = bot
        .store()
        .feed()
        .once(&FeedPath::messages(&identity))
        .await?
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    let mut changes = bot.store().changes();
    bot.sign_in(identity).await?;
    match bot.submit(text).await {
        Dispatch::Command { token, task } => {
            tracing::debug!("Waiting for {}", token);
            task.await?;
        }
        Dispatch::Unrecognized { token, .. } => tracing::debug!("{} is not a command", token),
        Dispatch::NoIdentity { token } => tracing::warn!("{} not run, no identity attached", token),
        Dispatch::Plain(_) => {}
    }

    while let Ok(Ok(event)) = tokio::time::timeout(ECHO_WINDOW, changes.recv()).await {
        match event {
            StoreEvent::Added(stored) if !history.contains(&stored.id) && stored.message.body != GREETING => {
                // Rendered without presenting; this process exits before any
                // reminder could fire.
                println!("{}", render(&stored.id, &ViewModel::from_message(&stored.message)));
            }
            _ => {}
        }
    }

    bot.sign_out().await;
    Ok(())
}

async fn cmd_history(user: &str) -> Result<()> {
    let settings = load_settings_or_default();
    let feed = FileFeed::open(settings.data_dir()?)?;
    let identity = Identity::new(user)?;

    let entries = feed.once(&FeedPath::messages(&identity)).await?;
    if entries.is_empty() {
        println!("No messages for {}", identity);
        return Ok(());
    }
    for (id, message) in entries {
        println!("{}", render(&id, &ViewModel::from_message(&message)));
    }
    Ok(())
}

async fn cmd_commands(partial: Option<&str>) -> Result<()> {
    let settings = load_settings_or_default();
    let bot = open_bot(&settings)?;

    let commands: Vec<_> = match partial {
        Some(partial) => bot.registry().prefix_search(partial),
        None => bot.registry().iter().collect(),
    };

    if commands.is_empty() {
        println!("No matching commands");
    }
    for command in commands {
        println!("{:<10} {}", command.token(), command.description());
    }
    Ok(())
}

async fn cmd_remove(user: &str, id: &str) -> Result<()> {
    let settings = load_settings_or_default();
    let bot = open_bot(&settings)?;
    bot.sign_in(Identity::new(user)?).await?;

    bot.store().remove(&MessageId::new(id)).await?;
    println!("Removed {}", id);

    bot.sign_out().await;
    Ok(())
}

async fn cmd_setup(force: bool) -> Result<()> {
    let path = get_settings_path()?;
    let settings = if path.exists() && !force {
        println!("Keeping existing settings at {}", path.display());
        load_settings_or_default()
    } else {
        let settings = Settings::default();
        save_settings_to(&settings, &path)?;
        println!("✓ Wrote default settings to {}", path.display());
        settings
    };

    let data_dir = settings.data_dir()?;
    let feed = FileFeed::open(&data_dir)?;
    let registry = builtin_registry(&settings, Arc::new(NotificationScheduler::new(None)));
    feed.save_catalog(&CommandHints::from_registry(&registry).to_catalog())?;
    println!("✓ Wrote command catalog to {}", data_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_parse_send() {
        let args = Commands::try_parse_from(["slackbot", "send", "--user", "alice", "/yesno", "is", "it"]).unwrap();
        match args.command {
            Command::Send { user, text } => {
                assert_eq!(user, "alice");
                assert_eq!(text.join(" "), "/yesno is it");
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_commands_partial() {
        let args = Commands::try_parse_from(["slackbot", "commands", "/re"]).unwrap();
        assert!(matches!(args.command, Command::Commands { partial: Some(ref p) } if p == "/re"));
    }

    #[test]
    fn test_render_marks_authors() {
        let plain = Message::plain("hello");
        let remote = render(&MessageId::new("01ABC"), &ViewModel::from_message(&plain));
        assert_eq!(remote, "[01ABC] you: Hello");

        let alert = render(&MessageId::new("local-1"), &ViewModel::from_message(&plain));
        assert!(alert.contains("  !: Hello"));
    }
}
