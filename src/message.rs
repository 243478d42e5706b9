//! Chat message model.
//!
//! Messages are immutable once created. Their identity is the key the feed
//! assigns on push; locally injected alerts get a `local-` key instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Key of a message inside a feed partition.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh key for a message that never reaches the feed.
    pub fn local() -> Self {
        Self(format!("local-{}", ulid::Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque user handle; only used as the feed partition key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity. Empty handles and handles that would escape a
    /// feed path segment are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::Identity("identity must not be empty".to_string()));
        }
        if trimmed.contains('/') || trimmed.contains('\\') || trimmed == "." || trimmed == ".." {
            return Err(Error::Identity(format!("invalid identity: {}", trimmed)));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message kind.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Plain,
    CommandResult,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Plain => write!(f, "plain"),
            MessageKind::CommandResult => write!(f, "command-result"),
        }
    }
}

/// Reminder delay unit.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Sec,
    Min,
}

impl TimeUnit {
    /// Milliseconds in one unit.
    pub fn millis(self) -> i64 {
        match self {
            TimeUnit::Sec => 1_000,
            TimeUnit::Min => 60_000,
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sec" => Ok(TimeUnit::Sec),
            "min" => Ok(TimeUnit::Min),
            _ => Err(format!("Unknown time unit: {}", s)),
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeUnit::Sec => write!(f, "sec"),
            TimeUnit::Min => write!(f, "min"),
        }
    }
}

/// Payload of a `/remind` result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReminderPayload {
    pub subject: String,
    pub period: u32,
    pub unit: TimeUnit,
    pub created_at: DateTime<Utc>,
}

impl ReminderPayload {
    /// Delay still left at `now`, expressed in `unit`.
    ///
    /// Elapsed time is rounded to whole seconds first; for minute reminders
    /// the remainder is rounded to the nearest minute. A result `<= 0` means
    /// the reminder is already due.
    pub fn remaining(&self, now: DateTime<Utc>) -> i64 {
        let elapsed_ms = (now - self.created_at).num_milliseconds();
        let elapsed_secs = (elapsed_ms as f64 / 1000.0).round();
        let period = f64::from(self.period);

        match self.unit {
            TimeUnit::Sec => (period - elapsed_secs) as i64,
            TimeUnit::Min => (period - elapsed_secs / 60.0).round() as i64,
        }
    }
}

/// Handler-specific structured data of a command result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    YesNo { answer: String, image: String },
    Reminder(ReminderPayload),
    ShortUrl { id: String, long_url: String },
}

/// Kind-specific part of a message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Plain,
    CommandResult { command: String, payload: Payload },
}

/// A unit of chat history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: Content,
}

impl Message {
    /// A plain message stamped with the current time.
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            created_at: Utc::now(),
            content: Content::Plain,
        }
    }

    /// A command result stamped with the current time.
    pub fn command_result(command: &str, body: impl Into<String>, payload: Payload) -> Self {
        Self {
            body: body.into(),
            created_at: Utc::now(),
            content: Content::CommandResult {
                command: command.to_string(),
                payload,
            },
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.content {
            Content::Plain => MessageKind::Plain,
            Content::CommandResult { .. } => MessageKind::CommandResult,
        }
    }

    /// Command token for command results.
    pub fn command(&self) -> Option<&str> {
        match &self.content {
            Content::CommandResult { command, .. } => Some(command),
            Content::Plain => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.content {
            Content::CommandResult { payload, .. } => Some(payload),
            Content::Plain => None,
        }
    }
}

/// Partial update applied to a stored message.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl MessagePatch {
    pub fn apply(&self, message: &mut Message) {
        if let Some(body) = &self.body {
            message.body = body.clone();
        }
    }
}

/// A message together with its key in local state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub message: Message,
}

impl StoredMessage {
    pub fn new(id: MessageId, message: Message) -> Self {
        Self { id, message }
    }
}

/// Kind-specific detail the view renders below the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewDetail {
    None,
    Image(String),
    Reminder {
        subject: String,
        created_at: DateTime<Utc>,
    },
    ShortUrl(String),
}

/// Fields the view needs to render one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewModel {
    pub text: String,
    pub kind: MessageKind,
    pub command: Option<String>,
    pub detail: ViewDetail,
}

impl ViewModel {
    /// Side-effect free view of any message.
    pub fn from_message(message: &Message) -> Self {
        let detail = match message.payload() {
            Some(Payload::YesNo { image, .. }) => ViewDetail::Image(image.clone()),
            Some(Payload::Reminder(reminder)) => ViewDetail::Reminder {
                subject: reminder.subject.clone(),
                created_at: reminder.created_at,
            },
            Some(Payload::ShortUrl { id, .. }) => ViewDetail::ShortUrl(id.clone()),
            None => ViewDetail::None,
        };

        Self {
            text: capitalize(&message.body),
            kind: message.kind(),
            command: message.command().map(str::to_string),
            detail,
        }
    }

    /// Whether the bot authored this message.
    pub fn is_bot_message(&self) -> bool {
        self.kind == MessageKind::CommandResult
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
