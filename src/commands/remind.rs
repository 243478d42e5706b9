//! `/remind`: schedule a notification.
//!
//! Accepted format: `/remind {subject} after {number} {sec|min}`.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::handler::{CommandError, CommandHandler};
use crate::message::{Message, MessageId, Payload, ReminderPayload, StoredMessage, TimeUnit, ViewModel};
use crate::notify::NotificationScheduler;

pub const TOKEN: &str = "/remind";
pub const DESCRIPTION: &str = "Set a Reminder - format: /remind {subject} after [number] [sec|min]";

pub const DEFAULT_TITLE: &str = "Bot Reminder";

const CREATED_TEXT: &str = "Created a reminder for you.";
const FORMAT_ALERT: &str =
    "I could not recognize the remind command, you do know the format i understand right ? \
     (/remind {subject} after [number] [sec|min])";

/// When a presented reminder arms its notification.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RearmPolicy {
    /// Every presentation with time left arms a notification.
    #[default]
    EveryPresentation,
    /// At most one notification per message id for the life of the process.
    OncePerMessage,
}

/// Parsed `/remind` argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReminderRequest {
    pub subject: String,
    pub period: u32,
    pub unit: TimeUnit,
}

/// Parse `{subject} after {number} {sec|min}`.
///
/// The keyword is case-sensitive and the last `after` wins, so subjects may
/// contain the word. Surrounding double quotes are stripped from the subject.
pub fn parse_reminder(text: &str) -> Option<ReminderRequest> {
    let re = Regex::new(r"^(.*)after\s+([0-9]+)\s+(sec|min)$").ok()?;
    let caps = re.captures(text.trim())?;

    let subject = caps.get(1)?.as_str().trim();
    let subject = subject
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(subject)
        .trim();
    if subject.is_empty() {
        return None;
    }

    let period = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let unit = caps.get(3)?.as_str().parse::<TimeUnit>().ok()?;

    Some(ReminderRequest {
        subject: subject.to_string(),
        period,
        unit,
    })
}

pub struct RemindHandler {
    scheduler: Arc<NotificationScheduler>,
    title: String,
    policy: RearmPolicy,
    armed: Mutex<HashSet<MessageId>>,
}

impl RemindHandler {
    pub fn new(scheduler: Arc<NotificationScheduler>) -> Self {
        Self {
            scheduler,
            title: DEFAULT_TITLE.to_string(),
            policy: RearmPolicy::default(),
            armed: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_policy(mut self, policy: RearmPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Arm the notification for a presented reminder if time is left.
    fn arm(&self, id: &MessageId, reminder: &ReminderPayload) -> bool {
        let remaining = reminder.remaining(Utc::now());
        if remaining <= 0 {
            tracing::debug!("Reminder {} already due, not arming", id);
            return false;
        }

        if self.policy == RearmPolicy::OncePerMessage {
            let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
            if !armed.insert(id.clone()) {
                tracing::debug!("Reminder {} already armed", id);
                return false;
            }
        }

        self.scheduler
            .schedule_after(&self.title, &reminder.subject, remaining, reminder.unit)
    }
}

#[async_trait]
impl CommandHandler for RemindHandler {
    async fn execute(&self, args: &str) -> Result<Message, CommandError> {
        let request = parse_reminder(args).ok_or_else(|| CommandError::usage(FORMAT_ALERT))?;

        Ok(Message::command_result(
            TOKEN,
            CREATED_TEXT,
            Payload::Reminder(ReminderPayload {
                subject: request.subject,
                period: request.period,
                unit: request.unit,
                created_at: Utc::now(),
            }),
        ))
    }

    fn present(&self, stored: &StoredMessage) -> ViewModel {
        if let Some(Payload::Reminder(reminder)) = stored.message.payload() {
            self.arm(&stored.id, reminder);
        }
        ViewModel::from_message(&stored.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ViewDetail;
    use chrono::Duration;

    fn handler(policy: RearmPolicy) -> (RemindHandler, Arc<NotificationScheduler>) {
        let scheduler = Arc::new(NotificationScheduler::new(None));
        let handler = RemindHandler::new(scheduler.clone()).with_policy(policy);
        (handler, scheduler)
    }

    fn stored(message: Message) -> StoredMessage {
        StoredMessage::new(MessageId::new("01REMIND"), message)
    }

    fn backdate(mut message: Message, secs: i64) -> Message {
        if let crate::message::Content::CommandResult {
            payload: Payload::Reminder(reminder),
            ..
        } = &mut message.content
        {
            reminder.created_at -= Duration::seconds(secs);
        }
        message
    }

    #[test]
    fn test_parse_reminder() {
        assert_eq!(
            parse_reminder("\"pay rent\" after 10 sec"),
            Some(ReminderRequest {
                subject: "pay rent".to_string(),
                period: 10,
                unit: TimeUnit::Sec,
            })
        );
        assert_eq!(
            parse_reminder("call mom after dinner after 5 min"),
            Some(ReminderRequest {
                subject: "call mom after dinner".to_string(),
                period: 5,
                unit: TimeUnit::Min,
            })
        );
    }

    #[test]
    fn test_parse_reminder_rejects_bad_input() {
        assert_eq!(parse_reminder("pay rent in 10 sec"), None);
        assert_eq!(parse_reminder("pay rent after 10 hours"), None);
        assert_eq!(parse_reminder("pay rent After 10 sec"), None);
        assert_eq!(parse_reminder("pay rent after ten sec"), None);
        assert_eq!(parse_reminder("after 10 sec"), None);
        assert_eq!(parse_reminder("x after 99999999999 sec"), None);
    }

    #[tokio::test]
    async fn test_execute_builds_reminder() {
        let (handler, _) = handler(RearmPolicy::EveryPresentation);
        let before = Utc::now();
        let message = handler.execute("\"pay rent\" after 10 sec").await.unwrap();

        assert_eq!(message.command(), Some(TOKEN));
        assert_eq!(message.body, CREATED_TEXT);
        let Some(Payload::Reminder(reminder)) = message.payload() else {
            panic!("expected reminder payload");
        };
        assert_eq!(reminder.subject, "pay rent");
        assert_eq!(reminder.period, 10);
        assert_eq!(reminder.unit, TimeUnit::Sec);
        assert!(reminder.created_at >= before);
    }

    #[tokio::test]
    async fn test_execute_rejects_format() {
        let (handler, _) = handler(RearmPolicy::EveryPresentation);
        let err = handler.execute("pay rent tomorrow").await.unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));
        assert_eq!(err.alert(), FORMAT_ALERT);
    }

    #[tokio::test]
    async fn test_present_arms_when_time_left() {
        let (handler, scheduler) = handler(RearmPolicy::EveryPresentation);
        let message = handler.execute("stretch after 10 sec").await.unwrap();

        let view = handler.present(&stored(message));
        assert_eq!(scheduler.scheduled_count(), 1);
        assert!(matches!(view.detail, ViewDetail::Reminder { ref subject, .. } if subject == "stretch"));
    }

    #[tokio::test]
    async fn test_present_after_elapsed_does_not_arm() {
        let (handler, scheduler) = handler(RearmPolicy::EveryPresentation);
        let message = handler.execute("\"pay rent\" after 10 sec").await.unwrap();

        handler.present(&stored(backdate(message, 15)));
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_every_presentation_rearms() {
        let (handler, scheduler) = handler(RearmPolicy::EveryPresentation);
        let message = stored(handler.execute("tea after 3 min").await.unwrap());

        handler.present(&message);
        handler.present(&message);
        assert_eq!(scheduler.scheduled_count(), 2);
    }

    #[tokio::test]
    async fn test_once_per_message_arms_once() {
        let (handler, scheduler) = handler(RearmPolicy::OncePerMessage);
        let message = stored(handler.execute("tea after 3 min").await.unwrap());

        handler.present(&message);
        handler.present(&message);
        assert_eq!(scheduler.scheduled_count(), 1);
    }
}
