//! One-shot notification timers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::{Notification, Notifier, Permission};
use crate::message::TimeUnit;

const ENABLED_TITLE: &str = "Slackbot";
const ENABLED_BODY: &str = "Hey there, i can now remind you with notifications";

/// Arms fire-and-forget notification timers. No handle is kept: a timer
/// cannot be cancelled once scheduled.
pub struct NotificationScheduler {
    notifier: Option<Arc<dyn Notifier>>,
    icon: Option<String>,
    scheduled: AtomicUsize,
    permission_requested: AtomicBool,
}

impl NotificationScheduler {
    /// `notifier` is `None` when the platform has no notification capability.
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            notifier,
            icon: None,
            scheduled: AtomicUsize::new(0),
            permission_requested: AtomicBool::new(false),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Number of timers armed so far.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Ask for notification permission, at most once per scheduler.
    ///
    /// When the request turns a missing permission into a granted one, a
    /// notice saying reminders can now notify is shown. Returns `None` when
    /// there is no notification capability.
    pub async fn request_permission(&self) -> Option<Permission> {
        let notifier = self.notifier.as_ref()?;
        let current = notifier.permission();
        if current == Permission::Granted || self.permission_requested.swap(true, Ordering::SeqCst) {
            return Some(current);
        }

        let permission = notifier.request_permission().await;
        tracing::debug!("Notification permission: {:?}", permission);
        if permission == Permission::Granted {
            let notice = Notification {
                title: ENABLED_TITLE.to_string(),
                body: ENABLED_BODY.to_string(),
                icon: self.icon.clone(),
            };
            if let Err(e) = notifier.show(notice).await {
                tracing::warn!("Failed to show notification: {}", e);
            }
        }
        Some(permission)
    }

    /// Show a notification after `delay` units.
    ///
    /// Returns `false` when nothing was armed: the delay is not positive or
    /// there is no runtime to run the timer on.
    pub fn schedule_after(&self, title: &str, body: &str, delay: i64, unit: TimeUnit) -> bool {
        let Some(millis) = delay.checked_mul(unit.millis()) else {
            tracing::warn!("Notification delay {} {} overflows", delay, unit);
            return false;
        };
        if millis <= 0 {
            tracing::debug!("Skipping notification with non-positive delay {} {}", delay, unit);
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, cannot schedule notification '{}'", title);
            return false;
        };

        let notifier = self.notifier.clone();
        let notification = Notification {
            title: title.to_string(),
            body: body.to_string(),
            icon: self.icon.clone(),
        };
        let wait = Duration::from_millis(millis as u64);

        runtime.spawn(async move {
            sleep(wait).await;
            deliver(notifier, notification).await;
        });

        self.scheduled.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Notification '{}' scheduled in {} {}", title, delay, unit);
        true
    }
}

async fn deliver(notifier: Option<Arc<dyn Notifier>>, notification: Notification) {
    let Some(notifier) = notifier else {
        tracing::debug!("No notification capability, dropping '{}'", notification.title);
        return;
    };

    if notifier.permission() == Permission::Denied {
        tracing::debug!("Notification permission denied, dropping '{}'", notification.title);
        return;
    }

    if notifier.request_permission().await != Permission::Granted {
        tracing::debug!("Notification permission not granted for '{}'", notification.title);
        return;
    }

    if let Err(e) = notifier.show(notification).await {
        tracing::warn!("Failed to show notification: {}", e);
    }
}
