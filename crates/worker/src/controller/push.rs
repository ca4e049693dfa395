//! Push messages and notification clicks.

use std::sync::Arc;

use minaret_client::canonicalize;
use minaret_core::Error;
use serde::{Deserialize, Serialize};

use super::CacheController;
use crate::notify::{ACTION_DISMISS, ACTION_SNOOZE, Notification, PushPayload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PushOutcome {
    Shown { tag: String },
    /// Payload was not JSON; nothing shown.
    Dropped { reason: String },
    /// The host could not display it. Not retried.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClickOutcome {
    Dismissed,
    Snoozed { delay_secs: u64 },
    Focused { client_id: String },
    Opened { url: String },
}

impl CacheController {
    /// Turn a push message into a notification.
    ///
    /// `data` is the raw payload text. No payload shows the configured
    /// default reminder.
    pub async fn handle_push(&self, data: Option<&str>) -> PushOutcome {
        let tag = self.next_tag();
        let notification = match data.map(str::trim).filter(|d| !d.is_empty()) {
            None => Notification::default_reminder(tag, &self.config),
            Some(text) => match serde_json::from_str::<PushPayload>(text) {
                Ok(payload) => Notification::from_push(tag, payload, &self.config),
                Err(e) => {
                    tracing::warn!(error = %e, "push payload is not valid JSON; dropping");
                    return PushOutcome::Dropped { reason: e.to_string() };
                }
            },
        };

        match self.deps.notifier.show(&notification).await {
            Ok(()) => {
                tracing::debug!(tag = %notification.tag, title = %notification.title, "notification shown");
                PushOutcome::Shown { tag: notification.tag }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to show notification");
                PushOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// React to a click on one of our notifications.
    ///
    /// The notification is always closed first. `dismiss` stops there,
    /// `snooze` shows it again after the snooze delay, anything else brings
    /// the application to the front.
    pub async fn handle_notification_click(
        &self, notification: &Notification, action: Option<&str>,
    ) -> Result<ClickOutcome, Error> {
        if let Err(e) = self.deps.notifier.close(&notification.tag).await {
            tracing::warn!(tag = %notification.tag, error = %e, "failed to close notification");
        }

        match action {
            Some(ACTION_DISMISS) => Ok(ClickOutcome::Dismissed),
            Some(ACTION_SNOOZE) => Ok(self.snooze(notification)),
            _ => self.focus_or_open().await,
        }
    }

    fn snooze(&self, notification: &Notification) -> ClickOutcome {
        let delay = self.config.snooze_delay();
        let again = notification.retagged(self.next_tag());
        let notifier = Arc::clone(&self.deps.notifier);

        let handle = self.deps.scheduler.schedule(
            delay,
            Box::pin(async move {
                if let Err(e) = notifier.show(&again).await {
                    tracing::warn!(tag = %again.tag, error = %e, "failed to show snoozed notification");
                }
            }),
        );
        self.track(handle);

        tracing::debug!(tag = %notification.tag, delay_secs = delay.as_secs(), "notification snoozed");
        ClickOutcome::Snoozed { delay_secs: delay.as_secs() }
    }

    async fn focus_or_open(&self) -> Result<ClickOutcome, Error> {
        let clients = self.deps.clients.match_all().await?;
        let existing = clients.into_iter().find(|client| {
            canonicalize(&client.url, &self.origin).is_ok_and(|url| url == self.root_url)
        });

        if let Some(client) = existing {
            match self.deps.clients.focus(&client.id).await {
                Ok(()) => return Ok(ClickOutcome::Focused { client_id: client.id }),
                // The window may have closed since it was listed.
                Err(e) => tracing::warn!(client = %client.id, error = %e, "focus failed; opening a new window"),
            }
        }

        self.deps.clients.open_window(self.root_url.as_str()).await?;
        Ok(ClickOutcome::Opened { url: self.root_url.to_string() })
    }
}
