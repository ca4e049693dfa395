//! Push payloads, notifications and the window clients they act on.

use async_trait::async_trait;
use minaret_core::{AppConfig, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ACTION_DISMISS: &str = "dismiss";
pub const ACTION_SNOOZE: &str = "snooze";

/// JSON body of a push message. Title and body are not validated; the
/// sender is trusted to provide them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,

    pub icon: Option<String>,

    pub badge: Option<String>,

    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// A notification as handed to the host for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifies the notification for later close requests.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

fn reminder_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction { action: ACTION_DISMISS.into(), title: "Dismiss".into() },
        NotificationAction { action: ACTION_SNOOZE.into(), title: "Snooze 5 min".into() },
    ]
}

impl Notification {
    /// Build the notification for a push, filling icon and badge from config.
    pub fn from_push(tag: String, payload: PushPayload, config: &AppConfig) -> Self {
        Self {
            tag,
            title: payload.title,
            body: payload.body,
            icon: Some(payload.icon.unwrap_or_else(|| config.notification_icon.clone())),
            badge: Some(payload.badge.unwrap_or_else(|| config.notification_badge.clone())),
            data: payload.data,
            actions: reminder_actions(),
        }
    }

    /// The reminder shown for a push that carried no payload.
    pub fn default_reminder(tag: String, config: &AppConfig) -> Self {
        let payload = PushPayload {
            title: config.notification_title.clone(),
            body: config.notification_body.clone(),
            ..PushPayload::default()
        };
        Self::from_push(tag, payload, config)
    }

    /// Same content under a new tag.
    pub fn retagged(&self, tag: String) -> Self {
        Self { tag, ..self.clone() }
    }
}

/// Displays and closes system notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), Error>;

    async fn close(&self, tag: &str) -> Result<(), Error>;
}

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

/// The application windows the controller can see and drive.
#[async_trait]
pub trait Clients: Send + Sync {
    async fn register(&self, client: WindowClient) -> Result<(), Error>;

    /// Returns true if the client was known.
    async fn unregister(&self, id: &str) -> Result<bool, Error>;

    async fn match_all(&self) -> Result<Vec<WindowClient>, Error>;

    /// Take control of every open window; returns how many were claimed.
    async fn claim(&self) -> Result<usize, Error>;

    async fn focus(&self, id: &str) -> Result<(), Error>;

    async fn open_window(&self, url: &str) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_missing_fields_become_empty() {
        let payload: PushPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.title, "");
        assert_eq!(payload.body, "");
        assert_eq!(payload.data, Value::Null);
    }

    #[test]
    fn test_from_push_fills_defaults() {
        let config = AppConfig::default();
        let payload: PushPayload = serde_json::from_value(json!({
            "title": "Asr",
            "body": "Asr begins in 10 minutes",
            "data": {"prayer": "asr"}
        }))
        .unwrap();

        let n = Notification::from_push("t1".into(), payload, &config);
        assert_eq!(n.title, "Asr");
        assert_eq!(n.icon.as_deref(), Some("/logo192.png"));
        assert_eq!(n.badge.as_deref(), Some("/favicon.ico"));
        assert_eq!(n.data["prayer"], "asr");
        let actions: Vec<_> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec![ACTION_DISMISS, ACTION_SNOOZE]);
    }

    #[test]
    fn test_from_push_keeps_payload_icon() {
        let config = AppConfig::default();
        let payload = PushPayload { icon: Some("/mosque.png".into()), ..Default::default() };
        let n = Notification::from_push("t".into(), payload, &config);
        assert_eq!(n.icon.as_deref(), Some("/mosque.png"));
    }

    #[test]
    fn test_default_reminder() {
        let config = AppConfig::default();
        let n = Notification::default_reminder("t".into(), &config);
        assert_eq!(n.title, "Prayer Reminder");
        assert_eq!(n.actions.len(), 2);
    }

    #[test]
    fn test_retagged_keeps_content() {
        let config = AppConfig::default();
        let n = Notification::default_reminder("a".into(), &config);
        let again = n.retagged("b".into());
        assert_eq!(again.tag, "b");
        assert_eq!(again.title, n.title);
        assert_eq!(again.actions, n.actions);
    }
}
