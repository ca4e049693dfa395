//! Inbound events and their outcomes.
//!
//! Every event the host can deliver is one variant of [`WorkerEvent`];
//! [`CacheController::dispatch`] is the single entry point that handles them.

use minaret_core::{Error, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::{
    ActivateReport, CacheController, ClickOutcome, FetchOutcome, InstallReport, PushOutcome, SyncStatus,
};
use crate::notify::{Notification, WindowClient};

/// The only control message the controller understands.
pub const MESSAGE_SKIP_WAITING: &str = "SKIP_WAITING";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch {
        request: Request,
    },
    Push {
        /// Raw payload text.
        #[serde(default)]
        data: Option<String>,
    },
    NotificationClick {
        notification: Notification,
        #[serde(default)]
        action: Option<String>,
    },
    Sync {
        tag: String,
    },
    PeriodicSync {
        tag: String,
    },
    Message {
        data: Value,
    },
    ClientOpened {
        id: String,
        url: String,
    },
    ClientClosed {
        id: String,
    },
}

impl WorkerEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch { .. } => "fetch",
            WorkerEvent::Push { .. } => "push",
            WorkerEvent::NotificationClick { .. } => "notification_click",
            WorkerEvent::Sync { .. } => "sync",
            WorkerEvent::PeriodicSync { .. } => "periodic_sync",
            WorkerEvent::Message { .. } => "message",
            WorkerEvent::ClientOpened { .. } => "client_opened",
            WorkerEvent::ClientClosed { .. } => "client_closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetch { outcome: FetchOutcome },
    Push { outcome: PushOutcome },
    NotificationClick { outcome: ClickOutcome },
    Sync { tag: String, status: SyncStatus },
    /// Accepted with nothing further to report.
    Ack,
    /// Recognized but not acted on (unknown message, skip-waiting while not
    /// waiting).
    Ignored,
}

/// Whether `data` is `{ "type": "SKIP_WAITING" }`.
pub fn is_skip_waiting(data: &Value) -> bool {
    data.get("type").and_then(Value::as_str) == Some(MESSAGE_SKIP_WAITING)
}

impl CacheController {
    /// Handle one inbound event.
    ///
    /// # Errors
    ///
    /// Only lifecycle events and notification clicks can fail; fetch, push
    /// and sync degrade to an outcome instead.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        let kind = event.kind();
        tracing::trace!(kind, "dispatch");

        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch { request } => Ok(EventOutcome::Fetch { outcome: self.handle_fetch(&request).await }),
            WorkerEvent::Push { data } => Ok(EventOutcome::Push { outcome: self.handle_push(data.as_deref()).await }),
            WorkerEvent::NotificationClick { notification, action } => self
                .handle_notification_click(&notification, action.as_deref())
                .await
                .map(|outcome| EventOutcome::NotificationClick { outcome }),
            WorkerEvent::Sync { tag } | WorkerEvent::PeriodicSync { tag } => {
                let status = self.handle_sync(&tag).await;
                Ok(EventOutcome::Sync { tag, status })
            }
            WorkerEvent::Message { data } => {
                if !is_skip_waiting(&data) {
                    tracing::debug!(%data, "ignoring unrecognized message");
                    return Ok(EventOutcome::Ignored);
                }
                match self.skip_waiting().await? {
                    Some(report) => Ok(EventOutcome::Activated(report)),
                    None => Ok(EventOutcome::Ignored),
                }
            }
            WorkerEvent::ClientOpened { id, url } => {
                self.deps.clients.register(WindowClient { id, url }).await?;
                Ok(EventOutcome::Ack)
            }
            WorkerEvent::ClientClosed { id } => {
                if !self.deps.clients.unregister(&id).await? {
                    tracing::debug!(client = %id, "close for unknown client");
                }
                Ok(EventOutcome::Ack)
            }
        }
    }
}
