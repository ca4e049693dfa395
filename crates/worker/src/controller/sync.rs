//! Background and periodic sync triggers.

use minaret_client::canonicalize;
use minaret_core::Request;
use serde::{Deserialize, Serialize};

use super::{CacheController, Lifecycle};

pub const SYNC_PRAYER_REMINDER: &str = "prayer-reminder";
pub const SYNC_PRAYER_TIMES_UPDATE: &str = "prayer-times-update";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Fetched; nothing persisted.
    Fetched { status: u16 },
    /// Fetched and written to the dynamic store.
    Stored { status: u16 },
    /// Logged and dropped; the platform decides whether to retry.
    Failed { reason: String },
    /// Unknown tag, or the controller is not active.
    Ignored,
}

impl CacheController {
    pub async fn handle_sync(&self, tag: &str) -> SyncStatus {
        if self.state() != Lifecycle::Active {
            tracing::debug!(tag, state = %self.state(), "sync ignored while not active");
            return SyncStatus::Ignored;
        }

        let persist = match tag {
            SYNC_PRAYER_REMINDER => false,
            SYNC_PRAYER_TIMES_UPDATE => true,
            other => {
                tracing::debug!(tag = other, "unknown sync tag");
                return SyncStatus::Ignored;
            }
        };

        let key = match canonicalize(&self.config.prayer_times_url, &self.origin) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(tag, error = %e, "prayer times url is not fetchable");
                return SyncStatus::Failed { reason: e.to_string() };
            }
        };

        let response = match self.deps.network.fetch(&Request::get(key.as_str())).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(tag, url = %key, error = %e, "sync fetch failed");
                return SyncStatus::Failed { reason: e.to_string() };
            }
        };

        if !response.is_success() {
            tracing::warn!(tag, url = %key, status = response.status, "sync fetch returned error status");
            return SyncStatus::Failed { reason: format!("status {}", response.status) };
        }

        if !persist {
            tracing::info!(tag, status = response.status, "prayer times checked");
            return SyncStatus::Fetched { status: response.status };
        }

        self.store_dynamic(key.as_str(), &response).await;
        tracing::info!(tag, url = %key, "prayer times refreshed");
        SyncStatus::Stored { status: response.status }
    }
}
