//! Install, activate and skip-waiting.

use minaret_client::canonicalize;
use minaret_core::{Error, Request, Response};
use serde::{Deserialize, Serialize};

use super::{CacheController, Lifecycle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Number of manifest assets written to the static store.
    pub cached: usize,
    /// The generation asks to be activated without waiting for old pages
    /// to close.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateReport {
    /// Stores from earlier generations that were removed.
    pub deleted: Vec<String>,
    /// Windows now controlled by this generation.
    pub claimed: usize,
}

impl CacheController {
    /// Precache the manifest into the static store and create the dynamic
    /// store.
    ///
    /// All assets are fetched before anything is written, so a failed
    /// install leaves no partial static store behind.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` for the first asset that fails to
    /// fetch or answers with a non-2xx status; the controller is then
    /// redundant. Returns `Error::InvalidInput` if install was already
    /// attempted.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.transition.lock().await;

        let state = self.state();
        if state != Lifecycle::Parsed {
            return Err(Error::InvalidInput(format!("cannot install from state {state}")));
        }
        self.set_state(Lifecycle::Installing);

        match self.precache().await {
            Ok(cached) => {
                self.set_state(Lifecycle::Waiting);
                tracing::info!(cached, store = %self.static_name, "install complete");
                Ok(InstallReport { cached, skip_waiting: true })
            }
            Err(e) => {
                self.set_state(Lifecycle::Redundant);
                tracing::error!(error = %e, "install failed; generation will not activate");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let mut assets: Vec<(String, Response)> = Vec::with_capacity(self.config.precache_urls.len());

        for asset in &self.config.precache_urls {
            let key = canonicalize(asset, &self.origin)
                .map_err(|e| Error::InstallFailed { url: asset.clone(), reason: e.to_string() })?;

            let response = self
                .deps
                .network
                .fetch(&Request::get(key.as_str()))
                .await
                .map_err(|e| Error::InstallFailed { url: key.to_string(), reason: e.to_string() })?;

            if !response.is_success() {
                return Err(Error::InstallFailed { url: key.to_string(), reason: format!("status {}", response.status) });
            }

            assets.push((key.to_string(), response));
        }

        let store = self.deps.storage.open(&self.static_name).await?;
        for (key, response) in &assets {
            store.put(key, response).await?;
        }
        self.deps.storage.open(&self.dynamic_name).await?;

        Ok(assets.len())
    }

    /// Evict every store that does not belong to this generation and claim
    /// all open windows.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` unless the controller is waiting (an
    /// already active controller returns an empty report instead). Storage
    /// and client errors leave the controller waiting.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.transition.lock().await;

        match self.state() {
            Lifecycle::Waiting => {}
            Lifecycle::Active => return Ok(ActivateReport::default()),
            state => return Err(Error::InvalidInput(format!("cannot activate from state {state}"))),
        }

        let mut deleted = Vec::new();
        for name in self.deps.storage.keys().await? {
            if name == self.static_name || name == self.dynamic_name {
                continue;
            }
            if self.deps.storage.delete(&name).await? {
                tracing::info!(store = %name, "deleted cache from earlier generation");
                deleted.push(name);
            }
        }

        let claimed = self.deps.clients.claim().await?;
        self.set_state(Lifecycle::Active);
        tracing::info!(deleted = deleted.len(), claimed, "activated");

        Ok(ActivateReport { deleted, claimed })
    }

    /// Activate immediately if waiting. Returns `None` in any other state.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        if self.state() != Lifecycle::Waiting {
            tracing::debug!(state = %self.state(), "skip waiting ignored");
            return Ok(None);
        }
        self.activate().await.map(Some)
    }

    /// Pick up a generation installed by an earlier run of the process.
    ///
    /// If both stores exist and the static store holds every manifest asset,
    /// the controller goes straight to active. Returns whether it did.
    pub async fn resume(&self) -> Result<bool, Error> {
        let _guard = self.transition.lock().await;

        if self.state() != Lifecycle::Parsed {
            return Ok(false);
        }

        let storage = self.deps.storage.as_ref();
        if !storage.has(&self.static_name).await? || !storage.has(&self.dynamic_name).await? {
            return Ok(false);
        }

        let store = storage.open(&self.static_name).await?;
        for asset in &self.config.precache_urls {
            let Ok(key) = canonicalize(asset, &self.origin) else {
                return Ok(false);
            };
            if store.get(key.as_str()).await?.is_none() {
                tracing::info!(asset = %key, "stored generation is incomplete; reinstall required");
                return Ok(false);
            }
        }

        self.set_state(Lifecycle::Active);
        tracing::info!(store = %self.static_name, "resumed installed generation");
        Ok(true)
    }
}
