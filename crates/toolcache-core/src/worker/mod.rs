//! Offline worker: the install, activate and fetch handlers.
//!
//! `OfflineWorker` owns the cache storage and the network client for one
//! origin. The lifecycle runs in order and each step is awaited to
//! completion before the next may start:
//!
//! 1. `install` opens the cache named by the version tag and stores every
//!    manifest asset, all or nothing.
//! 2. `activate` deletes every cache whose name is not the version tag.
//! 3. `handle_fetch` answers a request from any cache, falling back to the
//!    network on a miss.

pub mod error;
pub mod registration;
pub mod state;

pub use error::WorkerError;
pub use registration::Registration;
pub use state::WorkerState;

use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStorage};
use crate::manifest::{default_manifest, CACHE_NAME};
use crate::models::{AssetResponse, FetchRequest};
use crate::network::NetworkClient;

/// Immutable settings resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Version tag, also the name of the cache install populates
    pub cache_name: String,
    /// Root-relative URLs stored by install
    pub manifest: Vec<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            cache_name: CACHE_NAME.to_string(),
            manifest: default_manifest(),
        }
    }
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchSource::Cache => "hit",
            FetchSource::Network => "miss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: AssetResponse,
    pub source: FetchSource,
}

pub struct OfflineWorker {
    settings: WorkerSettings,
    storage: CacheStorage,
    network: NetworkClient,
    state: WorkerState,
}

impl OfflineWorker {
    /// Build a worker, resuming the lifecycle state recorded in storage.
    pub async fn register(
        settings: WorkerSettings,
        storage: CacheStorage,
        network: NetworkClient,
    ) -> Result<Self, WorkerError> {
        let registration = Registration::load(storage.root()).await?;
        let state = registration.state_for(&settings.cache_name);
        debug!(cache = %settings.cache_name, state = %state, "Registered worker");

        Ok(Self {
            settings,
            storage,
            network,
            state,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn network(&self) -> &NetworkClient {
        &self.network
    }

    // ===== Install =====

    /// Open the current cache and store every manifest asset.
    ///
    /// Nothing is committed unless every asset was fetched with an OK
    /// status. On failure the worker becomes redundant and the error is
    /// returned; there is no retry.
    pub async fn install(&mut self) -> Result<(), WorkerError> {
        self.state = WorkerState::Installing;
        info!(cache = %self.settings.cache_name, assets = self.settings.manifest.len(), "Installing");

        match self.populate().await {
            Ok(()) => {
                let mut registration = Registration::load(self.storage.root()).await?;
                registration.waiting = Some(self.settings.cache_name.clone());
                registration.save(self.storage.root()).await?;

                self.state = WorkerState::Installed;
                info!(cache = %self.settings.cache_name, "Installed");
                Ok(())
            }
            Err(source) => {
                self.state = WorkerState::Redundant;
                warn!(cache = %self.settings.cache_name, error = %source, "Install failed");
                Err(WorkerError::InstallFailed {
                    cache: self.settings.cache_name.clone(),
                    source,
                })
            }
        }
    }

    async fn populate(&self) -> Result<(), CacheError> {
        let urls = self
            .settings
            .manifest
            .iter()
            .map(|path| self.network.resolve(path))
            .collect::<Result<Vec<_>, _>>()?;

        let cache = self.storage.open(&self.settings.cache_name).await?;
        cache.add_all(&self.network, &urls).await
    }

    // ===== Activate =====

    /// Delete every cache whose name differs from the version tag.
    ///
    /// Deletion is best-effort: failures are logged and skipped. Returns the
    /// names that were removed.
    pub async fn activate(&mut self) -> Result<Vec<String>, WorkerError> {
        if !self.state.can_activate() {
            return Err(WorkerError::InvalidState {
                operation: "activate",
                state: self.state,
            });
        }

        let previous = self.state;
        self.state = WorkerState::Activating;

        match self.purge_and_record().await {
            Ok(deleted) => {
                self.state = WorkerState::Activated;
                info!(cache = %self.settings.cache_name, deleted = deleted.len(), "Activated");
                Ok(deleted)
            }
            Err(e) => {
                // Leave the worker where it was so activation can be retried
                self.state = previous;
                warn!(cache = %self.settings.cache_name, error = %e, "Activate failed");
                Err(e)
            }
        }
    }

    async fn purge_and_record(&self) -> Result<Vec<String>, WorkerError> {
        let deleted = self
            .storage
            .delete_all_except(&self.settings.cache_name)
            .await?;

        let mut registration = Registration::load(self.storage.root()).await?;
        registration.active = Some(self.settings.cache_name.clone());
        registration.waiting = None;
        registration.save(self.storage.root()).await?;
        Ok(deleted)
    }

    /// Install followed by activate, the sequence a redeploy triggers.
    pub async fn update(&mut self) -> Result<Vec<String>, WorkerError> {
        self.install().await?;
        self.activate().await
    }

    // ===== Fetch =====

    /// Answer a request from the cache, or forward it to the network once.
    ///
    /// Network responses are returned unmodified and never written back.
    /// A network failure on a miss is returned to the caller as is; there is
    /// no fallback page.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, WorkerError> {
        match self.storage.match_request(request).await {
            Ok(Some(response)) => {
                debug!(url = %request.url, "Cache hit");
                return Ok(FetchOutcome {
                    response,
                    source: FetchSource::Cache,
                });
            }
            Ok(None) => debug!(method = %request.method, url = %request.url, "Cache miss"),
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed, using network"),
        }

        let response = self.network.send(request).await?;
        Ok(FetchOutcome {
            response,
            source: FetchSource::Network,
        })
    }
}
