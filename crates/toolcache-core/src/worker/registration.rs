//! Persisted lifecycle record.
//!
//! Each CLI invocation builds a fresh worker, so which version tag finished
//! installing and which one is active is kept next to the caches.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::index::{read_json, write_atomic};
use crate::cache::CacheError;

use super::WorkerState;

/// Registration file name in the cache storage root
const REGISTRATION_FILE: &str = "registration.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registration {
    /// Tag whose install completed and is waiting to activate
    pub waiting: Option<String>,
    /// Tag of the last completed activation
    pub active: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Registration {
    pub fn path(root: &Path) -> PathBuf {
        root.join(REGISTRATION_FILE)
    }

    pub async fn load(root: &Path) -> Result<Self, CacheError> {
        Ok(read_json::<Self>(&Self::path(root)).await?.unwrap_or_default())
    }

    pub async fn save(&mut self, root: &Path) -> Result<(), CacheError> {
        self.updated_at = Some(Utc::now());
        let contents = serde_json::to_vec_pretty(self)?;
        write_atomic(&Self::path(root), &contents).await
    }

    /// State a worker for `cache_name` resumes in.
    pub fn state_for(&self, cache_name: &str) -> WorkerState {
        if self.active.as_deref() == Some(cache_name) {
            WorkerState::Activated
        } else if self.waiting.as_deref() == Some(cache_name) {
            WorkerState::Installed
        } else {
            WorkerState::Parsed
        }
    }
}
