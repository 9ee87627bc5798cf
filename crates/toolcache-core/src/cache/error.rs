use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::network::NetworkError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt cache index at {}: {source}", .path.display())]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored body for {key} does not match its digest")]
    CorruptBody { key: String },

    #[error("Duplicate request in batch: {0}")]
    DuplicateRequest(String),

    #[error("Response for {0} has Vary: * and cannot be cached")]
    VaryWildcard(String),

    #[error("Only GET requests can be cached: {method} {url}")]
    UnsupportedMethod { method: String, url: String },

    #[error("Failed to serialize cache index: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl CacheError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> CacheError {
        let path = path.to_path_buf();
        move |source| CacheError::Io { path, source }
    }
}
