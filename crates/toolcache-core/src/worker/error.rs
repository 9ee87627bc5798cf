use thiserror::Error;

use crate::cache::CacheError;
use crate::network::NetworkError;

use super::WorkerState;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Install of {cache} failed: {source}")]
    InstallFailed {
        cache: String,
        #[source]
        source: CacheError,
    },

    #[error("Cannot {operation} while worker is {state}")]
    InvalidState {
        operation: &'static str,
        state: WorkerState,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
