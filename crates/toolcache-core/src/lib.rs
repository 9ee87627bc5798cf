//! Core library for the tool inventory offline cache.
//!
//! The crate mirrors the service worker model the web app relies on:
//! - `manifest`: the version tag and the fixed list of assets to pre-cache
//! - `cache`: on-disk storage of named caches keyed by request
//! - `network`: HTTP client for the application origin
//! - `worker`: install, activate and fetch handlers plus lifecycle state
//! - `config`: persisted settings and directory resolution

pub mod cache;
pub mod config;
pub mod manifest;
pub mod models;
pub mod network;
pub mod utils;
pub mod worker;

pub use cache::{Cache, CacheError, CacheStorage};
pub use config::Config;
pub use models::{AssetResponse, FetchRequest};
pub use network::{NetworkClient, NetworkError};
pub use worker::{FetchOutcome, FetchSource, OfflineWorker, WorkerError, WorkerSettings, WorkerState};
