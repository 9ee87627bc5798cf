//! HTTP client module for the application origin.
//!
//! This module provides the `NetworkClient` used both to populate caches
//! during install and to forward intercepted requests that miss the cache.

pub mod client;
pub mod error;

pub use client::NetworkClient;
pub use error::NetworkError;
