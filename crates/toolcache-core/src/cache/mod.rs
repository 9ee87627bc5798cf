//! Local cache storage for offline asset access.
//!
//! This module provides `CacheStorage`, the set of named caches for one
//! origin, and `Cache`, a single named cache mapping requests to stored
//! responses. Everything lives under one root directory:
//!
//! ```text
//! <root>/<sha256(cache name)>/index.json
//! <root>/<sha256(cache name)>/bodies/<sha256(body)>
//! ```
//!
//! The index is the only thing a lookup trusts. Writes land bodies first and
//! swap the index in with a rename, so a failed batch is never visible.

pub mod error;
pub mod index;
pub mod manager;

pub use error::CacheError;
pub use index::{CacheEntry, CacheIndex};
pub use manager::{Cache, CacheStorage, CacheSummary};
