use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::AssetResponse;
use crate::utils::format_age;

use super::CacheError;

/// Index file name inside every cache directory
pub const INDEX_FILE: &str = "index.json";

/// Directory holding response bodies inside every cache directory
pub const BODIES_DIR: &str = "bodies";

/// Contents of a cache's `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheIndex {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<CacheEntry>,
}

impl CacheIndex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn find(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Insert or replace the entry for `entry.key`, keeping first-insert order.
    pub fn upsert(&mut self, entry: CacheEntry) {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != key);
        self.entries.len() != before
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|entry| entry.body_len).sum()
    }
}

/// One stored request/response pair. The body lives in its own file named
/// by `body_digest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub response: AssetResponse,
    pub body_digest: String,
    pub body_len: u64,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: String, response: &AssetResponse) -> Self {
        Self {
            key,
            response: response.clone(),
            body_digest: digest(&response.body),
            body_len: response.body.len() as u64,
            stored_at: Utc::now(),
        }
    }

    pub fn age_display(&self) -> String {
        format_age(self.stored_at)
    }
}

/// Hex SHA-256 of arbitrary bytes.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Directory name for a cache. Cache names are arbitrary strings, so they
/// are hashed rather than used as path components.
pub fn dir_name(cache_name: &str) -> String {
    digest(cache_name.as_bytes())
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling temp path unique to this process and call, e.g.
/// `index.json.4121.7.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!("{}.{}.{}.tmp", file_name, std::process::id(), seq))
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(CacheError::io(&tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(CacheError::io(path))?;
    Ok(())
}

/// Read and parse a JSON file, returning `None` if it does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(path)(e)),
    };
    let value = serde_json::from_slice(&contents).map_err(|source| CacheError::CorruptIndex {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, body: &[u8]) -> CacheEntry {
        let response = AssetResponse {
            url: key.to_string(),
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: body.to_vec(),
        };
        CacheEntry::new(key.to_string(), &response)
    }

    #[test]
    fn test_digest_format() {
        let hash = digest(b"body");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, digest(b"body"));
        assert_ne!(hash, digest(b"other"));
    }

    #[test]
    fn test_dir_name_differs_per_version() {
        assert_ne!(
            dir_name("tool-inventory-cache-v1"),
            dir_name("tool-inventory-cache-v2")
        );
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut index = CacheIndex::new("v1");
        index.upsert(entry("http://h/a", b"a1"));
        index.upsert(entry("http://h/b", b"b"));
        index.upsert(entry("http://h/a", b"a2-longer"));

        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[0].key, "http://h/a");
        assert_eq!(index.entries[0].body_len, 9);
        assert_eq!(index.total_bytes(), 10);
    }

    #[test]
    fn test_remove_entry() {
        let mut index = CacheIndex::new("v1");
        index.upsert(entry("http://h/a", b"a"));
        assert!(index.remove("http://h/a"));
        assert!(!index.remove("http://h/a"));
        assert!(index.find("http://h/a").is_none());
    }

    #[test]
    fn test_body_not_serialized_in_index() {
        let mut index = CacheIndex::new("v1");
        index.upsert(entry("http://h/a", b"secret-body"));
        let json = serde_json::to_string(&index).expect("serialize");
        assert!(!json.contains("secret-body"));

        let parsed: CacheIndex = serde_json::from_str(&json).expect("parse");
        assert!(parsed.entries[0].response.body.is_empty());
        assert_eq!(parsed.entries[0].body_len, 11);
    }

    #[test]
    fn test_temp_path_unique_per_call() {
        let path = Path::new("/caches/abc/index.json");
        let first = temp_path(path);
        let second = temp_path(path);

        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        assert!(first.to_string_lossy().ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_concurrent_atomic_writes_same_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");

        let writes = (0..8u8).map(|i| {
            let path = path.clone();
            async move { write_atomic(&path, &[i; 64]).await }
        });
        for result in futures::future::join_all(writes).await {
            result.expect("write");
        }

        let contents = std::fs::read(&path).expect("read");
        assert_eq!(contents.len(), 64);
        assert!(contents.iter().all(|b| *b == contents[0]));

        let leftovers = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
