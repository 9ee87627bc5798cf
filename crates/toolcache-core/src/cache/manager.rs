use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::models::request::request_key;
use crate::models::{AssetResponse, FetchRequest};
use crate::network::NetworkClient;
use crate::utils::format_age;

use super::index::{self, read_json, write_atomic, CacheEntry, CacheIndex, BODIES_DIR, INDEX_FILE};
use super::CacheError;

/// All named caches for one origin, rooted at a single directory.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root).map_err(CacheError::io(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root.join(index::dir_name(name))
    }

    /// Every cache with a readable index, oldest first.
    async fn indexes(&self) -> Result<Vec<CacheIndex>, CacheError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(CacheError::io(&self.root))?;

        let mut indexes = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(CacheError::io(&self.root))? {
            if !item.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let path = item.path().join(INDEX_FILE);
            match read_json::<CacheIndex>(&path).await {
                Ok(Some(index)) => indexes.push(index),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache"),
            }
        }

        indexes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(indexes)
    }

    /// Names of all caches in creation order.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.indexes().await?.into_iter().map(|index| index.name).collect())
    }

    pub async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(read_json::<CacheIndex>(&self.cache_dir(name).join(INDEX_FILE))
            .await?
            .is_some())
    }

    /// Open the named cache, creating it empty if it does not exist.
    pub async fn open(&self, name: &str) -> Result<Cache, CacheError> {
        let cache = Cache {
            name: name.to_string(),
            dir: self.cache_dir(name),
        };

        match read_json::<CacheIndex>(&cache.index_path()).await {
            Ok(Some(_)) => return Ok(cache),
            Ok(None) => info!(cache = name, "Created cache"),
            // Orphaned bodies are pruned by the next write
            Err(CacheError::CorruptIndex { path, source }) => {
                warn!(cache = name, path = %path.display(), error = %source, "Resetting corrupt cache index");
            }
            Err(e) => return Err(e),
        }

        tokio::fs::create_dir_all(cache.bodies_dir())
            .await
            .map_err(CacheError::io(&cache.dir))?;
        cache.write_index(&CacheIndex::new(name)).await?;
        Ok(cache)
    }

    /// Delete the named cache. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let dir = self.cache_dir(name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(cache = name, "Deleted cache");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&dir)(e)),
        }
    }

    /// Remove every cache directory except the one belonging to `keep`.
    ///
    /// Works on directories rather than indexes, so caches whose index is
    /// missing or unreadable are removed too. Failures are logged and skipped.
    /// Returns the cache names removed, or the directory name when the index
    /// could not be read.
    pub async fn delete_all_except(&self, keep: &str) -> Result<Vec<String>, CacheError> {
        let keep_dir = index::dir_name(keep);
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(CacheError::io(&self.root))?;

        let mut deleted = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(CacheError::io(&self.root))? {
            if !item.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let dir_name = item.file_name().to_string_lossy().into_owned();
            if dir_name == keep_dir {
                continue;
            }

            let name = match read_json::<CacheIndex>(&item.path().join(INDEX_FILE)).await {
                Ok(Some(index)) => index.name,
                _ => dir_name,
            };
            match tokio::fs::remove_dir_all(item.path()).await {
                Ok(()) => {
                    info!(cache = %name, "Deleted cache");
                    deleted.push(name);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(cache = %name, "Cache already gone");
                }
                Err(e) => warn!(cache = %name, error = %e, "Failed to delete stale cache"),
            }
        }
        Ok(deleted)
    }

    /// Look the request up in every cache, oldest first, and return the
    /// first stored response.
    pub async fn match_request(
        &self,
        request: &FetchRequest,
    ) -> Result<Option<AssetResponse>, CacheError> {
        let Some(key) = request.cache_key() else {
            return Ok(None);
        };

        for index in self.indexes().await? {
            if let Some(entry) = index.find(&key) {
                let cache = Cache {
                    dir: self.cache_dir(&index.name),
                    name: index.name.clone(),
                };
                return cache.load_response(entry).await.map(Some);
            }
        }
        Ok(None)
    }

    /// Per-cache overview for display.
    pub async fn summaries(&self) -> Result<Vec<CacheSummary>, CacheError> {
        Ok(self
            .indexes()
            .await?
            .into_iter()
            .map(|index| CacheSummary {
                entries: index.entries.len(),
                total_bytes: index.total_bytes(),
                created_at: index.created_at,
                name: index.name,
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    pub total_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl CacheSummary {
    pub fn age_display(&self) -> String {
        format_age(self.created_at)
    }
}

/// A single named cache.
#[derive(Debug, Clone)]
pub struct Cache {
    name: String,
    dir: PathBuf,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn bodies_dir(&self) -> PathBuf {
        self.dir.join(BODIES_DIR)
    }

    async fn load_index(&self) -> Result<CacheIndex, CacheError> {
        Ok(read_json::<CacheIndex>(&self.index_path())
            .await?
            .unwrap_or_else(|| CacheIndex::new(&self.name)))
    }

    async fn write_index(&self, index: &CacheIndex) -> Result<(), CacheError> {
        let contents = serde_json::to_vec_pretty(index)?;
        write_atomic(&self.index_path(), &contents).await
    }

    async fn load_response(&self, entry: &CacheEntry) -> Result<AssetResponse, CacheError> {
        let path = self.bodies_dir().join(&entry.body_digest);
        let body = tokio::fs::read(&path).await.map_err(CacheError::io(&path))?;
        if index::digest(&body) != entry.body_digest {
            return Err(CacheError::CorruptBody {
                key: entry.key.clone(),
            });
        }

        let mut response = entry.response.clone();
        response.body = body;
        Ok(response)
    }

    /// Request keys of every stored entry, in insertion order.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .load_index()
            .await?
            .entries
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }

    pub async fn match_request(
        &self,
        request: &FetchRequest,
    ) -> Result<Option<AssetResponse>, CacheError> {
        let Some(key) = request.cache_key() else {
            return Ok(None);
        };
        let index = self.load_index().await?;
        match index.find(&key) {
            Some(entry) => self.load_response(entry).await.map(Some),
            None => Ok(None),
        }
    }

    /// Store a single response.
    pub async fn put(&self, request: &FetchRequest, response: AssetResponse) -> Result<(), CacheError> {
        let key = request.cache_key().ok_or_else(|| CacheError::UnsupportedMethod {
            method: request.method.to_string(),
            url: request.url.to_string(),
        })?;
        self.put_batch(vec![(key, response)]).await
    }

    /// Store several responses as one unit.
    ///
    /// Bodies are written first; the new index is renamed into place last,
    /// so either every entry in the batch becomes visible or none does.
    pub async fn put_batch(&self, batch: Vec<(String, AssetResponse)>) -> Result<(), CacheError> {
        let mut seen = HashSet::new();
        for (key, response) in &batch {
            if !seen.insert(key.as_str()) {
                return Err(CacheError::DuplicateRequest(key.clone()));
            }
            if response
                .header("vary")
                .is_some_and(|vary| vary.split(',').any(|v| v.trim() == "*"))
            {
                return Err(CacheError::VaryWildcard(key.clone()));
            }
        }

        let bodies = self.bodies_dir();
        tokio::fs::create_dir_all(&bodies)
            .await
            .map_err(CacheError::io(&bodies))?;

        let mut index = self.load_index().await?;
        for (key, response) in &batch {
            let entry = CacheEntry::new(key.clone(), response);
            let path = bodies.join(&entry.body_digest);
            if tokio::fs::metadata(&path).await.is_err() {
                write_atomic(&path, &response.body).await?;
            }
            index.upsert(entry);
        }

        self.write_index(&index).await?;
        debug!(cache = %self.name, entries = batch.len(), "Committed batch");

        self.prune_bodies(&index).await;
        Ok(())
    }

    /// Fetch every URL and store the responses as one batch. Any network
    /// failure or non-OK status aborts the whole batch before anything is
    /// written.
    pub async fn add_all(&self, network: &NetworkClient, urls: &[Url]) -> Result<(), CacheError> {
        let mut seen = HashSet::new();
        for url in urls {
            let key = request_key(url);
            if !seen.insert(key.clone()) {
                return Err(CacheError::DuplicateRequest(key));
            }
        }

        let responses = try_join_all(urls.iter().map(|url| network.fetch_asset(url))).await?;

        let batch = urls
            .iter()
            .map(request_key)
            .zip(responses)
            .collect::<Vec<_>>();
        self.put_batch(batch).await
    }

    /// Remove the entry for a request. Returns whether one existed.
    pub async fn delete_entry(&self, request: &FetchRequest) -> Result<bool, CacheError> {
        let Some(key) = request.cache_key() else {
            return Ok(false);
        };
        let mut index = self.load_index().await?;
        if !index.remove(&key) {
            return Ok(false);
        }
        self.write_index(&index).await?;
        self.prune_bodies(&index).await;
        Ok(true)
    }

    /// Best-effort removal of body files no entry references.
    async fn prune_bodies(&self, index: &CacheIndex) {
        let referenced: HashSet<&str> = index
            .entries
            .iter()
            .map(|entry| entry.body_digest.as_str())
            .collect();

        let bodies = self.bodies_dir();
        let mut dir = match tokio::fs::read_dir(&bodies).await {
            Ok(dir) => dir,
            Err(e) => {
                debug!(cache = %self.name, error = %e, "Skipping body prune");
                return;
            }
        };

        while let Ok(Some(item)) = dir.next_entry().await {
            let file_name = item.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if referenced.contains(name) || name.ends_with(".tmp") {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(item.path()).await {
                debug!(cache = %self.name, file = name, error = %e, "Failed to prune body");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn request(path: &str) -> FetchRequest {
        FetchRequest::get(Url::parse(&format!("http://127.0.0.1:5000{}", path)).expect("url"))
    }

    fn response(body: &str) -> AssetResponse {
        AssetResponse {
            url: "http://127.0.0.1:5000/".to_string(),
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("content-type".to_string(), "text/css".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn storage() -> (tempfile::TempDir, CacheStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = CacheStorage::new(dir.path().join("caches")).expect("storage");
        (dir, storage)
    }

    #[tokio::test]
    async fn test_open_creates_empty_cache() {
        let (_dir, storage) = storage();
        assert!(!storage.has("v1").await.unwrap());

        let cache = storage.open("v1").await.unwrap();
        assert_eq!(cache.name(), "v1");
        assert!(storage.has("v1").await.unwrap());
        assert!(cache.keys().await.unwrap().is_empty());
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_open_existing_keeps_entries() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/static/style.css"), response("body{}")).await.unwrap();

        let reopened = storage.open("v1").await.unwrap();
        assert_eq!(reopened.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_resets_corrupt_index() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/static/style.css"), response("body{}")).await.unwrap();
        tokio::fs::write(cache.index_path(), b"{1: 2}").await.unwrap();

        let reopened = storage.open("v1").await.unwrap();
        assert!(reopened.keys().await.unwrap().is_empty());

        reopened.put(&request("/"), response("index")).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap().len(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/static/style.css"), response("body{}")).await.unwrap();

        let hit = cache.match_request(&request("/static/style.css")).await.unwrap();
        let hit = hit.expect("expected stored response");
        assert_eq!(hit.body, b"body{}");
        assert_eq!(hit.content_type(), Some("text/css"));

        let miss = cache.match_request(&request("/static/other.css")).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_match_ignores_non_get() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/"), response("index")).await.unwrap();

        let mut post = request("/");
        post.method = Method::POST;
        assert!(storage.match_request(&post).await.unwrap().is_none());
        assert!(cache.put(&post, response("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_storage_match_searches_all_caches() {
        let (_dir, storage) = storage();
        let old = storage.open("v0").await.unwrap();
        old.put(&request("/legacy.js"), response("legacy")).await.unwrap();
        storage.open("v1").await.unwrap();

        let hit = storage.match_request(&request("/legacy.js")).await.unwrap();
        assert_eq!(hit.expect("hit").body, b"legacy");
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let (_dir, storage) = storage();
        storage.open("b-first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.open("a-second").await.unwrap();

        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["b-first".to_string(), "a-second".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_cache() {
        let (_dir, storage) = storage();
        storage.open("v1").await.unwrap();
        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_except_sweeps_directories() {
        let (_dir, storage) = storage();
        storage.open("v0").await.unwrap();
        storage.open("v1").await.unwrap();
        let broken = storage.open("broken").await.unwrap();
        tokio::fs::remove_file(broken.index_path()).await.unwrap();
        tokio::fs::write(storage.root().join("registration.json"), b"{}")
            .await
            .unwrap();

        let mut deleted = storage.delete_all_except("v1").await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec![index::dir_name("broken"), "v0".to_string()]);
        assert!(!storage.cache_dir("broken").exists());
        assert!(storage.root().join("registration.json").exists());
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_batch_rejects_duplicates_without_writing() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        let key = request("/a").cache_key().unwrap();

        let result = cache
            .put_batch(vec![(key.clone(), response("1")), (key, response("2"))])
            .await;
        assert!(matches!(result, Err(CacheError::DuplicateRequest(_))));
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_batch_rejects_vary_wildcard() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        let mut varied = response("x");
        varied.headers.push(("Vary".to_string(), "*".to_string()));

        let result = cache.put_batch(vec![(request("/a").cache_key().unwrap(), varied)]).await;
        assert!(matches!(result, Err(CacheError::VaryWildcard(_))));
    }

    #[tokio::test]
    async fn test_replaced_body_is_pruned() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/a"), response("old")).await.unwrap();
        cache.put(&request("/a"), response("new")).await.unwrap();

        let mut files = std::fs::read_dir(cache.bodies_dir()).unwrap();
        let only = files.next().expect("one body").unwrap();
        assert!(files.next().is_none());
        assert_eq!(only.file_name().to_str(), Some(index::digest(b"new").as_str()));
    }

    #[tokio::test]
    async fn test_corrupt_body_detected() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/a"), response("original")).await.unwrap();

        let path = cache.bodies_dir().join(index::digest(b"original"));
        std::fs::write(&path, b"tampered").unwrap();

        let result = cache.match_request(&request("/a")).await;
        assert!(matches!(result, Err(CacheError::CorruptBody { .. })));
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/a"), response("a")).await.unwrap();

        assert!(cache.delete_entry(&request("/a")).await.unwrap());
        assert!(!cache.delete_entry(&request("/a")).await.unwrap());
        assert!(cache.match_request(&request("/a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_summaries() {
        let (_dir, storage) = storage();
        let cache = storage.open("v1").await.unwrap();
        cache.put(&request("/a"), response("12345")).await.unwrap();

        let summaries = storage.summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "v1");
        assert_eq!(summaries[0].entries, 1);
        assert_eq!(summaries[0].total_bytes, 5);
        assert_eq!(summaries[0].age_display(), "just now");
    }
}
