//! Version tag and pre-cache manifest.
//!
//! Bump `CACHE_NAME` on every redeploy that changes a cached asset; the
//! activate handler deletes every cache whose name differs from it.

/// Name of the cache generation created by this build.
pub const CACHE_NAME: &str = "tool-inventory-cache-v1";

/// Assets fetched and stored during install, in request order.
pub const URLS_TO_CACHE: &[&str] = &[
    "/",
    "/static/style.css",
    "/static/fonts/B-NAZANIN.TTF",
    "/static/icons/icon-192.png",
    "/static/icons/icon-512.png",
    "/static/manifest.json",
];

/// Owned copy of the build-time manifest.
pub fn default_manifest() -> Vec<String> {
    URLS_TO_CACHE.iter().map(|url| url.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_order_preserved() {
        let manifest = default_manifest();
        assert_eq!(manifest.len(), 6);
        assert_eq!(manifest[0], "/");
        assert_eq!(manifest[5], "/static/manifest.json");
    }

    #[test]
    fn test_manifest_entries_are_root_relative() {
        assert!(URLS_TO_CACHE.iter().all(|url| url.starts_with('/')));
    }
}
