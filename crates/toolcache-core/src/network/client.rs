//! HTTP client for the tool inventory origin.
//!
//! Manifest paths are resolved against the configured origin. Responses are
//! buffered in full and converted to `AssetResponse` without touching the
//! status, headers or body.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{header, Client, Method, Url};
use tracing::debug;

use crate::models::{AssetResponse, FetchRequest};

use super::NetworkError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("toolcache/", env!("CARGO_PKG_VERSION"));

/// Request headers that describe the hop to the interceptor rather than the
/// request itself. The client sets its own values for these.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client for the application origin.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
    /// Same settings as `client` but never follows redirects, so forwarded
    /// responses reach the caller exactly as the origin sent them.
    forward: Client,
    origin: Url,
}

impl NetworkClient {
    /// Create a client for the given origin, e.g. `http://127.0.0.1:5000`.
    pub fn new(origin: &str) -> Result<Self, NetworkError> {
        let origin = Url::parse(origin).map_err(|e| NetworkError::InvalidUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl {
                url: origin.to_string(),
                reason: "origin must be http or https".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        let forward = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            forward,
            origin,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a root-relative path (or absolute URL) against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, NetworkError> {
        self.origin.join(path).map_err(|e| NetworkError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send a request and return whatever the server answered.
    ///
    /// Any status is a successful result here; only transport failures are
    /// errors. Redirects are returned as-is rather than followed.
    pub async fn send(&self, request: &FetchRequest) -> Result<AssetResponse, NetworkError> {
        Self::execute(&self.forward, request).await
    }

    async fn execute(client: &Client, request: &FetchRequest) -> Result<AssetResponse, NetworkError> {
        let mut builder = client.request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            if is_hop_by_hop(name) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !request.body.is_empty() && request.method != Method::GET {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let response = Self::into_asset_response(response).await?;
        debug!(method = %request.method, url = %request.url, status = response.status, "Network response");
        Ok(response)
    }

    /// GET a single asset for caching. Non-OK statuses are errors, the same
    /// rule `Cache.addAll` applies.
    pub async fn fetch_asset(&self, url: &Url) -> Result<AssetResponse, NetworkError> {
        let response = Self::execute(&self.client, &FetchRequest::get(url.clone())).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            let body = String::from_utf8_lossy(&response.body);
            Err(NetworkError::from_status(url.as_str(), response.status, &body))
        }
    }

    async fn into_asset_response(response: reqwest::Response) -> Result<AssetResponse, NetworkError> {
        let status = response.status();
        let url = response.url().to_string();
        let headers = header_pairs(response.headers());
        let body = response.bytes().await?.to_vec();

        Ok(AssetResponse {
            url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

fn header_pairs(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
