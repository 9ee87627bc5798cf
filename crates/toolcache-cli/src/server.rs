//! Local intercepting server.
//!
//! Every request the browser sends to the listen address goes through
//! `OfflineWorker::handle_fetch`: cached assets come back from disk, anything
//! else is forwarded to the origin and returned as received.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use toolcache_core::{FetchOutcome, FetchRequest, OfflineWorker};

/// Largest request body accepted for forwarding (form posts, uploads).
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Header reporting whether a response came from the cache.
const CACHE_STATUS_HEADER: &str = "x-toolcache";

/// Response headers tied to the original connection. The body is re-framed
/// by the server, so these are not copied.
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "transfer-encoding",
];

pub fn router(worker: Arc<OfflineWorker>) -> Router {
    Router::new().fallback(intercept).with_state(worker)
}

pub async fn serve(worker: Arc<OfflineWorker>, listen: &str) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;

    info!(listen = listen, origin = %worker.network().origin(), "Serving");

    axum::serve(listener, router(worker))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn intercept(State(worker): State<Arc<OfflineWorker>>, request: Request) -> Response {
    let request = match to_fetch_request(&worker, request).await {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match worker.handle_fetch(&request).await {
        Ok(outcome) => to_response(outcome),
        Err(e) => {
            warn!(method = %request.method, url = %request.url, error = %e, "Fetch failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn to_fetch_request(worker: &OfflineWorker, request: Request) -> Result<FetchRequest> {
    let (parts, body) = request.into_parts();

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    if !path.starts_with('/') || path.starts_with("//") {
        anyhow::bail!("Request target must be a path: {}", path);
    }
    let url = worker.network().resolve(path)?;

    let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .with_context(|| format!("Unsupported method {}", parts.method))?;

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = to_bytes(body, MAX_REQUEST_BODY_BYTES)
        .await
        .context("Failed to read request body")?
        .to_vec();

    Ok(FetchRequest {
        method,
        url,
        headers,
        body,
    })
}

fn to_response(outcome: FetchOutcome) -> Response {
    let FetchOutcome { response, source } = outcome;

    let Ok(status) = StatusCode::from_u16(response.status) else {
        return (
            StatusCode::BAD_GATEWAY,
            format!("Invalid upstream status {}", response.status),
        )
            .into_response();
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        if SKIPPED_RESPONSE_HEADERS
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(name))
        {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => debug!(header = %name, "Dropping unrepresentable header"),
        }
    }
    builder = builder.header(CACHE_STATUS_HEADER, source.as_str());

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
}
