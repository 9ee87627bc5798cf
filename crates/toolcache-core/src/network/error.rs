use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Resource not found: {url}")]
    NotFound { url: String },

    #[error("Server error {status} for {url}: {body}")]
    ServerError { url: String, status: u16, body: String },

    #[error("Bad response {status} for {url}: {body}")]
    BadStatus { url: String, status: u16, body: String },

    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl NetworkError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Error for a response whose status makes it unfit for caching.
    pub fn from_status(url: &str, status: u16, body: &str) -> Self {
        let url = url.to_string();
        match status {
            404 | 410 => NetworkError::NotFound { url },
            500..=599 => NetworkError::ServerError {
                url,
                status,
                body: Self::truncate_body(body),
            },
            _ => NetworkError::BadStatus {
                url,
                status,
                body: Self::truncate_body(body),
            },
        }
    }

    /// HTTP status behind the error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::NotFound { .. } => Some(404),
            NetworkError::ServerError { status, .. } | NetworkError::BadStatus { status, .. } => {
                Some(*status)
            }
            NetworkError::Request(e) => e.status().map(|s| s.as_u16()),
            NetworkError::InvalidUrl { .. } => None,
        }
    }
}
