use reqwest::{Method, Url};

/// An intercepted outbound request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchRequest {
    /// A bodiless GET, the shape of every manifest request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Key used to look the request up in a cache.
    ///
    /// Only GET requests can match a stored response. The key is the
    /// absolute URL with any fragment removed; the query string is kept.
    pub fn cache_key(&self) -> Option<String> {
        if self.method != Method::GET {
            return None;
        }
        Some(request_key(&self.url))
    }
}

/// Absolute URL without fragment.
pub fn request_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
