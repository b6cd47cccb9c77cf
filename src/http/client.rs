//! GitHub API client with conditional request revalidation
//!
//! Every call asks the cache for `If-None-Match` / `If-Modified-Since`
//! headers, and a `304 Not Modified` answer is resolved to the cached body.

use bytes::Bytes;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{ApiResponse, RequestInfo, RequestOptions};
use crate::cache::{CacheError, CacheManager};

/// Errors that can occur when calling the API
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// A full URL was given where a path relative to the base URL is expected
    #[error("'{0}' must be a path when a base URL is set")]
    AbsolutePath(String),

    /// The cache rejected the response descriptor
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Client for the GitHub REST API
///
/// The cache is injected, so several clients can share one cache (or each
/// keep their own, e.g. one per credential set).
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    cache: CacheManager,
}

impl GithubClient {
    /// Create a new GithubClient backed by `cache`
    ///
    /// The underlying HTTP client sends title-cased header names on HTTP/1,
    /// so revalidation headers go out as `If-None-Match` and
    /// `If-Modified-Since`.
    pub fn new(cache: CacheManager) -> Result<Self, FetchError> {
        let client = Client::builder().http1_title_case_headers().build()?;
        Ok(Self::with_client(client, cache))
    }

    /// Create a new GithubClient with a custom HTTP client
    pub fn with_client(client: Client, cache: CacheManager) -> Self {
        Self { client, cache }
    }

    /// The cache this client revalidates against
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Forget every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Perform an API call
    ///
    /// Defaults are applied to `options` first (see
    /// [`RequestOptions::with_defaults`]). On a `304 Not Modified` for a cached
    /// URL the returned response keeps the 304 status and headers but carries
    /// the cached body. Any other response is decoded and offered to the
    /// cache, except a 304 with nothing cached, whose empty body is returned
    /// but never stored.
    ///
    /// Bodies are decoded as JSON. An empty body becomes `null`, and a body
    /// that is not JSON is returned as a string.
    ///
    /// # Returns
    /// * `Ok(ApiResponse<Value>)` - the response, whatever its status
    /// * `Err(FetchError)` - if the options are invalid or the request fails
    pub async fn fetch(&self, options: RequestOptions) -> Result<ApiResponse<Value>, FetchError> {
        let options = options.with_defaults();
        let url = options.canonical_url()?;

        let conditional = self.cache.headers_for(&url);
        let revalidating = !conditional.is_empty();
        let mut headers = options.headers;
        headers.extend(conditional.into_header_map());

        debug!(method = %options.method, url = %url, revalidating, "Sending request");

        let response = self
            .client
            .request(options.method.clone(), &url)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        let response_headers = response.headers().clone();
        let bytes = response.bytes().await?;

        let raw = ApiResponse {
            status,
            headers: response_headers,
            body: bytes,
            request: Some(RequestInfo {
                method: options.method,
                url,
                headers,
            }),
        };

        if self.cache.is_hit(&raw)? {
            // A concurrent clear can empty the cache between the two checks.
            if let Some(entry) = raw.url().and_then(|url| self.cache.lookup(url)) {
                debug!(url = %entry.url, "Serving cached body");
                return Ok(raw.map_body(|_| entry.body.clone()));
            }
        }

        let response = raw.map_body(decode_body);

        // A 304 body is a placeholder; storing it would shadow the real one.
        if response.is_not_modified() {
            debug!(url = ?response.url(), "304 without cached entry, not caching");
        } else {
            self.cache.save(&response)?;
        }

        Ok(response)
    }
}

/// Decodes a response body the way a JSON API client expects
fn decode_body(bytes: Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Response body is not JSON, keeping it as text");
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
