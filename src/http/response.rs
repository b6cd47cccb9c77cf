//! Response descriptor shared by the client and the cache

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};

/// The request that was actually sent
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// HTTP method
    pub method: Method,
    /// Canonical URL, as computed before sending
    pub url: String,
    /// Outgoing headers, conditional headers included
    pub headers: HeaderMap,
}

/// A response together with the request that produced it
///
/// `B` is whatever the body was decoded into: raw bytes straight off the
/// wire, or parsed JSON once the client has decoded it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<B> {
    /// Response status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: B,
    /// The originating request. The cache cannot key a response without it.
    pub request: Option<RequestInfo>,
}

impl<B> ApiResponse<B> {
    /// Canonical URL of the originating request
    pub fn url(&self) -> Option<&str> {
        self.request.as_ref().map(|request| request.url.as_str())
    }

    /// Whether the server answered `304 Not Modified`
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    /// Replaces the body, keeping status, headers and request
    pub fn map_body<T>(self, f: impl FnOnce(B) -> T) -> ApiResponse<T> {
        ApiResponse {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
            request: self.request,
        }
    }
}
