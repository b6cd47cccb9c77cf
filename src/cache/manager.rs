//! Cache manager for conditional request revalidation
//!
//! Provides a `CacheManager` that keeps the last validation-eligible response
//! per canonical URL in memory and decides whether a `304 Not Modified` answer
//! can be served from it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, ETAG, LAST_MODIFIED};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, trace};

use super::ConditionalHeaders;
use crate::http::{ApiResponse, RequestInfo};

/// Errors raised when the cache is handed a malformed response descriptor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The response does not say which URL it was fetched from
    #[error("response is missing the request URL it was fetched from")]
    MissingRequestUrl,
}

/// A previously observed response that carried at least one validator header
#[derive(Debug, Clone)]
pub struct CacheEntry<B> {
    /// Canonical URL the entry is stored under
    pub url: String,
    /// The request that produced the response
    pub request: RequestInfo,
    /// Full response header set
    pub headers: HeaderMap,
    /// Parsed response body
    pub body: B,
    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
}

impl<B> CacheEntry<B> {
    /// Stored entity tag, if the response had one
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    /// Stored last-modified timestamp, if the response had one
    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok())
    }
}

/// In-memory store of revalidation metadata keyed by canonical URL
///
/// Cloning a `CacheManager` yields another handle to the same store, so one
/// instance can be shared by every client that should see the same entries.
/// Separately constructed managers never share state.
///
/// Lookups take a shared lock; `save` and `clear` take an exclusive one. An
/// entry is built before the lock is acquired, so a concurrent reader sees
/// either the old entry or the new one, never a mix.
#[derive(Debug)]
pub struct CacheManager<B = Value> {
    entries: Arc<RwLock<HashMap<String, Arc<CacheEntry<B>>>>>,
}

impl<B> Clone for CacheManager<B> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<B> Default for CacheManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> CacheManager<B> {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the entry stored for `url`
    ///
    /// The key must match byte-for-byte the URL used at store time; no
    /// normalization is applied.
    pub fn lookup(&self, url: &str) -> Option<Arc<CacheEntry<B>>> {
        let entry = self.entries.read().get(url).cloned();
        trace!(url, hit = entry.is_some(), "Cache lookup");
        entry
    }

    /// Determines whether a response can be answered from the cache
    ///
    /// True only for a `304 Not Modified` response whose URL has a stored
    /// entry. The response body is never inspected, so any body type works.
    ///
    /// # Returns
    /// * `Ok(bool)` - whether the stored body should replace the network body
    /// * `Err(CacheError::MissingRequestUrl)` - a 304 without request URL
    pub fn is_hit<R>(&self, response: &ApiResponse<R>) -> Result<bool, CacheError> {
        if response.status != StatusCode::NOT_MODIFIED {
            return Ok(false);
        }

        let url = request_info(response)?.url.as_str();
        let hit = self.entries.read().contains_key(url);
        debug!(url, hit, "Revalidation answered with 304");
        Ok(hit)
    }

    /// Returns the conditional headers for the next request to `url`
    ///
    /// Empty when nothing is cached for the URL. Both headers are produced
    /// when the entry holds both validators.
    pub fn headers_for(&self, url: &str) -> ConditionalHeaders {
        let entries = self.entries.read();
        let Some(entry) = entries.get(url) else {
            return ConditionalHeaders::default();
        };

        ConditionalHeaders {
            if_none_match: entry.headers.get(ETAG).cloned(),
            if_modified_since: entry.headers.get(LAST_MODIFIED).cloned(),
        }
    }

    /// Removes every entry
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        debug!(entries = entries.len(), "Clearing cache");
        entries.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<B: Clone> CacheManager<B> {
    /// Stores a response if it carries an `etag` or `last-modified` header
    ///
    /// Any existing entry for the same URL is replaced. Responses without a
    /// validator are ignored. Callers must not pass a 304 they treated as a
    /// hit, or the cached body would be overwritten with the empty one.
    ///
    /// # Returns
    /// * `Ok(true)` if the response was stored
    /// * `Ok(false)` if it had no validator header
    /// * `Err(CacheError::MissingRequestUrl)` if it has no request URL
    pub fn save(&self, response: &ApiResponse<B>) -> Result<bool, CacheError> {
        let request = request_info(response)?;
        let url = request.url.as_str();

        if !response.headers.contains_key(ETAG) && !response.headers.contains_key(LAST_MODIFIED) {
            debug!(url, status = %response.status, "Response has no validator, not caching");
            return Ok(false);
        }

        let entry = Arc::new(CacheEntry {
            url: url.to_string(),
            request: request.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: Utc::now(),
        });

        let replaced = self
            .entries
            .write()
            .insert(url.to_string(), entry)
            .is_some();
        debug!(url, replaced, "Cached response");
        Ok(true)
    }
}

/// Returns the request a response was fetched with, which carries its canonical URL
fn request_info<R>(response: &ApiResponse<R>) -> Result<&RequestInfo, CacheError> {
    match &response.request {
        Some(request) => Ok(request),
        None => {
            error!(status = %response.status, "Response handed to cache without request URL");
            Err(CacheError::MissingRequestUrl)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use reqwest::Method;
    use serde_json::json;
    use std::thread;

    const ISSUES_URL: &str = "https://api.github.com/repos/foo/bar/issues";
    const ETAG_VALUE: &str = "\"cbc1848fe79da708cfb493bedac55c60\"";
    const LAST_MODIFIED_VALUE: &str = "Thu, 05 Jul 2012 15:31:30 GMT";

    fn response(
        url: &str,
        status: StatusCode,
        headers: &[(&'static str, &str)],
        body: Value,
    ) -> ApiResponse<Value> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        ApiResponse {
            status,
            headers: map,
            body,
            request: Some(RequestInfo {
                method: Method::GET,
                url: url.to_string(),
                headers: HeaderMap::new(),
            }),
        }
    }

    fn ok_with(headers: &[(&'static str, &str)], body: Value) -> ApiResponse<Value> {
        response(ISSUES_URL, StatusCode::OK, headers, body)
    }

    fn not_modified(url: &str) -> ApiResponse<Value> {
        response(url, StatusCode::NOT_MODIFIED, &[], Value::Null)
    }

    fn header_pairs(headers: &ConditionalHeaders) -> Vec<(&'static str, String)> {
        headers
            .iter()
            .map(|(name, value)| (name, value.to_str().unwrap().to_string()))
            .collect()
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache: CacheManager = CacheManager::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_clear_on_empty_cache_keeps_it_empty() {
        let cache: CacheManager = CacheManager::new();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_without_validators_is_a_noop() {
        let cache = CacheManager::new();

        let stored = cache.save(&ok_with(
            &[("content-type", "application/json")],
            json!({"hello": "world"}),
        ));

        assert_eq!(stored, Ok(false));
        assert!(cache.is_empty());
        assert!(cache.lookup(ISSUES_URL).is_none());
    }

    #[test]
    fn test_save_with_etag_stores_headers_and_body() {
        let cache = CacheManager::new();
        let response = ok_with(&[("etag", ETAG_VALUE)], json!({"hello": "world"}));

        assert_eq!(cache.save(&response), Ok(true));

        let entry = cache.lookup(ISSUES_URL).expect("entry should be stored");
        assert_eq!(entry.url, ISSUES_URL);
        assert_eq!(entry.body, json!({"hello": "world"}));
        assert_eq!(entry.headers, response.headers);
        assert_eq!(entry.etag(), Some(ETAG_VALUE));
        assert_eq!(entry.last_modified(), None);
        assert_eq!(entry.request.url, ISSUES_URL);
    }

    #[test]
    fn test_save_with_last_modified_stores_entry() {
        let cache = CacheManager::new();
        let response = ok_with(
            &[("last-modified", LAST_MODIFIED_VALUE)],
            json!({"hello": "world"}),
        );

        assert_eq!(cache.save(&response), Ok(true));

        let entry = cache.lookup(ISSUES_URL).expect("entry should be stored");
        assert_eq!(entry.last_modified(), Some(LAST_MODIFIED_VALUE));
        assert_eq!(entry.body, json!({"hello": "world"}));
    }

    #[test]
    fn test_save_keeps_non_validator_headers() {
        let cache = CacheManager::new();
        let response = ok_with(
            &[("etag", ETAG_VALUE), ("x-ratelimit-remaining", "59")],
            json!([]),
        );

        cache.save(&response).unwrap();

        let entry = cache.lookup(ISSUES_URL).unwrap();
        assert_eq!(entry.headers.get("x-ratelimit-remaining").unwrap(), "59");
    }

    #[test]
    fn test_save_accepts_any_status() {
        let cache = CacheManager::new();
        let response = response(
            ISSUES_URL,
            StatusCode::NOT_FOUND,
            &[("etag", ETAG_VALUE)],
            json!({"message": "Not Found"}),
        );

        assert_eq!(cache.save(&response), Ok(true));
        assert!(cache.lookup(ISSUES_URL).is_some());
    }

    #[test]
    fn test_save_replaces_existing_entry() {
        let cache = CacheManager::new();

        cache
            .save(&ok_with(
                &[("etag", "\"first\""), ("last-modified", LAST_MODIFIED_VALUE)],
                json!({"n": 1}),
            ))
            .unwrap();
        cache.save(&ok_with(&[("etag", "\"second\"")], json!({"n": 2}))).unwrap();

        let entry = cache.lookup(ISSUES_URL).unwrap();
        assert_eq!(entry.body, json!({"n": 2}));
        assert_eq!(entry.etag(), Some("\"second\""));
        // No merge with the previous entry's headers
        assert_eq!(entry.last_modified(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_save_without_request_url_is_an_error() {
        let cache = CacheManager::new();
        let mut response = ok_with(&[("etag", ETAG_VALUE)], json!({}));
        response.request = None;

        assert_eq!(cache.save(&response), Err(CacheError::MissingRequestUrl));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_requires_exact_url() {
        let cache = CacheManager::new();
        cache.save(&ok_with(&[("etag", ETAG_VALUE)], json!({}))).unwrap();

        assert!(cache.lookup(ISSUES_URL).is_some());
        assert!(cache.lookup(&format!("{}/", ISSUES_URL)).is_none());
        assert!(cache.lookup("https://API.github.com/repos/foo/bar/issues").is_none());
        assert!(cache.lookup("https://api.github.com/repos/foo/bar").is_none());
    }

    #[test]
    fn test_query_strings_are_independent_keys() {
        let cache = CacheManager::new();
        let page1 = "https://api.github.com/issues?page=1";
        let page2 = "https://api.github.com/issues?page=2";

        cache
            .save(&response(page1, StatusCode::OK, &[("etag", "\"p1\"")], json!({"page": 1})))
            .unwrap();

        assert!(cache.lookup(page1).is_some());
        assert!(cache.lookup(page2).is_none());

        cache
            .save(&response(page2, StatusCode::OK, &[("etag", "\"p2\"")], json!({"page": 2})))
            .unwrap();

        assert_eq!(cache.lookup(page1).unwrap().body, json!({"page": 1}));
        assert_eq!(cache.lookup(page2).unwrap().body, json!({"page": 2}));
    }

    #[test]
    fn test_is_hit_truth_table() {
        let cache = CacheManager::new();
        let other_url = "https://api.github.com/repos/foo/baz/issues";
        cache.save(&ok_with(&[("etag", ETAG_VALUE)], json!({}))).unwrap();

        // 304 + present
        assert_eq!(cache.is_hit(&not_modified(ISSUES_URL)), Ok(true));
        // 304 + absent
        assert_eq!(cache.is_hit(&not_modified(other_url)), Ok(false));
        // non-304 + present
        assert_eq!(cache.is_hit(&ok_with(&[], Value::Null)), Ok(false));
        // non-304 + absent
        assert_eq!(
            cache.is_hit(&response(other_url, StatusCode::OK, &[], Value::Null)),
            Ok(false)
        );
    }

    #[test]
    fn test_is_hit_ignores_body_type() {
        let cache: CacheManager = CacheManager::new();
        cache.save(&ok_with(&[("etag", ETAG_VALUE)], json!({}))).unwrap();

        let raw = not_modified(ISSUES_URL).map_body(|_| Vec::<u8>::new());

        assert_eq!(cache.is_hit(&raw), Ok(true));
    }

    #[test]
    fn test_is_hit_without_request_url() {
        let cache: CacheManager = CacheManager::new();

        let mut response = not_modified(ISSUES_URL);
        response.request = None;
        assert_eq!(cache.is_hit(&response), Err(CacheError::MissingRequestUrl));

        // A non-304 is decided before the URL is needed
        let mut response = ok_with(&[], Value::Null);
        response.request = None;
        assert_eq!(cache.is_hit(&response), Ok(false));
    }

    #[test]
    fn test_headers_for_missing_entry_is_empty() {
        let cache: CacheManager = CacheManager::new();
        assert!(cache.headers_for(ISSUES_URL).is_empty());
    }

    #[test]
    fn test_headers_for_etag_only() {
        let cache = CacheManager::new();
        cache.save(&ok_with(&[("etag", ETAG_VALUE)], json!({}))).unwrap();

        assert_eq!(
            header_pairs(&cache.headers_for(ISSUES_URL)),
            vec![("If-None-Match", ETAG_VALUE.to_string())]
        );
    }

    #[test]
    fn test_headers_for_last_modified_only() {
        let cache = CacheManager::new();
        cache
            .save(&ok_with(&[("last-modified", LAST_MODIFIED_VALUE)], json!({})))
            .unwrap();

        assert_eq!(
            header_pairs(&cache.headers_for(ISSUES_URL)),
            vec![("If-Modified-Since", LAST_MODIFIED_VALUE.to_string())]
        );
    }

    #[test]
    fn test_headers_for_both_validators() {
        let cache = CacheManager::new();
        cache
            .save(&ok_with(
                &[("etag", ETAG_VALUE), ("last-modified", LAST_MODIFIED_VALUE)],
                json!({}),
            ))
            .unwrap();

        assert_eq!(
            header_pairs(&cache.headers_for(ISSUES_URL)),
            vec![
                ("If-None-Match", ETAG_VALUE.to_string()),
                ("If-Modified-Since", LAST_MODIFIED_VALUE.to_string()),
            ]
        );
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let cache = CacheManager::new();
        cache.save(&ok_with(&[("etag", ETAG_VALUE)], json!({}))).unwrap();
        cache
            .save(&response(
                "https://api.github.com/user",
                StatusCode::OK,
                &[("etag", "\"u\"")],
                json!({}),
            ))
            .unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();

        assert!(cache.lookup(ISSUES_URL).is_none());
        assert!(cache.lookup("https://api.github.com/user").is_none());
        assert!(cache.headers_for(ISSUES_URL).is_empty());
        assert_eq!(cache.is_hit(&not_modified(ISSUES_URL)), Ok(false));
    }

    #[test]
    fn test_clones_share_state_but_new_caches_do_not() {
        let cache = CacheManager::new();
        let handle = cache.clone();
        let independent: CacheManager = CacheManager::new();

        handle.save(&ok_with(&[("etag", ETAG_VALUE)], json!({}))).unwrap();

        assert!(cache.lookup(ISSUES_URL).is_some());
        assert!(independent.lookup(ISSUES_URL).is_none());
    }

    #[test]
    fn test_revalidation_scenario() {
        let cache = CacheManager::new();
        let url = "https://api.example.com/issues";

        cache
            .save(&response(url, StatusCode::OK, &[("etag", "\"abc\"")], json!({"n": 1})))
            .unwrap();

        assert_eq!(
            header_pairs(&cache.headers_for(url)),
            vec![("If-None-Match", "\"abc\"".to_string())]
        );
        assert_eq!(cache.is_hit(&not_modified(url)), Ok(true));
        assert_eq!(cache.lookup(url).unwrap().body, json!({"n": 1}));
    }

    #[test]
    fn test_concurrent_saves_never_mix_entries() {
        let cache = CacheManager::new();

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let tag = format!("\"{}\"", i);
                        cache
                            .save(&ok_with(&[("etag", tag.as_str())], json!({ "writer": i })))
                            .unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            if let Some(entry) = cache.lookup(ISSUES_URL) {
                let writer = entry.body["writer"].as_i64().unwrap();
                assert_eq!(entry.etag(), Some(format!("\"{}\"", writer).as_str()));
            }
        }

        for writer in writers {
            writer.join().unwrap();
        }

        let entry = cache.lookup(ISSUES_URL).unwrap();
        let writer = entry.body["writer"].as_i64().unwrap();
        assert_eq!(entry.etag(), Some(format!("\"{}\"", writer).as_str()));
        assert_eq!(cache.len(), 1);
    }
}
