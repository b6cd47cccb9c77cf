//! Request options and canonical URL construction
//!
//! The canonical URL computed here doubles as the cache key, so it must come
//! out identical before and after the network call.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Method;
use url::{form_urlencoded, Url};

use super::FetchError;

/// Base URL used unless the caller points at another installation
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Explicitly request v3 of the API
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";

/// Largest page size the API accepts
pub const DEFAULT_PER_PAGE: u32 = 100;

const PER_PAGE_KEY: &str = "per_page";

/// Options describing a single API call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// Base URL the path is appended to. Empty means `path` is absolute.
    pub base_url: String,
    /// Path relative to `base_url`
    pub path: String,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Query parameters, serialized in the order given
    pub query: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            base_url: DEFAULT_BASE_URL.to_string(),
            path: String::new(),
            headers: HeaderMap::new(),
            query: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Creates options for a GET request to `path` on the default base URL
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the HTTP method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Points the request at another base URL (e.g. an enterprise installation)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Adds a request header, replacing any previous value for the name
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a query parameter, replacing any previous value for the key
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Fills in the API defaults the caller did not set
    ///
    /// Adds `Accept: application/vnd.github.v3+json` and `per_page=100`.
    /// Caller query pairs keep their position; missing defaults go last.
    pub fn with_defaults(mut self) -> Self {
        if !self.headers.contains_key(ACCEPT) {
            self.headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        }

        if !self.query.iter().any(|(key, _)| key == PER_PAGE_KEY) {
            self.query.push((PER_PAGE_KEY.to_string(), DEFAULT_PER_PAGE.to_string()));
        }

        self
    }

    /// Computes the canonical URL: `base_url + path`, then `?` and the query
    ///
    /// # Returns
    /// * `Ok(String)` - the URL, also used as the cache key
    /// * `Err(FetchError::AbsolutePath)` - `path` is a full URL while a base URL is set
    pub fn canonical_url(&self) -> Result<String, FetchError> {
        if !self.base_url.is_empty() && Url::parse(&self.path).is_ok() {
            return Err(FetchError::AbsolutePath(self.path.clone()));
        }

        let mut url = format!("{}{}", self.base_url, self.path);

        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            url.push('?');
            url.push_str(&query);
        }

        Ok(url)
    }
}
