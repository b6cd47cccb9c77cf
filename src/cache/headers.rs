//! Conditional request headers built from a cached entry

use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};

/// Canonical spelling of the entity-tag revalidation header
pub const IF_NONE_MATCH_NAME: &str = "If-None-Match";

/// Canonical spelling of the timestamp revalidation header
pub const IF_MODIFIED_SINCE_NAME: &str = "If-Modified-Since";

/// Revalidation headers for the next request to a cached URL
///
/// Validator values are opaque: the entity tag keeps its quotes and the
/// timestamp is passed through without any date parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    /// Value for `If-None-Match`, taken from the stored `etag`
    pub if_none_match: Option<HeaderValue>,
    /// Value for `If-Modified-Since`, taken from the stored `last-modified`
    pub if_modified_since: Option<HeaderValue>,
}

impl ConditionalHeaders {
    /// Returns true when no conditional request should be attempted
    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }

    /// Iterates over the headers using their canonical names
    ///
    /// `If-None-Match` is always yielded before `If-Modified-Since`.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &HeaderValue)> {
        let etag = self
            .if_none_match
            .as_ref()
            .map(|value| (IF_NONE_MATCH_NAME, value));
        let last_modified = self
            .if_modified_since
            .as_ref()
            .map(|value| (IF_MODIFIED_SINCE_NAME, value));
        etag.into_iter().chain(last_modified)
    }

    /// Converts the headers into a `HeaderMap`
    pub fn into_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(value) = self.if_none_match {
            map.insert(IF_NONE_MATCH, value);
        }
        if let Some(value) = self.if_modified_since {
            map.insert(IF_MODIFIED_SINCE, value);
        }
        map
    }
}
