//! Cache module for conditional HTTP requests
//!
//! This module provides an in-memory cache that remembers responses carrying
//! validator headers (`ETag` / `Last-Modified`) and produces the matching
//! `If-None-Match` / `If-Modified-Since` headers for the next request to the
//! same URL. When the server answers `304 Not Modified`, the stored body is
//! handed back instead of the empty network body.

mod headers;
mod manager;

pub use headers::ConditionalHeaders;
pub use manager::{CacheEntry, CacheError, CacheManager};
