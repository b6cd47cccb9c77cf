//! ghcache Library
//!
//! A GitHub API client that avoids re-downloading unchanged resources by
//! revalidating them with `ETag` / `Last-Modified` conditional requests.
//! The `cache` module holds the revalidation logic; `http` is the request
//! façade that consults it around every network call.

pub mod cache;
pub mod cli;
pub mod http;

pub use cache::{CacheEntry, CacheError, CacheManager, ConditionalHeaders};
pub use http::{ApiResponse, FetchError, GithubClient, RequestInfo, RequestOptions};
