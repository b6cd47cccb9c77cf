//! Request façade for the GitHub API
//!
//! This module contains the response descriptor handed to the cache, the
//! request options used to build calls, and the client that ties both
//! together with conditional revalidation.

pub mod client;
pub mod options;
pub mod response;

pub use client::{FetchError, GithubClient};
pub use options::{RequestOptions, DEFAULT_ACCEPT, DEFAULT_BASE_URL, DEFAULT_PER_PAGE};
pub use response::{ApiResponse, RequestInfo};
