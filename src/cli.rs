//! Command-line interface parsing for ghcache
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the `RequestOptions` the client sends.

use clap::Parser;
use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::http::{RequestOptions, DEFAULT_BASE_URL};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A query parameter is not written as KEY=VALUE
    #[error("Invalid query parameter: '{0}'. Expected KEY=VALUE")]
    InvalidQuery(String),

    /// A header is not written as 'Name: value' or has invalid characters
    #[error("Invalid header: '{0}'. Expected 'Name: value'")]
    InvalidHeader(String),

    /// The repeat count must be at least one
    #[error("Invalid repeat count: {0}. Must be at least 1")]
    InvalidRepeat(u32),
}

/// ghcache - Fetch GitHub API resources with ETag / Last-Modified revalidation
#[derive(Parser, Debug)]
#[command(name = "ghcache")]
#[command(about = "Fetch GitHub API resources, revalidating repeats with conditional requests")]
#[command(version)]
pub struct Cli {
    /// API path to fetch, relative to the base URL (e.g. /repos/rust-lang/rust/issues)
    pub path: String,

    /// Base URL of the API
    #[arg(long, env = "GHCACHE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Query parameter as KEY=VALUE (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Extra request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub header: Vec<String>,

    /// How many times to fetch the path; every fetch after the first revalidates
    #[arg(long, default_value_t = 2)]
    pub repeat: u32,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// The request to send on every attempt
    pub options: RequestOptions,
    /// Number of attempts
    pub repeat: u32,
}

/// Parses a `KEY=VALUE` query argument
///
/// The value may be empty or contain further `=` characters.
pub fn parse_query_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidQuery(s.to_string())),
    }
}

/// Parses a `Name: value` header argument
pub fn parse_header_arg(s: &str) -> Result<(HeaderName, HeaderValue), CliError> {
    let invalid = || CliError::InvalidHeader(s.to_string());

    let (name, value) = s.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((name, value))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the request options to send
    /// * `Err(CliError)` if a query, header or repeat count is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.repeat == 0 {
            return Err(CliError::InvalidRepeat(cli.repeat));
        }

        let mut options =
            RequestOptions::new(cli.path.as_str()).with_base_url(cli.base_url.as_str());

        for arg in &cli.query {
            let (key, value) = parse_query_arg(arg)?;
            options = options.with_query(key, value);
        }

        for arg in &cli.header {
            let (name, value) = parse_header_arg(arg)?;
            options = options.with_header(name, value);
        }

        Ok(StartupConfig {
            options,
            repeat: cli.repeat,
        })
    }
}
