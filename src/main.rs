//! ghcache - Fetch GitHub API resources with conditional revalidation
//!
//! Fetches one API path several times through a single client. The first
//! fetch goes to the network; later ones send the stored validators and are
//! answered from the cache when the server replies `304 Not Modified`.

use std::process::ExitCode;

use clap::Parser;
use reqwest::StatusCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghcache::cli::{Cli, StartupConfig};
use ghcache::{CacheManager, GithubClient};

/// Initialize the tracing subscriber for logging.
///
/// `--debug` forces `ghcache=debug`; otherwise `RUST_LOG` is honored, and the
/// default is `ghcache=warn`. Logs go to stderr so stdout stays parseable.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("ghcache=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ghcache=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Formats one line per attempt, e.g. `#2 304 Not Modified (cache)`
///
/// `from_cache` must only be set when the body came out of the cache; a 304
/// with nothing cached still reports `network`.
fn describe_attempt(attempt: u32, status: StatusCode, from_cache: bool) -> String {
    let source = if from_cache { "cache" } else { "network" };
    format!("#{} {} ({})", attempt, status, source)
}

async fn run(config: StartupConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = GithubClient::new(CacheManager::new())?;
    let url = config.options.clone().with_defaults().canonical_url()?;

    let mut last = None;
    for attempt in 1..=config.repeat {
        let cached = client.cache().lookup(&url).is_some();
        let response = client.fetch(config.options.clone()).await?;
        let from_cache = cached && response.is_not_modified();
        println!("{}", describe_attempt(attempt, response.status, from_cache));
        last = Some(response);
    }

    if let Some(response) = last {
        println!("{}", serde_json::to_string_pretty(&response.body)?);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("ghcache starting with args: {:?}", cli);

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
