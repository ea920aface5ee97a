//! Mini Cache - inspection tool for a persisted cache namespace
//!
//! Runs one command against the entries mirrored under `--dir` and prints a
//! JSON report to stdout. Logs go to stderr.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_cache::cli::{self, Cli};
use mini_cache::CacheConfig;

/// Main entry point for the Mini Cache CLI.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Parse command line arguments
/// 3. Load cache configuration from environment variables
/// 4. Open the cache, run the command, tear the cache down
/// 5. Print the report
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();

    let config = CacheConfig::from_env();
    debug!(
        "Configuration loaded: max_size={}, default_ttl={:?}, namespace={}, dir={}",
        config.max_size,
        config.default_ttl,
        config.namespace,
        args.dir.display()
    );

    let report = cli::run(args, config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
