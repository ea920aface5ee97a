//! Inspection CLI
//!
//! Opens a file-backed cache namespace, runs one command against it and
//! returns a JSON report.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use regex::Regex;
use serde_json::Value;

use crate::cache::Expiry;
use crate::config::CacheConfig;
use crate::models::{AckReport, CountReport, EntryReport, StatsReport, TtlReport};
use crate::service::CacheService;

#[derive(Debug, Parser)]
#[command(name = "mini_cache", version, about = "Inspect and edit a persisted cache")]
pub struct Cli {
    /// Directory holding the persisted entries
    #[arg(long, env = "CACHE_DIR", default_value = ".mini_cache")]
    pub dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Lifetime flags shared by `set` and `expire`.
#[derive(Debug, Clone, clap::Args)]
pub struct TtlArgs {
    /// Lifetime in milliseconds (defaults to the configured TTL)
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Never expire
    #[arg(long, conflicts_with = "ttl_ms")]
    pub no_expiry: bool,
}

impl TtlArgs {
    fn expiry(&self) -> Option<Expiry> {
        if self.no_expiry {
            Some(Expiry::Never)
        } else {
            self.ttl_ms.map(Expiry::millis)
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a value
    Get { key: String },
    /// Store a value (parsed as JSON, or kept as a plain string)
    Set {
        key: String,
        value: String,
        #[command(flatten)]
        ttl: TtlArgs,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a key
    Del { key: String },
    /// List live keys, least recently used first
    Keys,
    /// List entries carrying a tag
    Tag { tag: String },
    /// Delete entries carrying a tag
    DelTag { tag: String },
    /// Delete entries whose key matches a regular expression
    Invalidate { pattern: String },
    /// Show the remaining lifetime of a key
    Ttl { key: String },
    /// Restart a key's lifetime
    Expire {
        key: String,
        #[command(flatten)]
        ttl: TtlArgs,
    },
    /// Show statistics
    Stats,
    /// Remove expired entries now
    Sweep,
    /// Remove every entry in the namespace
    Clear,
}

/// Runs one command against the cache stored under `cli.dir`.
pub async fn run(cli: Cli, mut config: CacheConfig) -> anyhow::Result<Value> {
    config.enable_persistence = true;
    let cache: CacheService<Value> = CacheService::with_file_storage(config, &cli.dir)
        .with_context(|| format!("failed to open cache at {}", cli.dir.display()))?;

    let report = execute(&cache, cli.command).await;
    cache.destroy().await;
    report
}

async fn execute(cache: &CacheService<Value>, command: Command) -> anyhow::Result<Value> {
    let report = match command {
        Command::Get { key } => {
            let value = cache.get(&key).await;
            serde_json::to_value(EntryReport { key, value })?
        }
        Command::Set {
            key,
            value,
            ttl,
            tags,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            cache
                .set(key.as_str(), value, ttl.expiry(), &tags)
                .await
                .with_context(|| format!("failed to set {key}"))?;
            serde_json::to_value(AckReport::new(format!("Key '{key}' set successfully"), true))?
        }
        Command::Del { key } => {
            let deleted = cache.delete(&key).await;
            let message = if deleted {
                format!("Key '{key}' deleted successfully")
            } else {
                format!("Key '{key}' not found")
            };
            serde_json::to_value(AckReport::new(message, deleted))?
        }
        Command::Keys => serde_json::to_value(cache.keys().await)?,
        Command::Tag { tag } => {
            let entries: Vec<EntryReport> = cache
                .get_by_tag(&tag)
                .await
                .into_iter()
                .map(EntryReport::from)
                .collect();
            serde_json::to_value(entries)?
        }
        Command::DelTag { tag } => serde_json::to_value(CountReport {
            removed: cache.delete_by_tag(&tag).await,
        })?,
        Command::Invalidate { pattern } => {
            let regex =
                Regex::new(&pattern).with_context(|| format!("invalid pattern {pattern:?}"))?;
            serde_json::to_value(CountReport {
                removed: cache.invalidate_pattern(&regex).await,
            })?
        }
        Command::Ttl { key } => {
            let ttl = cache.get_ttl(&key).await;
            serde_json::to_value(TtlReport::new(key, ttl))?
        }
        Command::Expire { key, ttl } => {
            let ttl = ttl.expiry().unwrap_or(cache.default_ttl().await);
            let changed = cache.expire(&key, ttl).await;
            let message = if changed {
                format!("Key '{key}' lifetime restarted")
            } else {
                format!("Key '{key}' not found")
            };
            serde_json::to_value(AckReport::new(message, changed))?
        }
        Command::Stats => serde_json::to_value(StatsReport::from(cache.stats().await))?,
        Command::Sweep => serde_json::to_value(CountReport {
            removed: cache.cleanup_expired().await,
        })?,
        Command::Clear => {
            cache.clear().await;
            serde_json::to_value(AckReport::new("Cache cleared", true))?
        }
    };
    Ok(report)
}
