//! Spinneret main entry point
//!
//! This is the command-line interface for the Spinneret web spider.

use anyhow::Context;
use clap::{Parser, Subcommand};
use spinneret::apps::{Indexer, LinkChecker, Webmirror};
use spinneret::config::{load_config_with_hash, Config};
use spinneret::crawler::{Crawler, ResponseEvent};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Spinneret: a web spider with pluggable consumers
///
/// Crawls a site starting from one URL and either mirrors it to disk,
/// checks it for broken links, or lists every document it fetched.
#[derive(Parser, Debug)]
#[command(name = "spinneret")]
#[command(version)]
#[command(about = "A web spider that mirrors, checks and indexes sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror a site into a directory
    Mirror {
        /// Start URL
        url: String,

        /// Mirror directory; created if missing
        dir: PathBuf,
    },

    /// Report links answered with 404, grouped by referring page
    Check {
        /// Start URL
        url: String,
    },

    /// Print one line per fetched document
    Index {
        /// Start URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Command::Mirror { url, dir } => handle_mirror(&config, &url, dir, cancel).await,
        Command::Check { url } => handle_check(&config, &url, cancel).await,
        Command::Index { url } => handle_index(&config, &url, cancel).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spinneret=info,warn"),
            1 => EnvFilter::new("spinneret=debug,info"),
            2 => EnvFilter::new("spinneret=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancels the crawl on Ctrl-C; in-flight requests still complete
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing requests in flight");
            cancel.cancel();
        }
    });
}

async fn handle_mirror(
    config: &Config,
    url: &str,
    dir: PathBuf,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut mirror = Webmirror::from_config(&dir, &config.mirror)
        .with_context(|| format!("Failed to open mirror directory {}", dir.display()))?;
    mirror.set_cancellation(cancel.clone());

    let mut crawler = Crawler::from_config(config, mirror)?.with_cancellation(cancel);
    let run = crawler.crawl(url).await?;

    let stats = crawler.app().stats();
    println!("Mirrored {} into {}", url, dir.display());
    println!("  Requests:  {}", run.requests);
    println!("  Written:   {}", stats.written);
    println!("  Linked:    {}", stats.linked);
    println!("  Unchanged: {}", stats.skipped);
    println!("  Aliases:   {}", stats.symlinked);
    println!("  Deleted:   {}", stats.deleted);
    if stats.errors > 0 {
        println!("  Errors:    {}", stats.errors);
    }
    Ok(())
}

async fn handle_check(config: &Config, url: &str, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut crawler = Crawler::from_config(config, LinkChecker::new())?.with_cancellation(cancel);
    let run = crawler.crawl(url).await?;

    let checker = crawler.into_app();
    let report = checker.report();
    if report.is_empty() {
        println!("No broken links found ({} requests)", run.requests);
        return Ok(());
    }

    for (page, links) in report {
        println!("{}", page);
        for link in links {
            if link.link_texts.is_empty() {
                println!("  {}", link.url);
            } else {
                println!("  {} ({})", link.url, link.link_texts.join(", "));
            }
        }
    }
    println!(
        "{} broken links on {} pages",
        checker.broken_links().len(),
        report.len()
    );
    Ok(())
}

async fn handle_index(config: &Config, url: &str, cancel: CancellationToken) -> anyhow::Result<()> {
    let print = |event: &ResponseEvent| {
        println!(
            "{}\t{}\t{}",
            event.request_url,
            event.content_type().as_deref().unwrap_or("-"),
            event.body().len()
        );
    };

    let mut crawler = Crawler::from_config(config, Indexer::new(print))?.with_cancellation(cancel);
    crawler.crawl(url).await?;
    Ok(())
}
