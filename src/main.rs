//! # Blog Archiver
//!
//! Builds and maintains a single Markdown archive of every article on a
//! paginated blog listing, and a checkpoint ledger recording which articles
//! are already in it.
//!
//! ## Usage
//!
//! ```sh
//! blog_archiver            # incremental: only new articles are fetched
//! blog_archiver --force    # re-scrape everything and rebuild the archive
//! blog_archiver --status   # report freshness without touching the network
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: walk the listing pages and collect article links
//! 2. **Diff**: drop slugs already in the checkpoint (unless `--force`)
//! 3. **Scraping**: fetch, extract and clean articles, 10 at a time by default
//! 4. **Output**: save the checkpoint, then rebuild or append to the archive

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod checkpoint;
mod cleanup;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use checkpoint::JsonLedgerStore;
use cli::Cli;
use config::SiteConfig;
use fetch::{HttpFetcher, RetryFetch};
use outputs::archive::ArchiveWriter;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    match try_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = SiteConfig::resolve(&args)?;
    info!(
        listing = %config.listing_url(),
        output_dir = %config.output_dir.display(),
        workers = config.workers,
        "blog_archiver starting up"
    );

    let store = JsonLedgerStore::new(config.checkpoint_path());
    let writer = ArchiveWriter::from_config(&config);

    if args.status {
        let status = pipeline::status(&store, &writer, &config, Utc::now().date_naive()).await;
        println!("Checkpoint entries: {}", status.entries);
        println!("Archive sections:   {}", status.sections);
        match status.newest {
            Some(date) => println!("Newest post:        {}", date.format("%B %-d, %Y")),
            None => println!("Newest post:        unknown"),
        }
        println!("Stale:              {}", if status.stale { "yes" } else { "no" });
        if let Some(post) = status.latest {
            println!("Last archived:      {} <{}>", post.title, post.url);
            if let Some(date) = post.date {
                println!("                    {date}");
            }
            println!(
                "                    {} words: {}",
                post.content.split_whitespace().count(),
                post.excerpt.replace('\n', " ")
            );
        }
        println!("Checkpoint file:    {}", store.path().display());
        println!("Archive file:       {}", writer.path().display());
        return Ok(());
    }

    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let fetcher = RetryFetch::new(
        HttpFetcher::from_config(&config)?,
        config.retries,
        Duration::from_secs(1),
    );
    let summary = pipeline::run(&fetcher, &store, &writer, &config, args.force).await?;

    let elapsed = start_time.elapsed();
    info!(
        discovered = summary.discovered,
        scraped = summary.scraped,
        failed = summary.failed,
        written = summary.written,
        checkpoint_saved = summary.checkpoint_saved,
        drift = !summary.drift.is_clean(),
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
