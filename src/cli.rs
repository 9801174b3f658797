//! Command-line interface definitions for the blog archiver.
//!
//! Every option can also come from an environment variable. Options left
//! unset fall back to the YAML config file (`--config`) and then to the
//! built-in defaults in [`crate::config::SiteConfig`].

use clap::Parser;

/// Command-line arguments for the blog archiver.
///
/// # Examples
///
/// ```sh
/// # Incremental run: only articles missing from the checkpoint are fetched
/// blog_archiver
///
/// # Rebuild the archive from scratch
/// blog_archiver --force
///
/// # Report archive freshness without touching the network
/// blog_archiver --status
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Re-scrape all posts and rebuild the archive from scratch
    #[arg(short, long)]
    pub force: bool,

    /// Print checkpoint and archive freshness, then exit
    #[arg(long, conflicts_with = "force")]
    pub status: bool,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "BLOG_ARCHIVER_CONFIG")]
    pub config: Option<String>,

    /// Directory holding the archive and checkpoint files
    #[arg(short, long, env = "BLOG_ARCHIVER_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Absolute URL of the first listing page
    #[arg(long, env = "BLOG_ARCHIVER_LISTING_URL")]
    pub listing_url: Option<String>,

    /// Number of articles fetched concurrently
    #[arg(short, long, env = "BLOG_ARCHIVER_WORKERS")]
    pub workers: Option<usize>,

    /// Absolute timeout for each fetch, in seconds
    #[arg(long, env = "BLOG_ARCHIVER_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Extra attempts for transient fetch failures
    #[arg(long, env = "BLOG_ARCHIVER_RETRIES")]
    pub retries: Option<usize>,
}
