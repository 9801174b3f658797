//! Site and run configuration.
//!
//! Built-in defaults describe the reference blog. An optional YAML file
//! overrides any subset of fields, and command-line flags override both
//! (see [`SiteConfig::apply_cli`]).
//!
//! ```yaml
//! origin: https://chainguard.dev
//! listing_path: /unchained
//! output_dir: output
//! workers: 10
//! timeout_secs: 30
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Everything a run needs to know about the site and the output location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host the listing and articles live on.
    pub origin: String,
    /// Path of the listing; article links are `<listing_path>/<slug>`.
    pub listing_path: String,
    pub output_dir: PathBuf,
    pub archive_file: String,
    pub checkpoint_file: String,
    /// First-level heading of a rebuilt archive.
    pub archive_title: String,
    pub workers: usize,
    pub timeout_secs: u64,
    /// Extra attempts for transient fetch failures. Timeouts are never retried.
    pub retries: usize,
    /// Safety cap on listing pagination.
    pub max_pages: usize,
    pub user_agent: String,
    /// Days after which the newest archived post makes the archive stale.
    pub stale_after_days: i64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://chainguard.dev".to_string(),
            listing_path: "/unchained".to_string(),
            output_dir: PathBuf::from("output"),
            archive_file: "unchained-archive.md".to_string(),
            checkpoint_file: "checkpoint.json".to_string(),
            archive_title: "Unchained Blog Archive".to_string(),
            workers: 10,
            timeout_secs: 30,
            retries: 2,
            max_pages: 200,
            user_agent: "Mozilla/5.0 (compatible; BlogScraper/1.0)".to_string(),
            stale_after_days: 7,
        }
    }
}

impl SiteConfig {
    /// Load overrides from a YAML file on top of the defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded site configuration");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Resolve the effective configuration: defaults, then the YAML file, then flags.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_yaml_file(Path::new(path))?,
            None => Self::default(),
        };
        config.apply_cli(cli)?;
        Ok(config)
    }

    /// Overlay explicitly given command-line values.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(listing) = &cli.listing_url {
            let url = Url::parse(listing).map_err(|source| ConfigError::Url {
                url: listing.clone(),
                source,
            })?;
            self.origin = url.origin().ascii_serialization();
            self.listing_path = url.path().trim_end_matches('/').to_string();
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(retries) = cli.retries {
            self.retries = retries;
        }
        self.workers = self.workers.max(1);
        Ok(())
    }

    /// Absolute URL of the first listing page.
    pub fn listing_url(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), self.listing_path)
    }

    /// URL of listing page `page` (1-based). Page 1 is the bare listing.
    pub fn listing_page_url(&self, page: usize) -> String {
        if page <= 1 {
            self.listing_url()
        } else {
            format!("{}?page={}", self.listing_url(), page)
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.archive_file)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(&self.checkpoint_file)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_describe_reference_site() {
        let c = SiteConfig::default();
        assert_eq!(c.listing_url(), "https://chainguard.dev/unchained");
        assert_eq!(c.listing_page_url(1), "https://chainguard.dev/unchained");
        assert_eq!(
            c.listing_page_url(3),
            "https://chainguard.dev/unchained?page=3"
        );
        assert_eq!(c.archive_path(), PathBuf::from("output/unchained-archive.md"));
        assert_eq!(c.checkpoint_path(), PathBuf::from("output/checkpoint.json"));
        assert_eq!(c.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let c = SiteConfig::from_yaml_str("workers: 4\nlisting_path: /blog\n").unwrap();
        assert_eq!(c.workers, 4);
        assert_eq!(c.listing_path, "/blog");
        assert_eq!(c.timeout_secs, 30);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(SiteConfig::from_yaml_str("").unwrap(), SiteConfig::default());
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let cli = Cli::parse_from([
            "blog_archiver",
            "--listing-url",
            "https://example.com/blog/",
            "--workers",
            "0",
            "-o",
            "/tmp/out",
        ]);
        let mut c = SiteConfig::from_yaml_str("workers: 4\n").unwrap();
        c.apply_cli(&cli).unwrap();
        assert_eq!(c.origin, "https://example.com");
        assert_eq!(c.listing_path, "/blog");
        assert_eq!(c.workers, 1);
        assert_eq!(c.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_bad_listing_url() {
        let cli = Cli::parse_from(["blog_archiver", "--listing-url", "not a url"]);
        let mut c = SiteConfig::default();
        assert!(matches!(c.apply_cli(&cli), Err(ConfigError::Url { .. })));
    }
}
