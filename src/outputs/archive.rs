//! The Markdown archive file.
//!
//! # Modes
//!
//! - **Rebuild** (forced run, or no archive yet): write a fresh file with a
//!   header, then one section per scraped article in listing order. The new
//!   file replaces the old one only once it is fully written.
//! - **Append**: add sections for this run's articles, in listing order, to
//!   the end of the existing file. Earlier content is never re-read or
//!   validated, so drift between the file and the ledger is possible; see
//!   [`crate::outputs::index::reconcile`].
//!
//! # Section Format
//!
//! ```text
//! ## Title
//!
//! *Source: https://example.com/blog/slug | January 5, 2024*
//!
//! Body...
//!
//! ---
//!
//! ```

use crate::config::SiteConfig;
use crate::error::ArchiveError;
use crate::models::{ArticleRef, ScrapedArticle};
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// How this run writes the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Rebuild,
    Append,
}

impl ArchiveMode {
    pub fn select(force: bool, archive_exists: bool) -> Self {
        if force || !archive_exists {
            ArchiveMode::Rebuild
        } else {
            ArchiveMode::Append
        }
    }
}

/// Sole writer of the archive file.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    path: PathBuf,
    title: String,
    listing_url: String,
}

impl ArchiveWriter {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>, listing_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            listing_url: listing_url.into(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config.archive_path(), &config.archive_title, config.listing_url())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Preamble of a rebuilt archive.
    pub fn header(&self) -> String {
        let display = self
            .listing_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        format!(
            "# {}\n\n*Articles from [{}]({})*\n\n---\n\n",
            self.title, display, self.listing_url
        )
    }

    /// Write sections for every article of `refs` present in `scraped`.
    ///
    /// Returns the number of sections written.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), mode = ?mode))]
    pub async fn write(
        &self,
        mode: ArchiveMode,
        refs: &[ArticleRef],
        scraped: &HashMap<String, ScrapedArticle>,
    ) -> Result<usize, ArchiveError> {
        let mut out = String::new();
        if mode == ArchiveMode::Rebuild {
            out.push_str(&self.header());
        }
        let mut n = 0;
        for article in refs.iter().filter_map(|r| scraped.get(&r.slug)) {
            out.push_str(&format_section(article));
            n += 1;
        }

        match mode {
            ArchiveMode::Rebuild => self.replace(out.as_bytes()).await?,
            ArchiveMode::Append => self.append(out.as_bytes()).await?,
        }
        info!(sections = n, "Wrote archive");
        Ok(n)
    }

    async fn replace(&self, bytes: &[u8]) -> Result<(), ArchiveError> {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        let tmp = self.path.with_file_name(name);
        fs::write(&tmp, bytes).await.map_err(|e| self.error(e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| self.error(e))
    }

    async fn append(&self, bytes: &[u8]) -> Result<(), ArchiveError> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.error(e))?;
        file.write_all(bytes).await.map_err(|e| self.error(e))?;
        file.flush().await.map_err(|e| self.error(e))
    }

    /// Read the whole archive back, for indexing.
    pub async fn read(&self) -> Result<Option<String>, ArchiveError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.error(e)),
        }
    }

    fn error(&self, source: std::io::Error) -> ArchiveError {
        ArchiveError {
            path: self.path.clone(),
            source,
        }
    }
}

/// One self-contained archive section.
pub fn format_section(article: &ScrapedArticle) -> String {
    let mut s = String::new();
    writeln!(s, "## {}\n", article.title).unwrap();
    match &article.date {
        Some(date) if !date.is_empty() => writeln!(s, "*Source: {} | {}*\n", article.url, date).unwrap(),
        _ => writeln!(s, "*Source: {}*\n", article.url).unwrap(),
    }
    s.push_str(&article.markdown);
    s.push_str("\n\n---\n\n");
    s
}
