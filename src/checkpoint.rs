//! The checkpoint ledger: which slugs have been archived, and when.
//!
//! A slug in the ledger means its article was fetched and converted at least
//! once. Failed attempts leave no entry, so they are retried on every run.
//!
//! # Lifecycle
//!
//! The ledger is loaded whole before a run, gains entries only for slugs
//! scraped successfully in that run, and is saved whole afterwards. Saving
//! writes a sibling temp file and renames it over the old one, so a crash
//! never leaves a half-written ledger behind.
//!
//! Storage sits behind [`LedgerStore`]; [`JsonLedgerStore`] keeps the
//! ledger as one pretty-printed JSON object keyed by slug.

use crate::error::CheckpointError;
use crate::models::{ArticleRef, CheckpointEntry, ScrapedArticle};
use crate::utils::parse_publish_date;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Slug to [`CheckpointEntry`], ordered by slug so saved files diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    entries: BTreeMap<String, CheckpointEntry>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get(slug).is_some()
    }

    pub fn get(&self, slug: &str) -> Option<&CheckpointEntry> {
        self.entries.get(slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CheckpointEntry)> {
        self.entries.iter()
    }

    /// Articles from `all` that still need scraping, in listing order.
    ///
    /// With `force` everything is pending; otherwise only slugs absent from
    /// the ledger. Checkpointed slugs are never re-scraped incrementally,
    /// even if the remote article changed.
    pub fn pending(&self, all: &[ArticleRef], force: bool) -> Vec<ArticleRef> {
        all.iter()
            .filter(|a| force || !self.contains(&a.slug))
            .cloned()
            .collect()
    }

    /// Record every scraped article, stamped with `scraped_at`.
    pub fn record<'a>(
        &mut self,
        scraped: impl IntoIterator<Item = &'a ScrapedArticle>,
        scraped_at: DateTime<Utc>,
    ) -> usize {
        let mut n = 0;
        for article in scraped {
            self.entries.insert(
                article.slug.clone(),
                CheckpointEntry::from_article(article, scraped_at),
            );
            n += 1;
        }
        n
    }

    /// Newest publish date among all entries that carry a parseable one.
    pub fn most_recent_date(&self) -> Option<NaiveDate> {
        self.entries
            .values()
            .filter_map(|e| e.date.as_deref().and_then(parse_publish_date))
            .max()
    }

    /// Slugs keyed by article URL, for matching against archive sections.
    pub fn slugs_by_url(&self) -> HashMap<&str, &str> {
        self.entries
            .iter()
            .map(|(slug, e)| (e.url.as_str(), slug.as_str()))
            .collect()
    }
}

/// Whether the archive needs a refresh.
///
/// Stale when the archive file is missing, no entry has a usable date, or
/// the newest post is more than `max_age_days` old at `today`.
pub fn is_stale(
    archive_exists: bool,
    checkpoint: &Checkpoint,
    today: NaiveDate,
    max_age_days: i64,
) -> bool {
    if !archive_exists {
        return true;
    }
    match checkpoint.most_recent_date() {
        Some(newest) => (today - newest).num_days() > max_age_days,
        None => true,
    }
}

/// Whole-ledger persistence.
pub trait LedgerStore {
    /// Read the ledger. A missing store is an empty ledger.
    async fn load(&self) -> Result<Checkpoint, CheckpointError>;

    /// Replace the stored ledger with `checkpoint`.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

/// Load a ledger, treating any failure as "start fresh".
pub async fn load_or_empty<S: LedgerStore>(store: &S) -> Checkpoint {
    match store.load().await {
        Ok(cp) => cp,
        Err(e) => {
            warn!(error = %e, "Could not load checkpoint; starting with an empty ledger");
            Checkpoint::new()
        }
    }
}

/// Ledger stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonLedgerStore {
    path: PathBuf,
}

impl JsonLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for JsonLedgerStore {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No checkpoint yet");
                return Ok(Checkpoint::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let checkpoint: Checkpoint =
            serde_json::from_slice(&data).map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        info!(entries = checkpoint.len(), "Loaded checkpoint");
        Ok(checkpoint)
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), entries = checkpoint.len()))]
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(checkpoint).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).await.map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;
        info!("Saved checkpoint");
        Ok(())
    }
}
