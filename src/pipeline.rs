//! One archive run, end to end.
//!
//! ```text
//! load ledger -> discover -> diff -> scrape -> record -> save ledger
//!             -> write archive -> reconcile
//! ```
//!
//! The ledger and archive are only touched before and after the concurrent
//! scrape, so neither needs locking. The ledger is saved before the archive
//! is written; if the run dies in between, the next incremental run will not
//! re-emit those articles, which the drift report then flags.

use crate::checkpoint::{Checkpoint, LedgerStore, is_stale, load_or_empty};
use crate::config::SiteConfig;
use crate::error::DiscoveryError;
use crate::fetch::PageFetcher;
use crate::outputs::archive::{ArchiveMode, ArchiveWriter};
use crate::outputs::index::{ArchivedPost, Drift, parse_archive, reconcile};
use crate::scrapers::{listing, pool};
use chrono::{NaiveDate, Utc};
use tracing::{error, info, instrument, warn};

/// What a run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub pending: usize,
    pub scraped: usize,
    pub failed: usize,
    /// Sections written to the archive this run.
    pub written: usize,
    /// `None` when the archive was left untouched.
    pub mode: Option<ArchiveMode>,
    pub checkpoint_saved: bool,
    pub archive_written: bool,
    pub drift: Drift,
}

/// Run discovery, scraping and persistence once.
///
/// # Errors
///
/// Only discovery failures are fatal: the first listing page could not be
/// fetched, or the listing held no articles. Per-article and persistence
/// failures are logged and reflected in the returned [`RunSummary`].
#[instrument(level = "info", skip_all, fields(force = force))]
pub async fn run<F, S>(
    fetcher: &F,
    store: &S,
    writer: &ArchiveWriter,
    config: &SiteConfig,
    force: bool,
) -> Result<RunSummary, DiscoveryError>
where
    F: PageFetcher,
    S: LedgerStore,
{
    let mut checkpoint = load_or_empty(store).await;

    let all = listing::discover(fetcher, config).await?;
    if all.is_empty() {
        return Err(DiscoveryError::NoArticles {
            url: config.listing_url(),
        });
    }

    // A rebuilt archive must hold every listed article, so a missing archive
    // discards the ledger just like `--force`.
    let mode = ArchiveMode::select(force, writer.exists().await);
    let rebuild = mode == ArchiveMode::Rebuild;
    if rebuild {
        if !force && !checkpoint.is_empty() {
            warn!(known = checkpoint.len(), "Archive file is missing; rebuilding from scratch");
        }
        checkpoint = Checkpoint::new();
    }
    let pending = checkpoint.pending(&all, rebuild);
    let mut summary = RunSummary {
        discovered: all.len(),
        pending: pending.len(),
        ..RunSummary::default()
    };

    if pending.is_empty() {
        info!(known = checkpoint.len(), "All posts up to date");
        summary.drift = check_drift(writer, &checkpoint).await;
        return Ok(summary);
    }
    info!(
        pending = pending.len(),
        cached = all.len() - pending.len(),
        ?mode,
        "Scraping posts"
    );

    let scraped = pool::scrape_all(fetcher, &pending, config.workers).await;
    summary.scraped = scraped.len();
    summary.failed = pending.len() - scraped.len();

    checkpoint.record(scraped.values(), Utc::now());
    match store.save(&checkpoint).await {
        Ok(()) => summary.checkpoint_saved = true,
        Err(e) => warn!(error = %e, "Could not save checkpoint; the next run may redo this work"),
    }

    summary.mode = Some(mode);
    match writer.write(mode, &all, &scraped).await {
        Ok(n) => {
            summary.written = n;
            summary.archive_written = true;
            match mode {
                ArchiveMode::Rebuild => info!(sections = n, path = %writer.path().display(), "Archive rebuilt"),
                ArchiveMode::Append => info!(sections = n, path = %writer.path().display(), "New posts appended"),
            }
        }
        Err(e) => error!(error = %e, "Could not write archive"),
    }

    summary.drift = check_drift(writer, &checkpoint).await;
    Ok(summary)
}

async fn check_drift(writer: &ArchiveWriter, checkpoint: &Checkpoint) -> Drift {
    let text = match writer.read().await {
        Ok(text) => text.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Could not read archive for reconciliation");
            return Drift::default();
        }
    };
    let drift = reconcile(checkpoint, &parse_archive(&text));
    drift.report();
    drift
}

/// Freshness of the archive, computed without touching the network.
#[derive(Debug, PartialEq, Eq)]
pub struct Status {
    pub entries: usize,
    pub sections: usize,
    pub newest: Option<NaiveDate>,
    pub stale: bool,
    /// Last section of the archive file.
    pub latest: Option<ArchivedPost>,
}

pub async fn status<S: LedgerStore>(
    store: &S,
    writer: &ArchiveWriter,
    config: &SiteConfig,
    today: NaiveDate,
) -> Status {
    let checkpoint = load_or_empty(store).await;
    let text = writer.read().await.ok().flatten();
    let mut posts = text.as_deref().map(parse_archive).unwrap_or_default();
    Status {
        entries: checkpoint.len(),
        sections: posts.len(),
        newest: checkpoint.most_recent_date(),
        stale: is_stale(text.is_some(), &checkpoint, today, config.stale_after_days),
        latest: posts.pop(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::JsonLedgerStore;
    use crate::fetch::tests::StubFetcher;
    use std::path::Path;

    fn config(dir: &Path) -> SiteConfig {
        SiteConfig {
            origin: "https://example.com".to_string(),
            listing_path: "/blog".to_string(),
            output_dir: dir.to_path_buf(),
            archive_title: "Example Archive".to_string(),
            ..SiteConfig::default()
        }
    }

    fn listing_page(slugs: &[&str], next: bool) -> String {
        let links: String = slugs
            .iter()
            .map(|s| format!(r#"<a href="/blog/{s}">Post {s}</a>"#))
            .collect();
        let button = if next {
            r#"<button aria-label="Go to next page">Next</button>"#
        } else {
            r#"<button aria-label="Go to next page" disabled>Next</button>"#
        };
        format!("<html><body>{links}{button}</body></html>")
    }

    fn article_page(slug: &str) -> String {
        format!(
            "<html><body><article><h1>Post {slug}</h1><time datetime=\"2024-02-0{}\"></time>\
             <p>Body of {slug}, long enough to be taken as the real article content region.</p>\
             </article></body></html>",
            slug.len() % 9 + 1
        )
    }

    fn site(slugs: &[&str]) -> StubFetcher {
        let stub = StubFetcher::new().page("https://example.com/blog", listing_page(slugs, false));
        slugs.iter().fold(stub, |s, slug| {
            s.page(&format!("https://example.com/blog/{slug}"), article_page(slug))
        })
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: SiteConfig,
        store: JsonLedgerStore,
        writer: ArchiveWriter,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        Fixture {
            store: JsonLedgerStore::new(config.checkpoint_path()),
            writer: ArchiveWriter::from_config(&config),
            config,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_first_run_rebuilds_and_is_consistent() {
        let f = fixture();
        let stub = site(&["a", "b", "c"]);
        let summary = run(&stub, &f.store, &f.writer, &f.config, false).await.unwrap();

        assert_eq!(summary.mode, Some(ArchiveMode::Rebuild));
        assert_eq!(summary.written, 3);
        assert!(summary.checkpoint_saved);
        assert!(summary.drift.is_clean());

        let cp = f.store.load().await.unwrap();
        let text = f.writer.read().await.unwrap().unwrap();
        let posts = parse_archive(&text);
        assert_eq!(cp.len(), posts.len());
        for post in &posts {
            assert!(cp.iter().any(|(_, e)| e.url == post.url));
        }
        assert!(text.starts_with("# Example Archive\n"));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent_and_fetches_no_articles() {
        let f = fixture();
        let stub = site(&["a", "b"]);
        run(&stub, &f.store, &f.writer, &f.config, false).await.unwrap();
        let ledger_after_first = std::fs::read(f.store.path()).unwrap();
        let archive_after_first = f.writer.read().await.unwrap();

        let again = site(&["a", "b"]);
        let summary = run(&again, &f.store, &f.writer, &f.config, false).await.unwrap();

        assert_eq!(summary.pending, 0);
        assert_eq!(summary.mode, None);
        assert_eq!(again.calls(), 1, "only the listing page is fetched");
        assert_eq!(std::fs::read(f.store.path()).unwrap(), ledger_after_first);
        assert_eq!(f.writer.read().await.unwrap(), archive_after_first);
    }

    #[tokio::test]
    async fn test_incremental_run_appends_only_new_posts() {
        let f = fixture();
        run(&site(&["a"]), &f.store, &f.writer, &f.config, false).await.unwrap();

        let stub = site(&["new", "a"]);
        let summary = run(&stub, &f.store, &f.writer, &f.config, false).await.unwrap();

        assert_eq!(summary.pending, 1);
        assert_eq!(summary.mode, Some(ArchiveMode::Append));
        assert_eq!(stub.calls_to("https://example.com/blog/a"), 0);
        let posts = parse_archive(&f.writer.read().await.unwrap().unwrap());
        let urls: Vec<_> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, ["https://example.com/blog/a", "https://example.com/blog/new"]);
    }

    #[tokio::test]
    async fn test_failed_article_is_retried_next_run() {
        let f = fixture();
        let slugs = ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8", "p9"];
        let flaky = site(&slugs).timeout("https://example.com/blog/p4");
        let summary = run(&flaky, &f.store, &f.writer, &f.config, false).await.unwrap();
        assert_eq!(summary.scraped, 9);
        assert_eq!(summary.failed, 1);
        let cp = f.store.load().await.unwrap();
        assert_eq!(cp.len(), 9);
        assert!(!cp.contains("p4"));

        let healthy = site(&slugs);
        let summary = run(&healthy, &f.store, &f.writer, &f.config, false).await.unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(healthy.calls_to("https://example.com/blog/p4"), 1);
        assert!(f.store.load().await.unwrap().contains("p4"));
        assert!(summary.drift.is_clean());
    }

    #[tokio::test]
    async fn test_force_rescrapes_everything() {
        let f = fixture();
        run(&site(&["a", "b"]), &f.store, &f.writer, &f.config, false).await.unwrap();

        let stub = site(&["a", "b"]);
        let summary = run(&stub, &f.store, &f.writer, &f.config, true).await.unwrap();
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.mode, Some(ArchiveMode::Rebuild));
        assert_eq!(stub.calls(), 3);
        let posts = parse_archive(&f.writer.read().await.unwrap().unwrap());
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_force_drops_entries_no_longer_listed() {
        let f = fixture();
        run(&site(&["a", "gone"]), &f.store, &f.writer, &f.config, false).await.unwrap();
        run(&site(&["a"]), &f.store, &f.writer, &f.config, true).await.unwrap();
        let cp = f.store.load().await.unwrap();
        assert!(!cp.contains("gone"));
        assert_eq!(cp.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_archive_rebuilds_everything() {
        let f = fixture();
        run(&site(&["a", "b"]), &f.store, &f.writer, &f.config, false).await.unwrap();
        std::fs::remove_file(f.writer.path()).unwrap();

        let stub = site(&["new", "a", "b"]);
        let summary = run(&stub, &f.store, &f.writer, &f.config, false).await.unwrap();
        assert_eq!(summary.mode, Some(ArchiveMode::Rebuild));
        assert_eq!(summary.pending, 3);
        assert_eq!(stub.calls_to("https://example.com/blog/a"), 1);
        assert!(summary.drift.is_clean());

        let cp = f.store.load().await.unwrap();
        let posts = parse_archive(&f.writer.read().await.unwrap().unwrap());
        assert_eq!(cp.len(), 3);
        assert_eq!(posts.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_archive_is_rebuilt_even_when_ledger_is_current() {
        let f = fixture();
        run(&site(&["a", "b"]), &f.store, &f.writer, &f.config, false).await.unwrap();
        std::fs::remove_file(f.writer.path()).unwrap();

        let summary = run(&site(&["a", "b"]), &f.store, &f.writer, &f.config, false).await.unwrap();
        assert_eq!(summary.mode, Some(ArchiveMode::Rebuild));
        assert!(f.writer.exists().await);
        assert_eq!(parse_archive(&f.writer.read().await.unwrap().unwrap()).len(), 2);
        assert!(summary.drift.is_clean());
    }

    #[tokio::test]
    async fn test_unreachable_listing_is_fatal() {
        let f = fixture();
        let stub = StubFetcher::new().timeout("https://example.com/blog");
        let err = run(&stub, &f.store, &f.writer, &f.config, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::FirstPage { .. }));
        assert!(!f.writer.exists().await);
    }

    #[tokio::test]
    async fn test_empty_listing_is_fatal() {
        let f = fixture();
        let stub = site(&[]);
        let err = run(&stub, &f.store, &f.writer, &f.config, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NoArticles { .. }));
    }

    #[tokio::test]
    async fn test_drift_is_reported_not_repaired() {
        let f = fixture();
        run(&site(&["a", "b"]), &f.store, &f.writer, &f.config, false).await.unwrap();

        // Drop "a" from the ledger by hand; the next run re-scrapes and appends it again.
        let b = f.store.load().await.unwrap().get("b").cloned().unwrap();
        std::fs::write(f.store.path(), serde_json::json!({ "b": b }).to_string()).unwrap();

        let summary = run(&site(&["a", "b"]), &f.store, &f.writer, &f.config, false).await.unwrap();
        assert_eq!(summary.mode, Some(ArchiveMode::Append));
        assert_eq!(summary.drift.duplicated_sections, ["https://example.com/blog/a"]);
        let posts = parse_archive(&f.writer.read().await.unwrap().unwrap());
        assert_eq!(posts.len(), 3);
    }

    #[tokio::test]
    async fn test_status_reports_freshness() {
        let f = fixture();
        let today = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        let before = status(&f.store, &f.writer, &f.config, today).await;
        assert_eq!(before.entries, 0);
        assert!(before.stale);

        run(&site(&["a", "bb"]), &f.store, &f.writer, &f.config, false).await.unwrap();
        let after = status(&f.store, &f.writer, &f.config, today).await;
        assert_eq!(after.entries, 2);
        assert_eq!(after.sections, 2);
        assert_eq!(after.newest, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert!(!after.stale);
        assert_eq!(after.latest.unwrap().title, "Post bb");
    }
}
