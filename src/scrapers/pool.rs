//! Bounded concurrent article scraping.
//!
//! At most `workers` extractions are in flight at once. Results arrive in
//! completion order and are aggregated by a single consumer; callers restore
//! listing order by iterating their own [`ArticleRef`] sequence.

use crate::fetch::PageFetcher;
use crate::models::{ArticleRef, ScrapedArticle};
use crate::scrapers::article::scrape_article;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, instrument};

/// Successful articles keyed by slug.
pub type ScrapedBySlug = HashMap<String, ScrapedArticle>;

/// Scrape every article with at most `workers` fetches in flight.
///
/// Failures are logged and left out of the returned map, so they are never
/// checkpointed and get retried on the next run. A slug listed twice is
/// scraped once.
#[instrument(level = "info", skip_all, fields(total = refs.len(), workers = workers))]
pub async fn scrape_all<F: PageFetcher>(
    fetcher: &F,
    refs: &[ArticleRef],
    workers: usize,
) -> ScrapedBySlug {
    let unique: Vec<&ArticleRef> = refs.iter().unique_by(|r| r.slug.clone()).collect();
    let total = unique.len();
    let completed = AtomicUsize::new(0);

    let results: Vec<_> = stream::iter(unique)
        .map(|article| {
            let completed = &completed;
            async move {
                let result = scrape_article(fetcher, article).await;
                let n = completed.fetch_add(1, Ordering::Relaxed) + 1;
                match &result.outcome {
                    Ok(_) => info!("[{n}/{total}] {}", article.slug),
                    Err(e) => error!(slug = %article.slug, error = %e, "[{n}/{total}] scrape failed"),
                }
                result
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let scraped: ScrapedBySlug = results
        .into_iter()
        .filter_map(|r| r.outcome.ok())
        .map(|a| (a.slug.clone(), a))
        .collect();

    info!(
        total,
        successful = scraped.len(),
        failed = total - scraped.len(),
        "Completed concurrent scrape"
    );
    scraped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::tests::StubFetcher;
    use std::sync::atomic::AtomicUsize;

    fn article_html(title: &str) -> String {
        format!(
            "<html><body><article><h1>{title}</h1><p>{}</p></article></body></html>",
            "Enough body text to clear the minimum content threshold. ".repeat(3)
        )
    }

    fn refs(n: usize) -> Vec<ArticleRef> {
        (0..n)
            .map(|i| ArticleRef {
                title: format!("Post {i}"),
                url: format!("https://example.com/blog/post-{i}"),
                slug: format!("post-{i}"),
            })
            .collect()
    }

    fn stub_for(refs: &[ArticleRef]) -> StubFetcher {
        refs.iter()
            .fold(StubFetcher::new(), |s, r| s.page(&r.url, article_html(&r.title)))
    }

    #[tokio::test]
    async fn test_one_timeout_out_of_ten() {
        let refs = refs(10);
        let stub = stub_for(&refs).timeout("https://example.com/blog/post-3");
        let scraped = scrape_all(&stub, &refs, 4).await;
        assert_eq!(scraped.len(), 9);
        assert!(!scraped.contains_key("post-3"));
        assert_eq!(scraped["post-7"].title, "Post 7");
        assert_eq!(stub.calls(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_refs_are_scraped_once() {
        let mut refs = refs(3);
        refs.push(refs[1].clone());
        let stub = stub_for(&refs);
        let scraped = scrape_all(&stub, &refs, 2).await;
        assert_eq!(scraped.len(), 3);
        assert_eq!(stub.calls_to("https://example.com/blog/post-1"), 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let stub = StubFetcher::new();
        assert!(scrape_all(&stub, &[], 10).await.is_empty());
        assert_eq!(stub.calls(), 0);
    }

    /// Tracks the peak number of fetches in flight.
    struct GaugeFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PageFetcher for GaugeFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(article_html("Gauge"))
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let gauge = GaugeFetcher {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let scraped = scrape_all(&gauge, &refs(12), 3).await;
        assert_eq!(scraped.len(), 12);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight was {peak}");
        assert!(peak >= 2, "expected overlapping fetches, peak was {peak}");
    }
}
