//! Data models for discovered articles, scrape outcomes and ledger entries.
//!
//! - [`ArticleRef`]: one link found on the listing, identified by its slug
//! - [`ScrapedArticle`]: the cleaned content of one article
//! - [`ScrapeResult`]: the outcome of extracting one [`ArticleRef`]
//! - [`CheckpointEntry`]: what the ledger remembers about an archived slug

use crate::error::ScrapeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article link discovered on the paginated listing.
///
/// Identity is the `slug`, unique within one discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    /// Link text from the listing, or the slug when the link had no text.
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    /// Path suffix after the listing prefix.
    pub slug: String,
}

/// A successfully fetched, converted and cleaned article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedArticle {
    pub slug: String,
    /// Primary heading of the page, falling back to the listing link text.
    pub title: String,
    pub url: String,
    /// Human long-form publish date, e.g. `January 5, 2024`.
    pub date: Option<String>,
    /// Cleaned Markdown body.
    pub markdown: String,
}

/// The outcome of extracting one [`ArticleRef`].
///
/// Either the article was fully extracted or there is an error; content is
/// never partially populated.
#[derive(Debug)]
pub struct ScrapeResult {
    pub slug: String,
    pub outcome: Result<ScrapedArticle, ScrapeError>,
}

impl ScrapeResult {
    pub fn ok(article: ScrapedArticle) -> Self {
        Self {
            slug: article.slug.clone(),
            outcome: Ok(article),
        }
    }

    pub fn failed(slug: impl Into<String>, error: impl Into<ScrapeError>) -> Self {
        Self {
            slug: slug.into(),
            outcome: Err(error.into()),
        }
    }
}

/// What the ledger remembers about one archived slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl CheckpointEntry {
    pub fn from_article(article: &ScrapedArticle, scraped_at: DateTime<Utc>) -> Self {
        Self {
            title: article.title.clone(),
            url: article.url.clone(),
            date: article.date.clone(),
            scraped_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use chrono::TimeZone;

    fn article() -> ScrapedArticle {
        ScrapedArticle {
            slug: "post-a".to_string(),
            title: "Post A".to_string(),
            url: "https://example.com/blog/post-a".to_string(),
            date: Some("January 5, 2024".to_string()),
            markdown: "Body".to_string(),
        }
    }

    #[test]
    fn test_scrape_result_ok_takes_article_slug() {
        let r = ScrapeResult::ok(article());
        assert_eq!(r.slug, "post-a");
        assert!(r.outcome.is_ok());
    }

    #[test]
    fn test_scrape_result_failed_has_no_content() {
        let r = ScrapeResult::failed(
            "post-b",
            FetchError::Timeout {
                url: "https://example.com/blog/post-b".to_string(),
            },
        );
        assert_eq!(r.slug, "post-b");
        assert!(r.outcome.is_err());
    }

    #[test]
    fn test_checkpoint_entry_serialization() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = CheckpointEntry::from_article(&article(), at);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""date":"January 5, 2024""#));
        assert!(json.contains(r#""scraped_at":"2024-03-01T12:00:00Z""#));
    }

    #[test]
    fn test_checkpoint_entry_without_date() {
        let json = r#"{
            "title": "T",
            "url": "https://example.com/blog/t",
            "scraped_at": "2024-03-01T12:00:00Z"
        }"#;
        let entry: CheckpointEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.date, None);
        let back = serde_json::to_string(&entry).unwrap();
        assert!(!back.contains("date"));
    }
}
