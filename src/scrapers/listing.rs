//! Paginated listing discovery.
//!
//! Walks `<listing>`, `<listing>?page=2`, ... collecting article links in
//! first-seen order. That order is the archive's canonical order.
//!
//! # Link Rules
//!
//! An anchor is an article link when its `href` is `<listing_path>/<slug>`,
//! is not a `/category/` link, and the slug is non-empty, carries no query
//! string and has not been seen on an earlier page.
//!
//! # End of Pagination
//!
//! The walk continues only while a `button[aria-label="Go to next page"]`
//! exists and is not `disabled`.

use crate::config::SiteConfig;
use crate::error::DiscoveryError;
use crate::fetch::PageFetcher;
use crate::models::ArticleRef;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static NEXT_PAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"button[aria-label="Go to next page"]"#).unwrap());

/// What one listing page contributed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Articles not seen on earlier pages, in document order.
    pub articles: Vec<ArticleRef>,
    /// Whether an enabled "next page" control exists.
    pub has_next: bool,
}

/// Extract new article links from one listing page.
///
/// `seen` carries slugs across pages and is updated in place.
pub fn parse_listing_page(html: &str, config: &SiteConfig, seen: &mut HashSet<String>) -> ListingPage {
    let document = Html::parse_document(html);
    let root = config.listing_path.trim_end_matches('/');
    let prefix = format!("{root}/");
    let origin = config.origin.trim_end_matches('/');

    let mut articles = Vec::new();
    for element in document.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href == root || href.contains("/category/") {
            continue;
        }
        let Some(slug) = href.strip_prefix(&prefix) else {
            continue;
        };
        if slug.is_empty() || slug.contains('?') || seen.contains(slug) {
            continue;
        }
        seen.insert(slug.to_string());

        let text = element.text().collect::<String>();
        let title = match text.split_whitespace().join(" ") {
            t if t.is_empty() => slug.to_string(),
            t => t,
        };
        articles.push(ArticleRef {
            title,
            url: format!("{origin}{href}"),
            slug: slug.to_string(),
        });
    }

    let has_next = document
        .select(&NEXT_PAGE)
        .next()
        .is_some_and(|btn| btn.value().attr("disabled").is_none());

    ListingPage { articles, has_next }
}

/// Walk the whole listing and return every article in first-seen order.
///
/// # Errors
///
/// [`DiscoveryError::FirstPage`] when page 1 cannot be fetched. A failure on
/// any later page ends the walk with the articles gathered so far.
#[instrument(level = "info", skip_all, fields(listing = %config.listing_url()))]
pub async fn discover<F: PageFetcher>(
    fetcher: &F,
    config: &SiteConfig,
) -> Result<Vec<ArticleRef>, DiscoveryError> {
    let mut seen = HashSet::new();
    let mut articles = Vec::new();

    for page in 1..=config.max_pages.max(1) {
        let url = config.listing_page_url(page);
        debug!(page, %url, "Fetching listing page");

        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(source) if page == 1 => return Err(DiscoveryError::FirstPage { url, source }),
            Err(e) => {
                warn!(page, %url, error = %e, found = articles.len(), "Listing page failed; continuing with partial listing");
                break;
            }
        };

        let ListingPage {
            articles: found,
            has_next,
        } = parse_listing_page(&html, config, &mut seen);
        debug!(page, new = found.len(), has_next, "Parsed listing page");
        articles.extend(found);

        if !has_next {
            break;
        }
        if page == config.max_pages {
            warn!(max_pages = config.max_pages, "Stopped at listing page cap");
        }
    }

    info!(count = articles.len(), "Discovered blog posts");
    Ok(articles)
}
