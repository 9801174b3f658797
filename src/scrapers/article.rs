//! Single-article extraction: fetch, locate content, convert, clean.
//!
//! # Content Region
//!
//! Candidate selectors are tried in order. Navigation, header, footer,
//! script and style elements are removed from the candidate, and the first
//! candidate whose remaining HTML is longer than [`MIN_CONTENT_LEN`] wins.
//! The page `<body>` is the last resort.
//!
//! # Publish Date
//!
//! 1. `<time datetime="...">` reformatted as `January 5, 2024`
//! 2. the raw attribute, or the `<time>` text, when that fails
//! 3. the first `p`, `div` or `span` whose whole text is a long-form date

use crate::cleanup::clean_markdown;
use crate::error::ScrapeError;
use crate::fetch::PageFetcher;
use crate::models::{ArticleRef, ScrapeResult, ScrapedArticle};
use crate::utils::{is_long_date, long_form_date, truncate_for_log};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Regions at or below this many bytes of HTML are treated as empty wrappers.
pub const MIN_CONTENT_LEN: usize = 100;

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".post-content",
    ".blog-content",
    ".article-content",
    "main",
    r#"[role="main"]"#,
];

static CANDIDATES: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static CHROME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("nav, header, footer, script, style").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static TEXT_BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("p, div, span").unwrap());

/// Fetch one article and turn it into a [`ScrapeResult`].
///
/// Never fails past its boundary: every error lands in `ScrapeResult::outcome`.
#[instrument(level = "debug", skip_all, fields(slug = %article.slug))]
pub async fn scrape_article<F: PageFetcher>(fetcher: &F, article: &ArticleRef) -> ScrapeResult {
    match fetcher.fetch(&article.url).await {
        Ok(html) => extract(article, &html),
        Err(e) => ScrapeResult::failed(&article.slug, e),
    }
}

/// Extract title, date and cleaned Markdown from an article page.
pub fn extract(article: &ArticleRef, html: &str) -> ScrapeResult {
    let mut document = Html::parse_document(html);

    let title = resolve_title(&document).unwrap_or_else(|| article.title.clone());
    let date = resolve_date(&document);
    let content = content_html(&mut document);
    debug!(bytes = content.len(), ?date, "Resolved content region");

    let raw = match htmd::convert(&content) {
        Ok(md) => md,
        Err(e) => return ScrapeResult::failed(&article.slug, ScrapeError::Conversion(e)),
    };
    debug!(preview = %truncate_for_log(&raw, 120), "Converted to Markdown");

    ScrapeResult::ok(ScrapedArticle {
        slug: article.slug.clone(),
        markdown: clean_markdown(&raw, &title),
        title,
        url: article.url.clone(),
        date,
    })
}

/// Text of the first `<h1>`, if it has any.
pub fn resolve_title(document: &Html) -> Option<String> {
    let h1 = document.select(&H1).next()?;
    let text = h1.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

pub fn resolve_date(document: &Html) -> Option<String> {
    if let Some(time) = document.select(&TIME).next() {
        let from_time = match time.value().attr("datetime").map(str::trim) {
            Some(machine) if !machine.is_empty() => {
                Some(long_form_date(machine).unwrap_or_else(|| machine.to_string()))
            }
            _ => {
                let text = time.text().collect::<String>();
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
        };
        if from_time.is_some() {
            return from_time;
        }
    }

    document.select(&TEXT_BLOCKS).find_map(|el| {
        let text = el.text().collect::<String>();
        let text = text.trim();
        is_long_date(text).then(|| text.to_string())
    })
}

/// Inner HTML of the first substantial content region, chrome removed.
///
/// Chrome removal mutates `document`, so later candidates see a stripped tree.
pub fn content_html(document: &mut Html) -> String {
    for selector in CANDIDATES.iter() {
        match stripped_region(document, selector) {
            Some(html) if html.len() > MIN_CONTENT_LEN => return html,
            _ => continue,
        }
    }
    stripped_region(document, &BODY).unwrap_or_else(|| document.root_element().inner_html())
}

/// Strip chrome from the first match of `selector` and return its inner HTML.
fn stripped_region(document: &mut Html, selector: &Selector) -> Option<String> {
    let id = document.select(selector).next()?.id();
    let chrome: Vec<_> = document
        .tree
        .get(id)
        .and_then(ElementRef::wrap)
        .map(|el| el.select(&CHROME).map(|c| c.id()).collect())
        .unwrap_or_default();
    for node in chrome {
        if let Some(mut node) = document.tree.get_mut(node) {
            node.detach();
        }
    }
    document
        .tree
        .get(id)
        .and_then(ElementRef::wrap)
        .map(|el| el.inner_html())
}
