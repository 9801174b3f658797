//! Blog scraping in two phases.
//!
//! 1. **Indexing** ([`listing`]): walk the paginated listing and collect
//!    article links in first-seen order
//! 2. **Fetching** ([`pool`] over [`article`]): download and convert each
//!    article with bounded concurrency
//!
//! # Common Patterns
//!
//! - Concurrent fetching with `futures::stream` and `buffer_unordered`
//! - Per-article failures are logged and skipped, never fatal
//! - HTML is queried with `scraper` selectors compiled once

pub mod article;
pub mod listing;
pub mod pool;
