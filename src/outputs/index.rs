//! Reading the archive back: section index and ledger reconciliation.
//!
//! Downstream tools treat the archive as a list of sections. [`parse_archive`]
//! recovers that list, and [`reconcile`] compares it with the checkpoint
//! ledger so append-mode drift is reported instead of going unnoticed. The
//! archive is never rewritten to repair drift.

use crate::checkpoint::Checkpoint;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Heading and metadata line that open every section. The body runs to the
/// next section head or the end of the file.
static SECTION_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^## ([^\n]+)\n\n\*Source: (https?://[^\s|*]+)(?:\s*\|\s*([^*\n]+))?\*\n\n")
        .unwrap()
});

/// Excerpt length, in characters.
const EXCERPT_CHARS: usize = 300;

/// One section recovered from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedPost {
    pub title: String,
    pub url: String,
    pub date: Option<String>,
    pub excerpt: String,
    pub content: String,
}

/// Split archive text into its sections, in file order.
///
/// A `---` rule inside an article body stays part of that body; only the
/// separator closing each section is dropped.
pub fn parse_archive(text: &str) -> Vec<ArchivedPost> {
    let heads: Vec<_> = SECTION_HEAD.captures_iter(text).collect();
    heads
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let body_start = caps.get(0).map_or(text.len(), |m| m.end());
            let body_end = heads
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            let body = text[body_start..body_end].trim_end();
            let content = body.strip_suffix("---").unwrap_or(body).trim().to_string();
            ArchivedPost {
                title: caps[1].trim().to_string(),
                url: caps[2].trim().to_string(),
                date: caps
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|d| !d.is_empty()),
                excerpt: content.chars().take(EXCERPT_CHARS).collect(),
                content,
            }
        })
        .collect()
}

/// Disagreement between the ledger and the archive file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drift {
    /// Checkpointed slugs with no section in the archive.
    pub missing_sections: Vec<String>,
    /// Section URLs with no ledger entry.
    pub unrecorded_sections: Vec<String>,
    /// Section URLs that appear more than once.
    pub duplicated_sections: Vec<String>,
}

impl Drift {
    pub fn is_clean(&self) -> bool {
        self.missing_sections.is_empty()
            && self.unrecorded_sections.is_empty()
            && self.duplicated_sections.is_empty()
    }

    /// Log the drift, if any.
    pub fn report(&self) {
        if self.is_clean() {
            info!("Archive and checkpoint agree");
        } else {
            warn!(
                missing = ?self.missing_sections,
                unrecorded = ?self.unrecorded_sections,
                duplicated = ?self.duplicated_sections,
                "Archive and checkpoint have drifted; run with --force to rebuild"
            );
        }
    }
}

/// Compare ledger entries with archive sections by source URL.
pub fn reconcile(checkpoint: &Checkpoint, posts: &[ArchivedPost]) -> Drift {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in posts {
        *counts.entry(post.url.as_str()).or_default() += 1;
    }
    let by_url = checkpoint.slugs_by_url();

    let missing_sections = checkpoint
        .iter()
        .filter(|(_, e)| !counts.contains_key(e.url.as_str()))
        .map(|(slug, _)| slug.clone())
        .collect();

    let mut unrecorded = BTreeSet::new();
    let mut duplicated = BTreeSet::new();
    for (url, n) in &counts {
        if !by_url.contains_key(url) {
            unrecorded.insert(url.to_string());
        }
        if *n > 1 {
            duplicated.insert(url.to_string());
        }
    }

    Drift {
        missing_sections,
        unrecorded_sections: unrecorded.into_iter().collect(),
        duplicated_sections: duplicated.into_iter().collect(),
    }
}
