//! Boilerplate removal for converted article Markdown.
//!
//! The pipeline is an ordered table of pure `text -> text` passes. Each pass
//! is idempotent on its own, and the whole pipeline is a fixed point on its
//! own output. Structural removals run first; blank-line collapse and trim
//! run last so removals never leave orphaned blank blocks behind.

use crate::utils::MONTHS;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::trace;

/// One named rewrite. `title` is the resolved article title.
pub struct Pass {
    pub name: &'static str,
    pub apply: for<'a> fn(&'a str, &str) -> Cow<'a, str>,
}

/// The cleanup passes, in the order they must run.
pub const PASSES: &[Pass] = &[
    Pass { name: "breadcrumb", apply: strip_breadcrumb },
    Pass { name: "date_line", apply: strip_date_line },
    Pass { name: "duplicate_title", apply: strip_duplicate_title },
    Pass { name: "share_footer", apply: strip_share_footer },
    Pass { name: "related_articles", apply: strip_related_articles },
    Pass { name: "want_to_learn_more", apply: strip_want_more },
    Pass { name: "vendor_cta", apply: strip_vendor_cta },
    Pass { name: "ready_to_start", apply: strip_ready_to_start },
    Pass { name: "proxy_images", apply: strip_proxy_images },
    Pass { name: "excess_blank_lines", apply: collapse_blank_lines },
    Pass { name: "trim", apply: trim },
];

static BREADCRUMB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\[All Articles\]\([^)\n]*\)\n+").unwrap());
static DATE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?m)^(?:{MONTHS}) \d{{1,2}}, \d{{4}}\n+")).unwrap());
static SHARE_FOOTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\nShare this article.*$").unwrap());
static RELATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\nRelated articles\n.*$").unwrap());
static WANT_MORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\n## Want to learn more about [^\n]*\?.*$").unwrap());
static VENDOR_CTA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^[A-Z][\w.-]* provides a secure foundation.*?\[Get in touch\][^\n]*(?:\n|\z)").unwrap()
});
static READY_TO_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^_Ready to get started[^\n]*(?:\n|\z)").unwrap());
static PROXY_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^!\[[^\]\n]*\]\(/_next/image\?url=[^\n]*\)\n").unwrap());
static EXCESS_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Run every pass in order over raw converted Markdown.
pub fn clean_markdown(raw: &str, title: &str) -> String {
    PASSES.iter().fold(raw.to_string(), |text, pass| {
        let out = (pass.apply)(&text, title).into_owned();
        if out.len() != text.len() {
            trace!(pass = pass.name, removed = text.len() - out.len(), "Cleanup pass");
        }
        out
    })
}

/// `[All Articles](/blog)` navigation link at the top of the body.
pub fn strip_breadcrumb<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    BREADCRUMB.replace_all(s, "")
}

/// Standalone byline date; the archive's metadata line carries it instead.
pub fn strip_date_line<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    DATE_LINE.replace_all(s, "")
}

/// `# <title>` heading that duplicates the section heading.
pub fn strip_duplicate_title<'a>(s: &'a str, title: &str) -> Cow<'a, str> {
    if title.is_empty() {
        return Cow::Borrowed(s);
    }
    let pattern = format!(r"(?m)^# {}[ \t]*(?:\n+|\z)", regex::escape(title));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(s, ""),
        Err(_) => Cow::Borrowed(s),
    }
}

pub fn strip_share_footer<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    SHARE_FOOTER.replace(s, "")
}

pub fn strip_related_articles<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    RELATED.replace(s, "")
}

pub fn strip_want_more<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    WANT_MORE.replace(s, "")
}

/// Promotional paragraph running through a `[Get in touch]` link.
pub fn strip_vendor_cta<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    VENDOR_CTA.replace_all(s, "")
}

pub fn strip_ready_to_start<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    READY_TO_START.replace_all(s, "")
}

/// Images served through the site's `/_next/image` proxy never resolve elsewhere.
pub fn strip_proxy_images<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    PROXY_IMAGE.replace_all(s, "")
}

pub fn collapse_blank_lines<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    EXCESS_BLANKS.replace_all(s, "\n\n")
}

pub fn trim<'a>(s: &'a str, _title: &str) -> Cow<'a, str> {
    Cow::Borrowed(s.trim())
}
