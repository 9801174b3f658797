//! Utility functions for publish dates, log formatting, and file system checks.
//!
//! - Long-form date recognition and formatting (`January 5, 2024`)
//! - String truncation for log previews
//! - Output directory validation

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Month names alternation shared by every long-form date pattern.
pub const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

/// A whole string that is exactly one long-form date, e.g. `March 15, 2023`.
static LONG_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(?:{MONTHS}) \d{{1,2}}, \d{{4}}$")).unwrap());

/// Chrono format for the long-form date, without day padding.
const LONG_DATE_FORMAT: &str = "%B %-d, %Y";

/// Accepted layouts when reading dates back out of the ledger.
const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%B %d %Y", "%Y-%m-%d"];

/// Whether `text` is exactly one long-form date.
pub fn is_long_date(text: &str) -> bool {
    LONG_DATE.is_match(text)
}

/// Reformat a machine-readable date (`2024-01-05` or RFC 3339) as `January 5, 2024`.
///
/// Returns `None` when the input is neither layout.
pub fn long_form_date(machine: &str) -> Option<String> {
    let machine = machine.trim();
    let date = NaiveDate::parse_from_str(machine, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(machine).ok().map(|dt| dt.date_naive()))?;
    Some(date.format(LONG_DATE_FORMAT).to_string())
}

/// Parse a publish date in any layout the archive or ledger may contain.
pub fn parse_publish_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or below `max` bytes and
/// suffixed with a byte count indicator.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits in `max` bytes, otherwise a truncated
/// version with `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("ééé", 3), "é…(+4 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory (and any parents) if needed, then writes and
/// removes a probe file.
///
/// # Arguments
///
/// * `path` - The output directory for the archive and checkpoint
///
/// # Returns
///
/// `Ok(())` when the directory can be written to.
///
/// # Errors
///
/// Any I/O error from creating the directory or writing the probe file,
/// typically a permission problem.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe = path.join("..__probe_write__");
    fs::write(&probe, b"").await?;
    let _ = fs::remove_file(&probe).await;
    info!("Output directory is writable");
    Ok(())
}
