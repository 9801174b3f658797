//! Error types for every stage of an archive run.
//!
//! Only [`DiscoveryError`] is ever fatal. Fetch and conversion failures are
//! captured per article inside a [`crate::models::ScrapeResult`], and
//! persistence failures are downgraded to warnings by the pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single page GET that did not produce a body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request exceeded the absolute per-fetch timeout.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// The server answered with a non-success status code.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or body-read failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Whether a retry within the same run could plausibly succeed.
    ///
    /// Timeouts are excluded: a slow article already held a worker for the
    /// full timeout and is left for the next run.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => false,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Transport { source, .. } => source.is_connect() || source.is_request(),
        }
    }
}

/// Why one article could not be archived in this run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("markdown conversion failed: {0}")]
    Conversion(#[source] io::Error),
}

/// Listing discovery failures that abort the run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No listing means nothing to do.
    #[error("first listing page {url} is unreachable: {source}")]
    FirstPage {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("no articles discovered at {url}")]
    NoArticles { url: String },
}

/// Reading or writing the checkpoint ledger.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Writing or reading the Markdown archive.
#[derive(Debug, Error)]
#[error("archive I/O on {path}: {source}")]
pub struct ArchiveError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Loading the optional YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid listing URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
