//! Wave-Crawler: a bounded, breadth-first web crawler
//!
//! This crate downloads pages up to a configurable depth, one depth level
//! ("wave") at a time, while bounding simultaneous downloads, simultaneous
//! link extractions and simultaneous operations per remote host.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use std::fmt;
use thiserror::Error;

/// Crawl-level error returned by [`crawler::WebCrawler::download`]
///
/// No partial result accompanies these errors.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Crawler has been shut down, can not download")]
    Closed,

    #[error("Crawl was interrupted before it finished")]
    Interrupted,

    #[error("Download depth must be at least 1, got {0}")]
    InvalidDepth(u32),

    #[error(transparent)]
    Tasks(#[from] AggregateError),
}

/// Per-URL failure reason recorded in the result's error map
#[derive(Debug, Error)]
pub enum PageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("URL has no host: {url}")]
    MissingHost { url: String },
}

/// Error reported by a fetcher or a document
///
/// `Io` is the recognized per-page failure; anything else is unexpected and
/// is collected into an [`AggregateError`] raised after the crawl.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// An unexpected failure while processing one URL
#[derive(Debug, Clone, Error)]
#[error("Error processing {url}: {message}")]
pub struct TaskFailure {
    pub url: String,
    pub message: String,
}

/// All unexpected failures of one crawl: the first one plus the rest
#[derive(Debug, Clone)]
pub struct AggregateError {
    pub primary: TaskFailure,
    pub suppressed: Vec<TaskFailure>,
}

impl AggregateError {
    /// Builds the aggregate from failures in arrival order; `None` if empty
    pub fn from_failures(failures: Vec<TaskFailure>) -> Option<Self> {
        let mut failures = failures.into_iter();
        let primary = failures.next()?;
        Some(Self {
            primary,
            suppressed: failures.collect(),
        })
    }

    /// Number of collected failures
    pub fn count(&self) -> usize {
        1 + self.suppressed.len()
    }

    /// Iterates over every failure, primary first
    pub fn iter(&self) -> impl Iterator<Item = &TaskFailure> {
        std::iter::once(&self.primary).chain(self.suppressed.iter())
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if !self.suppressed.is_empty() {
            write!(f, " (and {} more)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use crate::url::extract_host;
pub use config::Config;
pub use crawler::{CrawlRequest, CrawlResult, Document, Fetcher, WebCrawler};
