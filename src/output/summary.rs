//! One-line crawl summaries

use crate::crawler::CrawlResult;
use crate::url::extract_host;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Number of pages downloaded
    pub downloaded: usize,

    /// Number of pages that failed
    pub failed: usize,

    /// Hosts of every reported URL, downloaded or failed
    pub hosts: BTreeSet<String>,

    /// Wall-clock time of the crawl
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Summarizes a crawl result
    ///
    /// URLs without a usable host count toward `failed` but add no host.
    pub fn from_result(result: &CrawlResult, elapsed: Duration) -> Self {
        let hosts = result
            .downloaded
            .iter()
            .chain(result.errors.keys())
            .filter_map(|url| extract_host(url).ok())
            .collect();

        Self {
            downloaded: result.downloaded.len(),
            failed: result.errors.len(),
            hosts,
            elapsed,
        }
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} failed, {} hosts in {:.1}s",
            self.downloaded,
            self.failed,
            self.hosts.len(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Writes the summary line
pub fn write_summary<W: Write>(out: &mut W, summary: &CrawlSummary) -> io::Result<()> {
    writeln!(out, "Summary: {}", summary)
}

/// Prints the summary line to stderr, keeping stdout to the page listing
pub fn print_summary(summary: &CrawlSummary) -> io::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_summary(&mut out, summary)
}
