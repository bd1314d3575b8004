//! Output module for reporting crawl results
//!
//! This module handles:
//! - Listing downloaded pages and failures
//! - Summarizing a crawl in one line

mod summary;

pub use summary::{print_summary, write_summary, CrawlSummary};

use crate::crawler::CrawlResult;
use std::io::{self, Write};

/// Writes one `Downloaded: <url>` line per page, then one
/// `Error: <url>: <reason>` line per failure
///
/// Failures are sorted by URL so the report is stable between runs.
pub fn write_result<W: Write>(out: &mut W, result: &CrawlResult) -> io::Result<()> {
    for url in &result.downloaded {
        writeln!(out, "Downloaded: {}", url)?;
    }

    let mut errors: Vec<_> = result.errors.iter().collect();
    errors.sort_by(|a, b| a.0.cmp(b.0));
    for (url, reason) in errors {
        writeln!(out, "Error: {}: {}", url, reason)?;
    }
    Ok(())
}

/// Prints a crawl result to stdout
pub fn print_result(result: &CrawlResult) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(&mut out, result)?;
    out.flush()
}
