//! Wave-Crawler main entry point
//!
//! This is the command-line interface for the breadth-first web crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use wave_crawler::config::{load_config, validate, Config, CrawlerConfig};
use wave_crawler::crawler::{CrawlRequest, HttpFetcher, WebCrawler};
use wave_crawler::output::{print_result, print_summary, CrawlSummary};

/// Wave-Crawler: a bounded breadth-first web crawler
///
/// Downloads every page reachable from URL within DEPTH levels, bounding
/// simultaneous downloads, link extractions and requests per host.
#[derive(Parser, Debug)]
#[command(name = "web-crawler")]
#[command(version)]
#[command(about = "A bounded breadth-first web crawler", long_about = None)]
struct Cli {
    /// URL to start from
    #[arg(value_name = "URL")]
    url: String,

    /// Number of levels to download; 1 downloads only URL
    #[arg(
        value_name = "DEPTH",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    depth: u32,

    /// Maximum number of simultaneous downloads
    #[arg(value_name = "DOWNLOADERS")]
    downloaders: Option<usize>,

    /// Maximum number of simultaneous link extractions
    #[arg(value_name = "EXTRACTORS")]
    extractors: Option<usize>,

    /// Maximum number of simultaneous operations per host
    #[arg(value_name = "PER_HOST")]
    per_host: Option<usize>,

    /// Only follow pages on this host (repeatable)
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Overrides the configured pool sizes with the ones given on the
    /// command line
    fn apply(&self, crawler: &mut CrawlerConfig) {
        if let Some(downloaders) = self.downloaders {
            crawler.downloaders = downloaders;
        }
        if let Some(extractors) = self.extractors {
            crawler.extractors = extractors;
        }
        if let Some(per_host) = self.per_host {
            crawler.per_host = per_host;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };
    cli.apply(&mut config.crawler);
    validate(&config).context("Invalid crawler settings")?;

    let fetcher = HttpFetcher::new(&config.http).context("Failed to build HTTP client")?;
    let crawler = Arc::new(WebCrawler::new(Arc::new(fetcher), &config.crawler)?);

    // Ctrl-C closes the crawler, which fails the running crawl
    let interrupt = {
        let crawler = Arc::clone(&crawler);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, closing crawler");
                crawler.close().await;
            }
        })
    };

    let mut request = CrawlRequest::new(cli.url.as_str(), cli.depth);
    if !cli.hosts.is_empty() {
        request = request.with_allowed_hosts(cli.hosts.iter().cloned());
    }

    let started = Instant::now();
    let outcome = crawler.crawl(request).await;
    interrupt.abort();
    crawler.close().await;

    match outcome {
        Ok(result) => {
            print_result(&result)?;
            if !cli.quiet {
                print_summary(&CrawlSummary::from_result(&result, started.elapsed()))?;
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wave_crawler=info,warn"),
            1 => EnvFilter::new("wave_crawler=debug,info"),
            2 => EnvFilter::new("wave_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_defaults() {
        let cli = Cli::parse_from(["web-crawler", "https://example.com/"]);
        assert_eq!(cli.depth, 1);
        assert!(cli.downloaders.is_none());
        assert!(cli.hosts.is_empty());

        let mut crawler = CrawlerConfig::default();
        cli.apply(&mut crawler);
        assert_eq!(crawler, CrawlerConfig::default());
    }

    #[test]
    fn test_positional_overrides() {
        let cli = Cli::parse_from([
            "web-crawler",
            "https://example.com/",
            "3",
            "8",
            "4",
            "1",
            "--host",
            "example.com",
            "--host",
            "cdn.example.com",
        ]);
        assert_eq!(cli.depth, 3);
        assert_eq!(cli.hosts, vec!["example.com", "cdn.example.com"]);

        let mut crawler = CrawlerConfig::default();
        cli.apply(&mut crawler);
        assert_eq!(crawler, CrawlerConfig::new(8, 4, 1));
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(Cli::try_parse_from(["web-crawler", "https://example.com/", "0"]).is_err());
    }
}
