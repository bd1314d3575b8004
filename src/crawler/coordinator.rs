//! Crawler coordinator - main crawl orchestration logic
//!
//! [`WebCrawler`] drives breadth-first crawls one depth level at a time:
//! - Planning the level: skipping known URLs, resolving hosts, applying the
//!   host allow-list
//! - Registering the level's units on a [`WaveBarrier`] and submitting them
//!   to the shared [`DownloadPipeline`]
//! - Waiting for the level, then building the next frontier from the links
//!   discovered during it
//! - Shutting everything down on [`WebCrawler::close`]

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::crawler::barrier::WaveBarrier;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::pipeline::{CrawlContext, DownloadPipeline, WorkUnit};
use crate::state::{CrawlState, VisitedSet};
use crate::url::{extract_host, is_host_allowed};
use crate::{AggregateError, ConfigError, CrawlError, PageError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Parameters of one crawl
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// URL the crawl starts from
    pub start_url: String,

    /// Number of levels to download; 1 downloads only the start URL
    pub depth: u32,

    /// Hosts to follow; pages on other hosts are ignored
    pub allowed_hosts: Option<HashSet<String>>,

    /// Caller-side cancellation; cancelling it makes the crawl fail with
    /// [`CrawlError::Interrupted`]
    pub cancellation: Option<CancellationToken>,
}

impl CrawlRequest {
    pub fn new(start_url: impl Into<String>, depth: u32) -> Self {
        Self {
            start_url: start_url.into(),
            depth,
            allowed_hosts: None,
            cancellation: None,
        }
    }

    /// Restricts the crawl to the given hosts, compared case-insensitively
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = Some(
            hosts
                .into_iter()
                .map(|host| host.into().to_ascii_lowercase())
                .collect(),
        );
        self
    }

    /// Lets the caller interrupt the crawl
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Outcome of a finished crawl
#[derive(Debug)]
pub struct CrawlResult {
    /// Successfully downloaded pages, in breadth-first order
    pub downloaded: Vec<String>,

    /// Pages that failed, with the reason of their first failure
    pub errors: HashMap<String, PageError>,
}

/// Cancels a crawl's token when the crawl ends, however it ends, and drops
/// its units still waiting in host backlogs
struct CrawlGuard<'a> {
    token: CancellationToken,
    pipeline: &'a DownloadPipeline,
}

impl Drop for CrawlGuard<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        let purged = self.pipeline.purge_abandoned();
        if purged > 0 {
            tracing::debug!("Dropped {} backlog entries of an abandoned crawl", purged);
        }
    }
}

/// Concurrent breadth-first web crawler
///
/// One crawler may serve several crawls at once; they share the host
/// admission state and both worker pools, so the configured limits hold
/// across all of them.
pub struct WebCrawler {
    pipeline: Arc<DownloadPipeline>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    close_timeout: Duration,
}

impl WebCrawler {
    /// Creates a crawler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Downloads pages
    /// * `config` - Pool sizes, per-host limit and close grace period
    ///
    /// # Returns
    ///
    /// * `Ok(WebCrawler)` - Ready to crawl
    /// * `Err(ConfigError)` - A limit is zero or out of range
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        config: &CrawlerConfig,
    ) -> std::result::Result<Self, ConfigError> {
        validate_crawler_config(config)?;
        tracing::debug!(
            "Creating crawler: downloaders={}, extractors={}, per_host={}",
            config.downloaders,
            config.extractors,
            config.per_host
        );

        Ok(Self {
            pipeline: DownloadPipeline::new(fetcher, config),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            close_timeout: config.close_timeout(),
        })
    }

    /// Downloads a site up to `depth` levels
    pub async fn download(&self, url: &str, depth: u32) -> Result<CrawlResult> {
        self.crawl(CrawlRequest::new(url, depth)).await
    }

    /// Downloads a site up to `depth` levels, following only `hosts`
    pub async fn download_with_hosts<I, S>(
        &self,
        url: &str,
        depth: u32,
        hosts: I,
    ) -> Result<CrawlResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.crawl(CrawlRequest::new(url, depth).with_allowed_hosts(hosts))
            .await
    }

    /// Runs one crawl
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Every level was processed
    /// * `Err(CrawlError::Closed)` - The crawler is or got closed
    /// * `Err(CrawlError::Interrupted)` - The caller's token was cancelled
    /// * `Err(CrawlError::Tasks)` - Some pages failed unexpectedly; the crawl
    ///   still ran to its end
    pub async fn crawl(&self, request: CrawlRequest) -> Result<CrawlResult> {
        if self.is_closed() {
            return Err(CrawlError::Closed);
        }
        if request.depth == 0 {
            return Err(CrawlError::InvalidDepth(request.depth));
        }

        let token = self.shutdown.child_token();
        let _guard = CrawlGuard {
            token: token.clone(),
            pipeline: &self.pipeline,
        };

        let started = Instant::now();
        let crawl = Arc::new(CrawlContext::new(token.clone()));
        let barrier = Arc::new(WaveBarrier::new());
        let mut visited = VisitedSet::new();
        let mut frontier = vec![request.start_url.clone()];

        tracing::info!(
            "Starting crawl of {} (depth {})",
            request.start_url,
            request.depth
        );

        for level in 1..=request.depth {
            let units = plan_level(
                &frontier,
                &mut visited,
                &crawl.state,
                request.allowed_hosts.as_ref(),
            );
            tracing::debug!(
                "Level {}/{}: submitting {} of {} frontier URLs",
                level,
                request.depth,
                units.len(),
                frontier.len()
            );

            let arrivals = barrier.register(units.len());
            for ((url, host), arrival) in units.into_iter().zip(arrivals) {
                self.pipeline
                    .submit(WorkUnit::new(url, host, Arc::clone(&crawl), arrival));
            }

            self.await_level(&barrier, &token, request.cancellation.as_ref())
                .await?;

            let discovered = crawl.state.take_links();
            if level == request.depth {
                break;
            }

            frontier = discovered
                .into_iter()
                .filter(|url| !visited.contains(url) && !crawl.state.is_failed(url))
                .collect();
            frontier.sort();

            if frontier.is_empty() {
                tracing::debug!("Frontier exhausted after level {}", level);
                break;
            }
        }

        let downloaded = visited.downloaded(&crawl.state);
        let errors = crawl.state.take_failures();
        let unexpected = crawl.state.take_unexpected();

        tracing::info!(
            "Crawl of {} finished in {:?}: {} downloaded, {} failed",
            request.start_url,
            started.elapsed(),
            downloaded.len(),
            errors.len()
        );

        if let Some(aggregate) = AggregateError::from_failures(unexpected) {
            tracing::warn!(
                "Crawl of {} hit {} unexpected failures",
                request.start_url,
                aggregate.count()
            );
            return Err(aggregate.into());
        }

        Ok(CrawlResult { downloaded, errors })
    }

    /// Waits for the current level, watching for close and for the caller
    async fn await_level(
        &self,
        barrier: &WaveBarrier,
        token: &CancellationToken,
        caller: Option<&CancellationToken>,
    ) -> Result<()> {
        let level = barrier.await_level(token);
        let outcome = match caller {
            Some(caller) => tokio::select! {
                outcome = level => outcome,
                _ = caller.cancelled() => {
                    tracing::info!("Crawl interrupted by caller");
                    return Err(CrawlError::Interrupted);
                }
            },
            None => level.await,
        };

        if outcome.is_err() || self.is_closed() {
            return Err(CrawlError::Closed);
        }
        Ok(())
    }

    /// Closes the crawler
    ///
    /// Stops admitting work, interrupts running crawls (they fail with
    /// [`CrawlError::Closed`]), lets running jobs drain for the configured
    /// grace period and cancels whatever is left. Later calls return at once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("Closing crawler");
        self.pipeline.throttle().close();
        self.shutdown.cancel();
        self.pipeline.close(self.close_timeout).await;
        tracing::info!("Crawler closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The shared pipeline, for inspecting host and pool load
    pub fn pipeline(&self) -> &DownloadPipeline {
        &self.pipeline
    }
}

impl Drop for WebCrawler {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shutdown.cancel();
            self.pipeline.abort();
        }
    }
}

/// Picks the frontier URLs to submit for one level
///
/// Known URLs are skipped, malformed ones are recorded as failed, URLs on
/// hosts outside the allow-list are ignored. The rest are reserved in
/// `visited` and returned with their host.
fn plan_level(
    frontier: &[String],
    visited: &mut VisitedSet,
    state: &CrawlState,
    allowed_hosts: Option<&HashSet<String>>,
) -> Vec<(String, String)> {
    let mut units = Vec::new();

    for url in frontier {
        if visited.contains(url) || state.is_failed(url) {
            continue;
        }

        match extract_host(url) {
            Ok(host) => {
                if !is_host_allowed(&host, allowed_hosts) {
                    tracing::trace!("Ignoring {}, host {} not allowed", url, host);
                    continue;
                }
                if visited.insert(url) {
                    units.push((url.clone(), host));
                }
            }
            Err(reason) => {
                tracing::debug!("Not dispatching {}: {}", url, reason);
                state.record_failure(url, reason);
            }
        }
    }

    units
}
