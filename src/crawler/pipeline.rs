//! Download and extraction pipeline
//!
//! A unit of work flows through three stages:
//!
//! 1. Admission: the unit takes one of its host's slots or waits in the
//!    host backlog ([`HostThrottle`])
//! 2. Download: a job on the download pool fetches the page
//! 3. Extraction: a job on the extraction pool pulls the page's links
//!
//! The host slot is held from the start of the download until extraction
//! ends. Each unit carries the [`Arrival`] ticket of its level and drops it
//! once its outcome is recorded, on every path.

use crate::crawler::barrier::Arrival;
use crate::crawler::fetcher::{Document, Fetcher};
use crate::crawler::pool::WorkerPool;
use crate::crawler::throttle::{Admission, HostThrottle, Waiting};
use crate::config::CrawlerConfig;
use crate::state::CrawlState;
use crate::{PageError, TaskError, TaskFailure};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// State shared by every unit of one crawl
#[derive(Debug)]
pub struct CrawlContext {
    pub state: CrawlState,
    pub token: CancellationToken,
}

impl CrawlContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            state: CrawlState::new(),
            token,
        }
    }

    fn record_unexpected(&self, url: &str, message: String) {
        tracing::warn!("Unexpected failure on {}: {}", url, message);
        self.state.record_unexpected(TaskFailure {
            url: url.to_string(),
            message,
        });
    }

    fn record(&self, url: &str, error: TaskError) {
        match error {
            TaskError::Io(e) => {
                tracing::debug!("Failed {}: {}", url, e);
                self.state.record_failure(url, PageError::Io(e));
            }
            TaskError::Unexpected(e) => self.record_unexpected(url, format!("{:#}", e)),
        }
    }
}

/// One URL of one crawl level travelling through the pipeline
///
/// Field order matters: the context reference goes before the ticket, so
/// the crawl sees the arrival only after the unit let go of its context.
#[derive(Debug)]
pub struct WorkUnit {
    pub url: String,
    pub host: String,
    crawl: Arc<CrawlContext>,
    // Only dropped, never read: arrives when the unit goes away
    _arrival: Arrival,
}

impl WorkUnit {
    pub fn new(url: String, host: String, crawl: Arc<CrawlContext>, arrival: Arrival) -> Self {
        Self {
            url,
            host,
            crawl,
            _arrival: arrival,
        }
    }
}

impl Waiting for WorkUnit {
    fn is_abandoned(&self) -> bool {
        self.crawl.token.is_cancelled()
    }
}

/// A held host slot; dropping it frees the slot or passes it to the next
/// unit waiting for the same host
#[derive(Debug)]
struct HostSlot {
    pipeline: Arc<DownloadPipeline>,
    host: String,
}

impl Drop for HostSlot {
    fn drop(&mut self) {
        if let Some(next) = self.pipeline.throttle.release(&self.host) {
            tracing::trace!("Backfilling {} from backlog: {}", self.host, next.url);
            self.pipeline.dispatch(next);
        }
    }
}

/// Host throttle plus the download and extraction pools, shared by every
/// crawl of one crawler
pub struct DownloadPipeline {
    fetcher: Arc<dyn Fetcher>,
    throttle: HostThrottle<WorkUnit>,
    downloads: WorkerPool,
    extractions: WorkerPool,
}

impl std::fmt::Debug for DownloadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPipeline")
            .field("throttle", &self.throttle)
            .field("downloads", &self.downloads)
            .field("extractions", &self.extractions)
            .finish_non_exhaustive()
    }
}

impl DownloadPipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &CrawlerConfig) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            throttle: HostThrottle::new(config.per_host),
            downloads: WorkerPool::new("download", config.downloaders),
            extractions: WorkerPool::new("extraction", config.extractors),
        })
    }

    /// Submits a unit for its host's admission
    ///
    /// After close the unit is discarded, which counts it as arrived.
    pub fn submit(self: &Arc<Self>, unit: WorkUnit) {
        let host = unit.host.clone();
        match self.throttle.admit_or_enqueue(&host, unit) {
            Admission::Admitted(unit) => self.dispatch(unit),
            Admission::Queued => {}
            Admission::Rejected(unit) => {
                tracing::debug!("Pipeline closed, dropping {}", unit.url);
            }
        }
    }

    /// Starts the download of a unit that already holds a host slot
    fn dispatch(self: &Arc<Self>, unit: WorkUnit) {
        let slot = HostSlot {
            pipeline: Arc::clone(self),
            host: unit.host.clone(),
        };
        let pipeline = Arc::clone(self);
        if let Err(e) = self.downloads.spawn(pipeline.download(unit, slot)) {
            tracing::debug!("{}, unit dropped", e);
        }
    }

    async fn download(self: Arc<Self>, unit: WorkUnit, slot: HostSlot) {
        if unit.crawl.token.is_cancelled() {
            tracing::trace!("Skipping {}, crawl cancelled", unit.url);
            return;
        }

        tracing::trace!("Downloading {}", unit.url);
        let fetched = guarded(self.fetcher.fetch(&unit.url)).await;
        match fetched {
            Ok(document) => {
                if let Err(e) = self.extractions.spawn(extract(unit, slot, document)) {
                    tracing::debug!("{}, page left unextracted", e);
                }
            }
            Err(error) => unit.crawl.record(&unit.url, error),
        }
    }

    /// Removes backlog entries of cancelled crawls
    pub fn purge_abandoned(&self) -> usize {
        self.throttle.purge_abandoned()
    }

    /// Stops admitting work, then drains both pools within `grace`
    pub async fn close(&self, grace: Duration) {
        self.throttle.close();
        let (downloads, extractions) = tokio::join!(
            self.downloads.shutdown(grace),
            self.extractions.shutdown(grace)
        );
        tracing::debug!(
            "Pipeline closed (downloads drained: {}, extractions drained: {})",
            downloads,
            extractions
        );
    }

    /// Stops admitting work and cancels everything without waiting
    pub fn abort(&self) {
        self.throttle.close();
        self.downloads.abort();
        self.extractions.abort();
    }

    pub fn throttle(&self) -> &HostThrottle<WorkUnit> {
        &self.throttle
    }

    /// Downloads currently running
    pub fn active_downloads(&self) -> usize {
        self.downloads.running()
    }

    /// Extractions currently running
    pub fn active_extractions(&self) -> usize {
        self.extractions.running()
    }
}

async fn extract(unit: WorkUnit, slot: HostSlot, document: Box<dyn Document>) {
    if !unit.crawl.token.is_cancelled() {
        let extracted = guarded(document.extract_links()).await;
        match extracted {
            Ok(links) => {
                tracing::trace!("{} links on {}", links.len(), unit.url);
                unit.crawl.state.add_links(links);
            }
            Err(error) => unit.crawl.record(&unit.url, error),
        }
    }
    drop(slot);
    drop(unit);
}

/// Runs a collaborator call, turning a panic into an unexpected failure
async fn guarded<T>(call: impl Future<Output = Result<T, TaskError>>) -> Result<T, TaskError> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(TaskError::Unexpected(anyhow::anyhow!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
