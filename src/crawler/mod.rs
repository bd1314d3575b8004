//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - The fetcher and document collaborators, with their HTTP implementations
//! - Worker pools and per-host admission control
//! - The per-level barrier
//! - Overall crawl coordination

mod barrier;
mod coordinator;
mod fetcher;
mod parser;
mod pipeline;
mod pool;
mod throttle;

pub use barrier::{Arrival, LevelCancelled, WaveBarrier, WaveCounter};
pub use coordinator::{CrawlRequest, CrawlResult, WebCrawler};
pub use fetcher::{build_http_client, Document, Fetcher, HttpFetcher};
pub use parser::{parse_links, HtmlDocument};
pub use pipeline::{CrawlContext, DownloadPipeline, WorkUnit};
pub use pool::{PoolClosed, WorkerPool};
pub use throttle::{Admission, HostLoad, HostThrottle, Waiting};
