//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `HostState`: per-host admission counter and backlog, shared by every crawl
//! - `CrawlState`: failures, discovered links and unexpected errors of one crawl
//! - `VisitedSet`: URLs reserved for download by one crawl, in BFS order

mod crawl_state;
mod host_state;

// Re-export main types
pub use crawl_state::{CrawlState, VisitedSet};
pub use host_state::HostState;
