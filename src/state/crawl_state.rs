use crate::{PageError, TaskFailure};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-crawl state written by worker tasks
///
/// Created at the start of one `download` call and consumed at its end.
/// Every mutation is a single atomic step: the failure map is a concurrent
/// map with first-writer-wins inserts, the link accumulator and the
/// unexpected-failure list sit behind their own mutexes.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// URL -> reason of its first failure
    failures: DashMap<String, PageError>,

    /// Links discovered during the current level
    links: Mutex<HashSet<String>>,

    /// Unexpected per-task failures in the order they happened
    unexpected: Mutex<Vec<TaskFailure>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `url` unless one is already recorded
    ///
    /// Returns `true` if this call recorded the failure.
    pub fn record_failure(&self, url: &str, reason: PageError) -> bool {
        match self.failures.entry(url.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(reason);
                true
            }
        }
    }

    /// Whether a failure is recorded for `url`
    pub fn is_failed(&self, url: &str) -> bool {
        self.failures.contains_key(url)
    }

    /// Number of failed URLs
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Adds links discovered on one page to the current level
    pub fn add_links(&self, links: impl IntoIterator<Item = String>) {
        lock(&self.links).extend(links);
    }

    /// Takes the links discovered so far, leaving an empty accumulator
    ///
    /// Only called after the level's barrier has fired, when no worker of
    /// that level can still write.
    pub fn take_links(&self) -> HashSet<String> {
        std::mem::take(&mut *lock(&self.links))
    }

    /// Collects an unexpected failure to be raised after the crawl
    pub fn record_unexpected(&self, failure: TaskFailure) {
        lock(&self.unexpected).push(failure);
    }

    /// Takes every collected unexpected failure
    pub fn take_unexpected(&self) -> Vec<TaskFailure> {
        std::mem::take(&mut *lock(&self.unexpected))
    }

    /// Takes the failure map, leaving it empty
    pub fn take_failures(&self) -> HashMap<String, PageError> {
        let urls: Vec<String> = self.failures.iter().map(|e| e.key().clone()).collect();
        urls.into_iter()
            .filter_map(|url| self.failures.remove(&url))
            .collect()
    }
}

/// URLs a crawl has reserved for download, in the order they were reserved
///
/// Owned by the orchestrator; a URL is reserved before its fetch starts so
/// that rediscovering it later never submits it twice.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `url`; returns `false` if it was already reserved
    pub fn insert(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.order.push(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reserved URLs minus those that failed, in reservation order
    pub fn downloaded(self, state: &CrawlState) -> Vec<String> {
        self.order
            .into_iter()
            .filter(|url| !state.is_failed(url))
            .collect()
    }
}
