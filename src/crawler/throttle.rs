//! Per-host admission control
//!
//! Every remote host gets a [`HostState`] the first time it is referenced;
//! entries live as long as the crawler and are shared by every crawl running
//! through it. Each entry has its own lock, so hosts never contend with each
//! other.

use crate::state::HostState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Work that can sit in a host backlog
pub trait Waiting {
    /// Whether the work lost its purpose while waiting (its crawl was
    /// cancelled) and should be discarded instead of dispatched
    fn is_abandoned(&self) -> bool;
}

/// Outcome of offering work to a host
#[derive(Debug)]
pub enum Admission<T> {
    /// A slot was taken; the caller must dispatch the work
    Admitted(T),

    /// No slot was free; the work waits in the host backlog
    Queued,

    /// The throttle is closed; the work is handed back to be discarded
    Rejected(T),
}

/// Snapshot of one host's admission state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostLoad {
    pub admitted: usize,
    pub limit: usize,
    pub backlog: usize,
}

/// Bounds concurrent operations per host, queueing the overflow
#[derive(Debug)]
pub struct HostThrottle<T> {
    hosts: DashMap<String, Arc<Mutex<HostState<T>>>>,
    per_host: usize,
    closed: AtomicBool,
}

fn lock<T>(entry: &Mutex<HostState<T>>) -> MutexGuard<'_, HostState<T>> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Waiting> HostThrottle<T> {
    /// Creates a throttle allowing `per_host` simultaneous operations per host
    pub fn new(per_host: usize) -> Self {
        Self {
            hosts: DashMap::new(),
            per_host,
            closed: AtomicBool::new(false),
        }
    }

    fn entry(&self, host: &str) -> Arc<Mutex<HostState<T>>> {
        if let Some(entry) = self.hosts.get(host) {
            return Arc::clone(entry.value());
        }
        Arc::clone(
            self.hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(HostState::new(self.per_host))))
                .value(),
        )
    }

    /// Tries to take a slot for `host` without queueing anything
    pub fn admit(&self, host: &str) -> bool {
        if self.is_closed() {
            return false;
        }
        lock(&self.entry(host)).try_admit()
    }

    /// Appends `item` to the backlog of `host` without trying to admit it
    ///
    /// Hands the item back once the throttle is closed.
    pub fn enqueue(&self, host: &str, item: T) -> Result<(), T> {
        if self.is_closed() {
            return Err(item);
        }
        lock(&self.entry(host)).enqueue(item);
        Ok(())
    }

    /// Takes a slot for `host` or appends `item` to the host backlog, as one
    /// step under the host's lock
    pub fn admit_or_enqueue(&self, host: &str, item: T) -> Admission<T> {
        if self.is_closed() {
            return Admission::Rejected(item);
        }

        let entry = self.entry(host);
        let mut state = lock(&entry);
        if state.try_admit() {
            tracing::trace!(
                "Admitted work for {} ({}/{})",
                host,
                state.admitted(),
                state.limit()
            );
            Admission::Admitted(item)
        } else {
            state.enqueue(item);
            tracing::trace!("Queued work for {} (backlog {})", host, state.backlog_len());
            Admission::Queued
        }
    }

    /// Gives back one slot of `host`
    ///
    /// If live work waits in the backlog it inherits the slot and is returned
    /// for dispatch. Abandoned entries met on the way are discarded. After
    /// close the slot is simply freed.
    pub fn release(&self, host: &str) -> Option<T> {
        let entry = self.entry(host);
        let mut discarded = Vec::new();

        let next = {
            let mut state = lock(&entry);
            if self.is_closed() {
                discarded.extend(state.drain_backlog());
                state.release();
                None
            } else {
                loop {
                    match state.release() {
                        Some(item) if item.is_abandoned() => discarded.push(item),
                        other => break other,
                    }
                }
            }
        };

        if !discarded.is_empty() {
            tracing::trace!("Discarded {} waiting entries for {}", discarded.len(), host);
        }
        drop(discarded);
        next
    }

    /// Removes abandoned entries from every backlog and returns how many
    pub fn purge_abandoned(&self) -> usize {
        let entries: Vec<_> = self.hosts.iter().map(|e| Arc::clone(e.value())).collect();
        let mut purged = 0;
        for entry in entries {
            let removed = lock(&entry).remove_where(T::is_abandoned);
            purged += removed.len();
        }
        purged
    }

    /// Stops admitting work and discards every backlog
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let entries: Vec<_> = self.hosts.iter().map(|e| Arc::clone(e.value())).collect();
        let mut discarded = 0;
        for entry in entries {
            let removed = lock(&entry).drain_backlog();
            discarded += removed.len();
        }
        tracing::debug!("Host throttle closed, discarded {} waiting entries", discarded);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current load of `host`, if it was ever referenced
    pub fn load(&self, host: &str) -> Option<HostLoad> {
        let entry = Arc::clone(self.hosts.get(host)?.value());
        let state = lock(&entry);
        Some(HostLoad {
            admitted: state.admitted(),
            limit: state.limit(),
            backlog: state.backlog_len(),
        })
    }

    /// Number of hosts referenced so far
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}
