//! Bounded worker pools
//!
//! A pool runs submitted jobs as tokio tasks, at most `size` of them at a
//! time. Jobs are tracked so the pool can be closed, drained within a grace
//! period and, if the period elapses, cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A job was submitted to a pool that no longer accepts work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} pool is closed")]
pub struct PoolClosed(pub &'static str);

/// A named pool of at most `size` concurrently running jobs
#[derive(Debug)]
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    abort: CancellationToken,
}

impl WorkerPool {
    /// Creates a pool running at most `size` jobs at once
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            abort: CancellationToken::new(),
        }
    }

    /// Submits a job
    ///
    /// The job waits for a free worker, then runs to completion unless the
    /// pool is force-cancelled, in which case it is dropped where it stands.
    /// A rejected job is dropped before this returns.
    pub fn spawn<F>(&self, job: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            return Err(PoolClosed(self.name));
        }
        let Ok(handle) = Handle::try_current() else {
            return Err(PoolClosed(self.name));
        };

        let permits = Arc::clone(&self.permits);
        let abort = self.abort.clone();
        let name = self.name;

        self.tracker.spawn_on(
            async move {
                tokio::select! {
                    biased;
                    _ = abort.cancelled() => {
                        tracing::trace!("{} job cancelled", name);
                    }
                    _ = async move {
                        if let Ok(_permit) = permits.acquire_owned().await {
                            job.await;
                        }
                    } => {}
                }
            },
            &handle,
        );
        Ok(())
    }

    /// Stops accepting jobs and waits for submitted ones
    ///
    /// Jobs still pending after `grace` are cancelled. Returns `true` if the
    /// pool drained without cancelling anything.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            tracing::debug!("{} pool drained", self.name);
            return true;
        }

        tracing::warn!(
            "{} pool did not drain within {:?}, cancelling {} jobs",
            self.name,
            grace,
            self.tracker.len()
        );
        self.abort.cancel();
        self.tracker.wait().await;
        false
    }

    /// Stops accepting jobs and cancels the submitted ones without waiting
    pub fn abort(&self) {
        self.tracker.close();
        self.abort.cancel();
    }

    /// Whether the pool stopped accepting jobs
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Number of jobs currently holding a worker
    pub fn running(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    /// Number of submitted jobs that have not finished
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Maximum number of concurrently running jobs
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
