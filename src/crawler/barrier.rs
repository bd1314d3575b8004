//! Per-level synchronization barrier
//!
//! A crawl registers every unit of work of a depth level before dispatching
//! it, then waits until each unit has arrived. Registration hands out one
//! [`Arrival`] ticket per unit; the ticket arrives when it is dropped, so a
//! unit is counted exactly once whichever way it ends.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Counters of the level in progress
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WaveCounter {
    /// Units registered for the level
    pub expected: usize,

    /// Units that have arrived
    pub arrived: usize,
}

impl WaveCounter {
    /// The level is complete exactly when every registered unit arrived
    pub fn is_complete(&self) -> bool {
        self.arrived == self.expected
    }
}

/// The wait for a level ended because its token was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCancelled;

/// Reusable barrier counting arrivals for one depth level at a time
#[derive(Debug, Default)]
pub struct WaveBarrier {
    counter: Mutex<WaveCounter>,
    notify: Notify,
}

impl WaveBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self) -> MutexGuard<'_, WaveCounter> {
        self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `n` more units for the current level
    ///
    /// Must be called before the units are dispatched. Each returned ticket
    /// must travel with its unit.
    pub fn register(self: &Arc<Self>, n: usize) -> Vec<Arrival> {
        self.counter().expected += n;
        (0..n)
            .map(|_| Arrival {
                barrier: Arc::clone(self),
            })
            .collect()
    }

    fn arrive(&self) {
        let complete = {
            let mut counter = self.counter();
            debug_assert!(
                counter.arrived < counter.expected,
                "arrival without registration"
            );
            counter.arrived += 1;
            counter.is_complete()
        };

        if complete {
            self.notify.notify_waiters();
        }
    }

    /// Snapshot of the current counters
    pub fn snapshot(&self) -> WaveCounter {
        *self.counter()
    }

    /// Waits until every registered unit has arrived, then resets the
    /// counters for the next level
    ///
    /// Returns `Err(LevelCancelled)` as soon as `token` is cancelled; the
    /// counters are then left as they are and outstanding tickets may still
    /// arrive harmlessly.
    pub async fn await_level(&self, token: &CancellationToken) -> Result<(), LevelCancelled> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so an arrival between the
            // check and the await still wakes us.
            notified.as_mut().enable();

            {
                let mut counter = self.counter();
                if counter.is_complete() {
                    *counter = WaveCounter::default();
                    return Ok(());
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(LevelCancelled),
                _ = &mut notified => {}
            }
        }
    }
}

/// One registered unit of work; arrives at its barrier when dropped
#[derive(Debug)]
#[must_use = "dropping an Arrival counts the unit as finished"]
pub struct Arrival {
    barrier: Arc<WaveBarrier>,
}

impl Arrival {
    /// Marks the unit as finished
    pub fn arrive(self) {
        drop(self);
    }
}

impl Drop for Arrival {
    fn drop(&mut self) {
        self.barrier.arrive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_level_completes_immediately() {
        let barrier = Arc::new(WaveBarrier::new());
        let token = CancellationToken::new();

        assert!(barrier.register(0).is_empty());
        assert_eq!(barrier.await_level(&token).await, Ok(()));
    }

    #[tokio::test]
    async fn test_counts_arrivals() {
        let barrier = Arc::new(WaveBarrier::new());
        let mut tickets = barrier.register(3);

        assert_eq!(
            barrier.snapshot(),
            WaveCounter {
                expected: 3,
                arrived: 0
            }
        );

        tickets.pop().unwrap().arrive();
        drop(tickets.pop());
        assert_eq!(barrier.snapshot().arrived, 2);
        assert!(!barrier.snapshot().is_complete());

        drop(tickets);
        assert!(barrier.snapshot().is_complete());
    }

    #[tokio::test]
    async fn test_await_level_resets_counters() {
        let barrier = Arc::new(WaveBarrier::new());
        let token = CancellationToken::new();

        drop(barrier.register(2));
        barrier.await_level(&token).await.unwrap();
        assert_eq!(barrier.snapshot(), WaveCounter::default());

        let ticket = barrier.register(1);
        assert_eq!(barrier.snapshot().expected, 1);
        drop(ticket);
        barrier.await_level(&token).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wakes_when_last_task_arrives() {
        let barrier = Arc::new(WaveBarrier::new());
        let token = CancellationToken::new();

        for (i, ticket) in barrier.register(16).into_iter().enumerate() {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis((i % 4) as u64 * 5)).await;
                ticket.arrive();
            });
        }

        tokio::time::timeout(Duration::from_secs(5), barrier.await_level(&token))
            .await
            .expect("level never completed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_waiter() {
        let barrier = Arc::new(WaveBarrier::new());
        let token = CancellationToken::new();
        let _pending = barrier.register(1);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), barrier.await_level(&token))
            .await
            .expect("cancellation did not unblock the waiter");
        assert_eq!(outcome, Err(LevelCancelled));
    }
}
