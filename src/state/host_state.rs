use std::collections::VecDeque;

/// Tracks admission for one remote host
///
/// `admitted` counts in-flight operations holding one of the host's slots;
/// it never exceeds `limit`. Work that finds no free slot waits in `backlog`
/// in arrival order.
#[derive(Debug)]
pub struct HostState<T> {
    /// Number of operations currently holding a slot
    admitted: usize,

    /// Maximum number of simultaneous operations for this host
    limit: usize,

    /// Work waiting for a slot, oldest first
    backlog: VecDeque<T>,
}

impl<T> HostState<T> {
    /// Creates an idle host state with the given slot limit
    pub fn new(limit: usize) -> Self {
        Self {
            admitted: 0,
            limit,
            backlog: VecDeque::new(),
        }
    }

    /// Takes a slot if one is free
    ///
    /// Check and increment happen in one step under the caller's lock.
    pub fn try_admit(&mut self) -> bool {
        if self.admitted < self.limit {
            self.admitted += 1;
            true
        } else {
            false
        }
    }

    /// Queues work behind the host's existing backlog
    pub fn enqueue(&mut self, item: T) {
        self.backlog.push_back(item);
    }

    /// Gives back one slot
    ///
    /// If work is waiting, the slot passes straight to the oldest backlog
    /// entry, which is returned for dispatch and `admitted` stays unchanged.
    /// Otherwise the slot is freed.
    pub fn release(&mut self) -> Option<T> {
        debug_assert!(self.admitted > 0, "release without a matching admission");
        match self.backlog.pop_front() {
            Some(next) => Some(next),
            None => {
                self.admitted = self.admitted.saturating_sub(1);
                None
            }
        }
    }

    /// Removes every waiting entry, oldest first
    pub fn drain_backlog(&mut self) -> Vec<T> {
        self.backlog.drain(..).collect()
    }

    /// Removes waiting entries matching `predicate`, keeping the rest in order
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.backlog.len());
        for item in self.backlog.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.backlog = kept;
        removed
    }

    /// Number of operations currently holding a slot
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    /// Maximum number of simultaneous operations
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of entries waiting for a slot
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Whether a slot is free right now
    pub fn has_capacity(&self) -> bool {
        self.admitted < self.limit
    }
}
