use std::sync::atomic::{AtomicU64, Ordering};

/// A Lamport logical clock. Every mutation to replicated state is stamped
/// with a fresh [`tick`](LamportClock::tick); remote timestamps are folded
/// in via [`witness`](LamportClock::witness) so causal order is preserved
/// across nodes without wall-clock synchronization.
#[derive(Debug, Default)]
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    pub fn new(initial: u64) -> Self {
        Self {
            counter: AtomicU64::new(initial),
        }
    }

    /// Advance the clock and return the new value.
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fold in a timestamp observed from a remote node: the clock becomes
    /// `max(local, remote) + 1`.
    pub fn witness(&self, remote: u64) -> u64 {
        let mut current = self.counter.load(Ordering::SeqCst);
        loop {
            let next = current.max(remote) + 1;
            match self.counter.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current value without advancing.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Clone for LamportClock {
    fn clone(&self) -> Self {
        Self::new(self.current())
    }
}

/// Last-writer-wins comparison for replicated records: higher `lamport_ts`
/// wins, ties broken by higher node-id.
pub fn lww_wins(candidate_ts: u64, candidate_node: &str, incumbent_ts: u64, incumbent_node: &str) -> bool {
    (candidate_ts, candidate_node) > (incumbent_ts, incumbent_node)
}
