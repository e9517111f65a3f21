//! Bounded dedup set for push-flood gossip (spec.md §4.5, §5 back-pressure:
//! "seen-message sets are bounded (5-10k) with half-reset eviction").
//!
//! A flat cap-then-clear would cause a thundering-herd of re-broadcasts the
//! instant the set is cleared; half-reset keeps the more-recently-seen half
//! so a message re-flooded moments after eviction is still recognized.

use std::collections::HashSet;

const DEFAULT_CAPACITY: usize = 10_000;

pub struct SeenMessages {
    seen: HashSet<String>,
    insertion_order: Vec<String>,
    capacity: usize,
}

impl SeenMessages {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            insertion_order: Vec::new(),
            capacity,
        }
    }

    /// Returns `true` iff `key` had already been marked seen.
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Mark `key` as seen. Evicts the older half of the set once at
    /// capacity, rather than clearing it entirely.
    pub fn mark(&mut self, key: &str) {
        if self.seen.contains(key) {
            return;
        }
        if self.seen.len() >= self.capacity {
            self.half_reset();
        }
        self.seen.insert(key.to_string());
        self.insertion_order.push(key.to_string());
    }

    fn half_reset(&mut self) {
        let drop_count = self.insertion_order.len() / 2;
        let dropped: Vec<String> = self.insertion_order.drain(0..drop_count).collect();
        for key in dropped {
            self.seen.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for SeenMessages {
    fn default() -> Self {
        Self::new()
    }
}
