//! Tombstone tracking (spec.md §4.5): agent deregistration and offering
//! withdrawal both broadcast a tombstone that must outrun in-flight stale
//! heartbeats/advertisements for a fixed window, rather than relying on
//! Lamport order alone — a heartbeat queued on a slow connection can still
//! arrive after the tombstone despite carrying an earlier wall-clock origin.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// How long a tombstone suppresses re-application of a stale record for the
/// same key (spec.md §4.5: "kept for 120 s").
pub const TOMBSTONE_TTL: Duration = Duration::from_secs(120);

#[derive(Default)]
pub struct TombstoneTracker {
    tombstoned_at: HashMap<Uuid, Instant>,
}

impl TombstoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, key: Uuid) {
        self.tombstoned_at.insert(key, Instant::now());
    }

    /// Whether `key` is still within its tombstone window.
    pub fn is_tombstoned(&self, key: Uuid) -> bool {
        matches!(self.tombstoned_at.get(&key), Some(at) if at.elapsed() < TOMBSTONE_TTL)
    }

    /// Drop tombstones whose window has elapsed. Call periodically.
    pub fn sweep_expired(&mut self) {
        self.tombstoned_at.retain(|_, at| at.elapsed() < TOMBSTONE_TTL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_marked_key_is_tombstoned() {
        let mut t = TombstoneTracker::new();
        let id = Uuid::new_v4();
        t.mark(id);
        assert!(t.is_tombstoned(id));
    }

    #[test]
    fn unmarked_key_is_not_tombstoned() {
        let t = TombstoneTracker::new();
        assert!(!t.is_tombstoned(Uuid::new_v4()));
    }

    #[test]
    fn sweep_leaves_fresh_tombstones_in_place() {
        let mut t = TombstoneTracker::new();
        let id = Uuid::new_v4();
        t.mark(id);
        t.sweep_expired();
        assert!(t.is_tombstoned(id));
    }
}
