//! Broker overflow (spec.md §4.3 phase 5): tasks left pending after the
//! local idle pool is exhausted are offered to the broker as bounties,
//! subject to a per-cycle cap and a reputation gate. The dispatcher only
//! needs to know whether a task was successfully handed off; the broker
//! crate owns bounty posting, polling, and reputation bookkeeping.

use async_trait::async_trait;
use swarm_model::Task;

#[async_trait]
pub trait OverflowBroker: Send + Sync {
    /// Offer `task` to the broker as a bounty. Returns `true` iff the task
    /// was accepted for cross-swarm delegation and should be left out of
    /// the local pending pool bookkeeping (the broker now owns the outcome
    /// via whatever resolution path `swarm-broker` drives).
    async fn offer(&self, task: &Task) -> bool;
}

/// Used where no broker is configured (e.g. a single isolated swarm):
/// overflow tasks simply stay pending for the next dispatch cycle.
pub struct NoopBroker;

#[async_trait]
impl OverflowBroker for NoopBroker {
    async fn offer(&self, _task: &Task) -> bool {
        false
    }
}
