//! The overflow delegator (spec.md §4.3 phase 5, §4.6): tasks the local
//! dispatcher can't place are offered here as bounties. Capable remote
//! swarms are discovered from the offering table, gated on reputation,
//! and — once one claims the bounty — polled until it resolves. On
//! `completed` the local task is completed with the remote result; on
//! `failed`/`expired` reputation is debited and the task returns to the
//! pending pool (spec.md §4.6), not to a terminal `Failed` — the remote
//! swarm's failure says nothing about whether the work itself is
//! impossible, so the task stays eligible to be redispatched locally or
//! offered to a different remote swarm.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swarm_dispatcher::overflow::OverflowBroker;
use swarm_model::{BountyStatus, LamportClock, Task};
use swarm_queue::{apply_report, requeue_to_pending, AgentReport};
use swarm_store::Store;
use tracing::{info, warn};
use uuid::Uuid;

use crate::board::Board;
use crate::reputation::ReputationLedger;

const DEFAULT_TTL_MINUTES: i64 = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// How long to keep polling a claimed bounty before treating it as
/// abandoned and debiting the claimant.
const MAX_POLL_ROUNDS: u32 = 360;

pub struct BrokerOverflowDelegator {
    store: Arc<Store>,
    clock: Arc<LamportClock>,
    board: Arc<Board>,
    reputation: Arc<ReputationLedger>,
    reputation_floor: f64,
}

impl BrokerOverflowDelegator {
    pub fn new(store: Arc<Store>, clock: Arc<LamportClock>, board: Arc<Board>, reputation: Arc<ReputationLedger>, reputation_floor: f64) -> Self {
        Self { store, clock, board, reputation, reputation_floor }
    }

    /// Any peer swarm advertising every capability the task requires, with
    /// an acceptable reputation score. Empty required-capabilities matches
    /// any offering, same as the local dispatcher's capability filter.
    fn find_capable_swarm(&self, task: &Task) -> bool {
        match self.store.list_offerings() {
            Ok(offerings) => offerings.iter().any(|o| {
                task.required_capabilities.iter().all(|c| o.capabilities.contains(c))
                    && self.reputation.meets_floor(&o.node_id, self.reputation_floor).unwrap_or(false)
            }),
            Err(e) => {
                warn!(error = %e, "failed to list offerings for overflow delegation");
                false
            }
        }
    }
}

#[async_trait]
impl OverflowBroker for BrokerOverflowDelegator {
    async fn offer(&self, task: &Task) -> bool {
        if !self.find_capable_swarm(task) {
            return false;
        }

        let posted = self
            .board
            .post_bounty(
                task.title.clone(),
                task.required_capabilities.clone(),
                self.reputation_floor,
                chrono::Duration::minutes(DEFAULT_TTL_MINUTES),
            )
            .await;
        let bounty = match posted {
            Ok(b) => b,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "failed to post overflow bounty");
                return false;
            }
        };

        info!(task_id = %task.id, bounty_id = %bounty.id, "task offered to the broker");
        spawn_resolution_poll(self.store.clone(), self.clock.clone(), self.board.clone(), self.reputation.clone(), task.id, bounty.id);
        true
    }
}

/// Background coroutine: poll the bounty until it leaves `Claimed`, then
/// route the outcome back onto the local task.
fn spawn_resolution_poll(
    store: Arc<Store>,
    clock: Arc<LamportClock>,
    board: Arc<Board>,
    reputation: Arc<ReputationLedger>,
    task_id: Uuid,
    bounty_id: Uuid,
) {
    tokio::spawn(async move {
        for _ in 0..MAX_POLL_ROUNDS {
            tokio::time::sleep(POLL_INTERVAL).await;

            let bounty = match store.get_bounty(bounty_id) {
                Ok(Some(b)) => b,
                Ok(None) => return,
                Err(e) => {
                    warn!(bounty_id = %bounty_id, error = %e, "bounty lookup failed during poll");
                    continue;
                }
            };

            match bounty.status {
                BountyStatus::Completed => {
                    if let Some(peer) = &bounty.claimed_by_swarm {
                        let _ = reputation.record_completion(peer, 1.0, 1.0, 1.0);
                    }
                    let result = format!("Completed via cross-swarm bounty {bounty_id}");
                    let _ = apply_report(&store, &clock, task_id, AgentReport::Complete { result });
                    return;
                }
                BountyStatus::Failed | BountyStatus::Cancelled | BountyStatus::Expired => {
                    if let Some(peer) = &bounty.claimed_by_swarm {
                        let _ = reputation.record_failure(peer, "bounty_resolution_failed");
                    }
                    let _ = requeue_to_pending(
                        &store,
                        &clock,
                        task_id,
                        &format!("Cross-swarm bounty {bounty_id} did not complete; returned to local queue"),
                    );
                    return;
                }
                BountyStatus::Open | BountyStatus::Claimed => continue,
            }
        }

        // Exhausted the poll budget without resolution: treat like an
        // expiry so the task returns to the local pending pool rather than
        // hanging forever.
        warn!(bounty_id = %bounty_id, task_id = %task_id, "overflow bounty poll budget exhausted, reclaiming task");
        let _ = board.resolve_bounty(bounty_id, BountyStatus::Expired).await;
        let _ = requeue_to_pending(&store, &clock, task_id, "Cross-swarm bounty resolution timed out; returned to local queue");
    });
}
