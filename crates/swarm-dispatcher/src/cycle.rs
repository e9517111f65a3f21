//! The dispatcher's four in-order phases plus overflow (spec.md §4.3).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use swarm_model::{AgentStatus, LamportClock, Task, TaskStatus};
use swarm_net::{tag, NetHandle};
use swarm_queue::{cascade_fail, claim, unblock};
use swarm_store::Store;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DispatchResult;
use crate::executor::AgentExecutor;
use crate::messages::TaskAssign;
use crate::overflow::OverflowBroker;
use crate::select::pick_agent;

/// Capability an agent must advertise to take planning work.
const PLANNER_CAPABILITY: &str = "planner";
/// Cap on how many pending tasks get offered to the broker in one wake.
const MAX_OVERFLOW_PER_CYCLE: usize = 10;

pub struct Dispatcher {
    store: Arc<Store>,
    clock: Arc<LamportClock>,
    net: NetHandle,
    local_node_id: String,
    executor: Arc<dyn AgentExecutor>,
    broker: Arc<dyn OverflowBroker>,
    fairness_cursor: AtomicUsize,
}

/// Tally of what one wake accomplished, surfaced for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cascaded_failures: usize,
    pub unblocked: usize,
    pub planning_dispatched: usize,
    pub main_dispatched: usize,
    pub overflowed: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<LamportClock>,
        net: NetHandle,
        local_node_id: String,
        executor: Arc<dyn AgentExecutor>,
        broker: Arc<dyn OverflowBroker>,
    ) -> Self {
        Self {
            store,
            clock,
            net,
            local_node_id,
            executor,
            broker,
            fairness_cursor: AtomicUsize::new(0),
        }
    }

    /// Runs all five phases once. Errors abort the cycle outright (the next
    /// wake, whether triggered or heartbeat, simply tries again).
    pub async fn run_cycle(&self) -> DispatchResult<CycleReport> {
        let mut report = CycleReport::default();

        report.cascaded_failures = cascade_fail(&self.store, &self.clock)?;
        report.unblocked = unblock(&self.store, &self.clock)?;
        report.planning_dispatched = self.dispatch_planning().await?;
        report.main_dispatched = self.dispatch_pending().await?;
        report.overflowed = self.overflow_remaining().await?;

        debug!(?report, "dispatch cycle complete");
        Ok(report)
    }

    /// Planning tasks go to idle `planner` agents one at a time; planners
    /// execute sequentially, so only one is ever claimed per cycle.
    async fn dispatch_planning(&self) -> DispatchResult<usize> {
        let planning = self.store.list_by_status(TaskStatus::Planning)?;
        let Some(task) = planning.into_iter().next() else {
            return Ok(0);
        };

        let planners = self
            .store
            .list_idle_agents_with_capabilities(&[PLANNER_CAPABILITY.to_string()])?;
        let Some(agent) = planners.into_iter().next() else {
            return Ok(0);
        };

        if self.assign(&task, &agent).await? {
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn dispatch_pending(&self) -> DispatchResult<usize> {
        let pending = self.store.list_by_status(TaskStatus::Pending)?;
        let mut dispatched = 0;

        for task in pending {
            let idle = self.store.list_idle_agents_with_capabilities(&task.required_capabilities)?;
            if idle.is_empty() {
                continue;
            }
            let cursor = self.fairness_cursor.fetch_add(1, Ordering::Relaxed);
            let Some(agent) = pick_agent(&task, &idle, cursor) else {
                continue;
            };
            if self.assign(&task, agent).await? {
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    /// Assigns `task` to `agent`: local agents are driven through the
    /// executor and CAS straight to `InProgress`; remote agents are sent
    /// `TASK_ASSIGN` and optimistically CAS'd to `Claimed`, trusting gossip
    /// to confirm. A failed send to a remote node leaves the task pending.
    /// A winning claim also CAS's the agent Idle->Busy so the same agent
    /// can never be handed a second task within the same dispatch cycle
    /// (spec.md §3: "busy iff exactly one non-terminal task ... assigned").
    async fn assign(&self, task: &Task, agent: &swarm_model::Agent) -> DispatchResult<bool> {
        if agent.node_id == self.local_node_id {
            if !claim(&self.store, &self.clock, task.id, agent.id, &self.local_node_id)? {
                return Ok(false);
            }
            self.mark_agent_busy(agent.id, task.id)?;
            if let Err(e) = self.executor.deliver(task, agent).await {
                warn!(task_id = %task.id, error = %e, "local delivery failed");
                return Ok(false);
            }
            let ts = self.clock.tick();
            self.store.transition_task(task.id, &[TaskStatus::Claimed], |t| {
                t.status = TaskStatus::InProgress;
                t.updated_at = chrono::Utc::now();
                t.lamport_ts = ts;
            })?;
            return Ok(true);
        }

        let applied = claim(&self.store, &self.clock, task.id, agent.id, &agent.node_id)?;
        if !applied {
            return Ok(false);
        }
        self.mark_agent_busy(agent.id, task.id)?;
        let payload = serde_json::to_value(TaskAssign {
            task_id: task.id,
            agent_id: agent.id,
        })?;
        if let Err(e) = self.net.send_to(agent.node_id.clone(), tag::TASK_ASSIGN, payload).await {
            warn!(task_id = %task.id, node_id = %agent.node_id, error = %e, "remote assignment send failed");
        }
        Ok(true)
    }

    /// CAS an agent from `Idle` to `Busy` with `current_task_id` set. A lost
    /// race (agent already claimed by a concurrent assignment) is not an
    /// error here — the task itself already won its own claim CAS, which is
    /// the invariant that actually matters.
    fn mark_agent_busy(&self, agent_id: Uuid, task_id: Uuid) -> DispatchResult<()> {
        let ts = self.clock.tick();
        self.store.transition_agent(agent_id, &[AgentStatus::Idle], |a| {
            a.status = AgentStatus::Busy;
            a.current_task_id = Some(task_id);
            a.lamport_ts = ts;
        })?;
        Ok(())
    }

    /// Tasks still pending after local/known-remote dispatch are offered to
    /// the broker up to a per-cycle cap; the broker's own reputation gate
    /// decides whether each is actually accepted. An accepted task is CAS'd
    /// to `Claimed` so the next wake's phases leave it alone while the
    /// broker's own resolution poll owns its outcome — otherwise a task
    /// stuck waiting on a slow cross-swarm bounty would be re-offered (and
    /// double-posted) on every subsequent cycle.
    async fn overflow_remaining(&self) -> DispatchResult<usize> {
        let pending = self.store.list_by_status(TaskStatus::Pending)?;
        let mut offered = 0;
        for task in pending.into_iter().take(MAX_OVERFLOW_PER_CYCLE) {
            if self.broker.offer(&task).await {
                let ts = self.clock.tick();
                self.store.transition_task(task.id, &[TaskStatus::Pending], |t| {
                    t.status = TaskStatus::Claimed;
                    t.claimed_at = Some(chrono::Utc::now());
                    t.updated_at = chrono::Utc::now();
                    t.lamport_ts = ts;
                })?;
                offered += 1;
            }
        }
        Ok(offered)
    }
}
