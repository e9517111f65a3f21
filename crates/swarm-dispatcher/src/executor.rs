//! Local task delivery (spec.md §4.3 phase 4: "drive local delivery via the
//! external multiplexer bridge"). The dispatcher is generic over how a task
//! actually reaches an agent process; `swarm-node` supplies the concrete
//! implementation that talks to whatever multiplexer/session backend the
//! node runs.

use async_trait::async_trait;
use swarm_model::{Agent, Task};

/// Hands a claimed task to a local agent. Implementors drive whatever
/// session/multiplexer mechanism actually runs the agent process; the
/// dispatcher only needs to know whether the handoff succeeded.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn deliver(&self, task: &Task, agent: &Agent) -> Result<(), String>;
}

/// Delivery backend used when no multiplexer bridge is configured: every
/// handoff fails immediately so the task stays pending rather than being
/// silently dropped.
pub struct NoopExecutor;

#[async_trait]
impl AgentExecutor for NoopExecutor {
    async fn deliver(&self, _task: &Task, _agent: &Agent) -> Result<(), String> {
        Err("no local executor configured".into())
    }
}
