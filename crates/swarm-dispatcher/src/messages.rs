//! Wire payload for point-to-point task assignment (spec.md §4.3 phase 4,
//! §6: tag `0x16`). Unlike the seven task-mutation gossip tags, this one is
//! never broadcast: it is sent directly to the agent's own node and carries
//! no dedup key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssign {
    pub task_id: Uuid,
    pub agent_id: Uuid,
}
