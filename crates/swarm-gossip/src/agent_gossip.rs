//! Agent gossip: registration, heartbeat, and deregistration. Unlike tasks,
//! agents are a single LWW-merged record per id — there is no sub-action
//! dedup key because the whole record is always resent.

use swarm_model::{Agent, AgentStatus, LamportClock};
use swarm_net::{tag, NetHandle};
use swarm_store::Store;

use crate::error::GossipResult;
use crate::seen::SeenMessages;
use crate::tombstone::TombstoneTracker;

fn dedup_key(agent: &Agent) -> String {
    format!("{}:{}", agent.id, agent.lamport_ts)
}

pub async fn broadcast_agent_register(net: &NetHandle, seen: &mut SeenMessages, agent: &Agent) -> GossipResult<()> {
    seen.mark(&dedup_key(agent));
    net.broadcast(tag::AGENT_REGISTER, serde_json::to_value(agent)?, None).await?;
    Ok(())
}

pub async fn broadcast_agent_heartbeat(net: &NetHandle, seen: &mut SeenMessages, agent: &Agent) -> GossipResult<()> {
    seen.mark(&dedup_key(agent));
    net.broadcast(tag::AGENT_HEARTBEAT, serde_json::to_value(agent)?, None).await?;
    Ok(())
}

/// Deregistration is a tombstone: the agent record is broadcast one last
/// time with `status = Offline`, and the sender remembers the tombstone
/// locally so its own later-arriving stale heartbeats don't resurrect it.
pub async fn broadcast_agent_deregister(
    net: &NetHandle,
    seen: &mut SeenMessages,
    tombstones: &mut TombstoneTracker,
    clock: &LamportClock,
    mut agent: Agent,
) -> GossipResult<()> {
    agent.status = AgentStatus::Offline;
    agent.lamport_ts = clock.tick();
    tombstones.mark(agent.id);
    seen.mark(&dedup_key(&agent));
    net.broadcast(tag::AGENT_DEREGISTER, serde_json::to_value(&agent)?, None).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentGossipOutcome {
    Duplicate,
    Tombstoned,
    Forward { applied: bool },
}

pub fn handle_agent_frame(
    store: &Store,
    clock: &LamportClock,
    seen: &mut SeenMessages,
    tombstones: &mut TombstoneTracker,
    msg_type: u8,
    payload: serde_json::Value,
) -> GossipResult<AgentGossipOutcome> {
    if ![tag::AGENT_REGISTER, tag::AGENT_HEARTBEAT, tag::AGENT_DEREGISTER].contains(&msg_type) {
        return Ok(AgentGossipOutcome::Duplicate);
    }
    let incoming: Agent = serde_json::from_value(payload)?;
    let key = dedup_key(&incoming);
    if seen.contains(&key) {
        return Ok(AgentGossipOutcome::Duplicate);
    }
    seen.mark(&key);
    clock.witness(incoming.lamport_ts);

    if msg_type == tag::AGENT_DEREGISTER {
        tombstones.mark(incoming.id);
    } else if tombstones.is_tombstoned(incoming.id) {
        return Ok(AgentGossipOutcome::Tombstoned);
    }

    let applied = match store.get_agent(incoming.id)? {
        None => {
            store.upsert_agent(&incoming)?;
            true
        }
        Some(current) if incoming.lamport_ts > current.lamport_ts => {
            store.upsert_agent(&incoming)?;
            true
        }
        Some(_) => false,
    };

    Ok(AgentGossipOutcome::Forward { applied })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_agent(lamport_ts: u64, status: AgentStatus) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "a".into(),
            node_id: "node-a".into(),
            tool: "claude".into(),
            model: "x".into(),
            capabilities: vec![],
            multiplexer_session_id: None,
            project_path: "/tmp".into(),
            max_concurrent_tasks: 1,
            status,
            current_task_id: None,
            last_heartbeat: chrono::Utc::now(),
            lamport_ts,
        }
    }

    #[test]
    fn fresh_registration_is_applied() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let mut seen = SeenMessages::new();
        let mut tombstones = TombstoneTracker::new();
        let agent = sample_agent(1, AgentStatus::Idle);

        let outcome = handle_agent_frame(
            &store,
            &clock,
            &mut seen,
            &mut tombstones,
            tag::AGENT_REGISTER,
            serde_json::to_value(&agent).unwrap(),
        )
        .unwrap();
        assert_eq!(outcome, AgentGossipOutcome::Forward { applied: true });
    }

    #[test]
    fn heartbeat_after_deregister_is_suppressed_by_tombstone() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let mut seen = SeenMessages::new();
        let mut tombstones = TombstoneTracker::new();

        let mut agent = sample_agent(1, AgentStatus::Idle);
        handle_agent_frame(
            &store,
            &clock,
            &mut seen,
            &mut tombstones,
            tag::AGENT_REGISTER,
            serde_json::to_value(&agent).unwrap(),
        )
        .unwrap();

        let mut deregistered = agent.clone();
        deregistered.status = AgentStatus::Offline;
        deregistered.lamport_ts = 5;
        handle_agent_frame(
            &store,
            &clock,
            &mut seen,
            &mut tombstones,
            tag::AGENT_DEREGISTER,
            serde_json::to_value(&deregistered).unwrap(),
        )
        .unwrap();

        // A stale heartbeat from before the deregistration, arriving late.
        agent.lamport_ts = 3;
        let outcome = handle_agent_frame(
            &store,
            &clock,
            &mut seen,
            &mut tombstones,
            tag::AGENT_HEARTBEAT,
            serde_json::to_value(&agent).unwrap(),
        )
        .unwrap();
        assert_eq!(outcome, AgentGossipOutcome::Tombstoned);
    }
}
