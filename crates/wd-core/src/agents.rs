use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{AgentId, AgentSnapshot, AgentStatus, RunId};

// ---------------------------------------------------------------------------
// AgentsView
// ---------------------------------------------------------------------------

/// Read-only access to the current set of agents.
///
/// The embedding application owns agent state; the coordinator only reads
/// snapshots through this trait. Because resume re-validation must observe
/// the world *after* a long remote call, lookups always reflect current
/// state rather than a snapshot captured at call time.
pub trait AgentsView: Send + Sync {
    fn agent(&self, agent_id: &str) -> Option<AgentSnapshot>;

    fn agents(&self) -> Vec<AgentSnapshot>;

    fn agent_by_session_key(&self, session_key: &str) -> Option<AgentSnapshot> {
        self.agents()
            .into_iter()
            .find(|a| a.session_key == session_key)
    }

    /// All agents keyed by id, for the pure reducer passes.
    fn snapshot_map(&self) -> HashMap<AgentId, AgentSnapshot> {
        self.agents()
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// InMemoryAgents
// ---------------------------------------------------------------------------

/// Map-backed [`AgentsView`] for embedders that keep agent state in memory,
/// and for tests.
#[derive(Debug, Default)]
pub struct InMemoryAgents {
    inner: RwLock<HashMap<AgentId, AgentSnapshot>>,
}

impl InMemoryAgents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent snapshot.
    pub fn upsert(&self, snapshot: AgentSnapshot) {
        let mut agents = self.inner.write().expect("agents lock poisoned");
        agents.insert(snapshot.id.clone(), snapshot);
    }

    pub fn remove(&self, agent_id: &str) -> Option<AgentSnapshot> {
        let mut agents = self.inner.write().expect("agents lock poisoned");
        agents.remove(agent_id)
    }

    /// Replace the agent's current run. Returns false if the agent is unknown.
    pub fn set_current_run(&self, agent_id: &str, run_id: Option<RunId>) -> bool {
        let mut agents = self.inner.write().expect("agents lock poisoned");
        match agents.get_mut(agent_id) {
            Some(agent) => {
                agent.status = if run_id.is_some() {
                    AgentStatus::Running
                } else {
                    AgentStatus::Idle
                };
                agent.current_run_id = run_id;
                true
            }
            None => false,
        }
    }

    pub fn set_status(&self, agent_id: &str, status: AgentStatus) -> bool {
        let mut agents = self.inner.write().expect("agents lock poisoned");
        match agents.get_mut(agent_id) {
            Some(agent) => {
                agent.status = status;
                true
            }
            None => false,
        }
    }

    pub fn set_awaiting_input(&self, agent_id: &str, awaiting: bool) -> bool {
        let mut agents = self.inner.write().expect("agents lock poisoned");
        match agents.get_mut(agent_id) {
            Some(agent) => {
                agent.awaiting_user_input = awaiting;
                true
            }
            None => false,
        }
    }

    pub fn mark_activity(&self, agent_id: &str, at_ms: i64) -> bool {
        let mut agents = self.inner.write().expect("agents lock poisoned");
        match agents.get_mut(agent_id) {
            Some(agent) => {
                agent.last_activity_ms = at_ms;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("agents lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AgentsView for InMemoryAgents {
    fn agent(&self, agent_id: &str) -> Option<AgentSnapshot> {
        let agents = self.inner.read().expect("agents lock poisoned");
        agents.get(agent_id).cloned()
    }

    fn agents(&self) -> Vec<AgentSnapshot> {
        let agents = self.inner.read().expect("agents lock poisoned");
        agents.values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
