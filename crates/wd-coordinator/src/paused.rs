use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use wd_core::types::{AgentId, AgentSnapshot, RunId};

// ---------------------------------------------------------------------------
// PausedRunTable
// ---------------------------------------------------------------------------

/// Which run was paused on each agent's behalf.
///
/// An entry is only meaningful while the agent's *current* run id still
/// equals the recorded value; once the agent moves on to another run the
/// entry is garbage and [`sweep_stale`](Self::sweep_stale) reclaims it.
/// Removal goes through compare-and-clear so a caller can only retire the
/// entry it created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PausedRunTable {
    entries: HashMap<AgentId, RunId>,
}

impl PausedRunTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, agent_id: impl Into<AgentId>, run_id: impl Into<RunId>) {
        self.entries.insert(agent_id.into(), run_id.into());
    }

    pub fn get(&self, agent_id: &str) -> Option<&str> {
        self.entries.get(agent_id).map(String::as_str)
    }

    pub fn clear(&mut self, agent_id: &str) -> Option<RunId> {
        self.entries.remove(agent_id)
    }

    /// Remove the entry only if it still records `run_id`.
    pub fn clear_if(&mut self, agent_id: &str, run_id: &str) -> bool {
        if self.entries.get(agent_id).map(String::as_str) == Some(run_id) {
            self.entries.remove(agent_id);
            true
        } else {
            false
        }
    }

    /// Drop every entry whose recorded run no longer matches the agent's
    /// current run in `agents`. Returns how many entries were dropped.
    pub fn sweep_stale(&mut self, agents: &HashMap<AgentId, AgentSnapshot>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|agent_id, run_id| {
            let live = agents
                .get(agent_id)
                .and_then(|a| a.current_run_id.as_deref())
                == Some(run_id.as_str());
            if !live {
                debug!(agent_id, run_id = %run_id, "dropping stale paused-run entry");
            }
            live
        });
        before - self.entries.len()
    }

    /// True when the table records exactly the agent's current run.
    pub fn is_current_run_paused(
        &self,
        agent_id: &str,
        agents: &HashMap<AgentId, AgentSnapshot>,
    ) -> bool {
        match (
            self.entries.get(agent_id).map(String::as_str),
            agents.get(agent_id).and_then(|a| a.current_run_id.as_deref()),
        ) {
            (Some(paused), Some(current)) => paused == current,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn agents(entries: &[(&str, Option<&str>)]) -> HashMap<AgentId, AgentSnapshot> {
        entries
            .iter()
            .map(|(id, run)| {
                let mut snap = AgentSnapshot::new(*id);
                if let Some(run) = run {
                    snap = snap.with_run(*run);
                }
                (id.to_string(), snap)
            })
            .collect()
    }

    #[test]
    fn sweep_drops_mismatched_and_unknown_agents() {
        let mut table = PausedRunTable::new();
        table.record("agent-1", "run-1");
        table.record("agent-2", "run-old");
        table.record("stale-agent", "stale-run");

        let agents = agents(&[("agent-1", Some("run-1")), ("agent-2", Some("run-new"))]);
        let dropped = table.sweep_stale(&agents);

        assert_eq!(dropped, 2);
        assert_eq!(table.get("agent-1"), Some("run-1"));
        assert!(table.get("agent-2").is_none());
        assert!(table.get("stale-agent").is_none());
    }

    #[test]
    fn sweep_drops_entries_for_idle_agents() {
        let mut table = PausedRunTable::new();
        table.record("agent-1", "run-1");

        let agents = agents(&[("agent-1", None)]);
        assert_eq!(table.sweep_stale(&agents), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn clear_if_requires_matching_run() {
        let mut table = PausedRunTable::new();
        table.record("agent-1", "run-1");

        assert!(!table.clear_if("agent-1", "run-2"));
        assert_eq!(table.get("agent-1"), Some("run-1"));
        assert!(table.clear_if("agent-1", "run-1"));
        assert!(table.is_empty());
    }

    #[test]
    fn current_run_paused_needs_exact_match() {
        let mut table = PausedRunTable::new();
        table.record("agent-1", "run-1");

        let live = agents(&[("agent-1", Some("run-1"))]);
        assert!(table.is_current_run_paused("agent-1", &live));

        let moved_on = agents(&[("agent-1", Some("run-2"))]);
        assert!(!table.is_current_run_paused("agent-1", &moved_on));

        let idle = agents(&[("agent-1", None)]);
        assert!(!table.is_current_run_paused("agent-1", &idle));
        assert!(!table.is_current_run_paused("agent-2", &live));
    }
}
