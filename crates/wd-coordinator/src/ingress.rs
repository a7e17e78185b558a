//! Pure reducer merging remote approval deltas into local pending state.

use std::collections::HashMap;

use wd_core::types::{AgentId, AgentSnapshot, ExecApproval};
use wd_runtime::events::IngressDelta;

use crate::paused::PausedRunTable;
use crate::pending::PendingApprovalState;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A scoped approval that needs its agent's run paused.
#[derive(Debug, Clone)]
pub struct PauseRequest {
    pub approval: ExecApproval,
    pub preferred_agent_id: AgentId,
}

/// Result of one ingress pass.
#[derive(Debug, Clone)]
pub struct IngressOutcome {
    pub state: PendingApprovalState,
    /// Agents whose activity timestamp should be refreshed, passed through
    /// from the delta untouched.
    pub mark_activity: Vec<AgentId>,
    pub pause_requests: Vec<PauseRequest>,
}

// ---------------------------------------------------------------------------
// apply_ingress
// ---------------------------------------------------------------------------

/// Merge `delta` into `state`: removals first, then upserts, then decide
/// which scoped upserts require pausing their agent.
///
/// A pause request is suppressed when the paused-run table already records
/// the agent's *current* run — re-pausing an already-paused run would issue
/// a redundant abort.
pub fn apply_ingress(
    mut state: PendingApprovalState,
    delta: IngressDelta,
    agents: &HashMap<AgentId, AgentSnapshot>,
    paused: &PausedRunTable,
) -> IngressOutcome {
    for id in &delta.removals {
        state.remove(id);
    }

    for approval in delta.unscoped_upserts {
        state.upsert_unscoped(approval);
    }

    let mut pause_requests = Vec::new();
    for (agent_id, approval) in delta.scoped_upserts {
        state.upsert_scoped(&agent_id, approval.clone());
        if !paused.is_current_run_paused(&agent_id, agents) {
            pause_requests.push(PauseRequest {
                approval,
                preferred_agent_id: agent_id,
            });
        }
    }

    IngressOutcome {
        state,
        mark_activity: delta.mark_activity,
        pause_requests,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(id: &str) -> ExecApproval {
        ExecApproval::new(id, "agent:agent-1:main", "npm publish", 10_000)
    }

    fn one_agent(id: &str, run: Option<&str>) -> HashMap<AgentId, AgentSnapshot> {
        let mut snap = AgentSnapshot::new(id);
        if let Some(run) = run {
            snap = snap.with_run(run);
        }
        HashMap::from([(id.to_string(), snap)])
    }

    #[test]
    fn removals_apply_before_upserts() {
        let mut state = PendingApprovalState::new();
        state.upsert_scoped("agent-1", approval("a-1"));

        let delta = IngressDelta {
            removals: vec!["a-1".into()],
            scoped_upserts: vec![("agent-1".into(), approval("a-1").scoped_to("agent-1"))],
            ..Default::default()
        };
        let outcome = apply_ingress(state, delta, &one_agent("agent-1", Some("run-1")), &PausedRunTable::new());

        // the re-upserted approval is present exactly once
        assert_eq!(outcome.state.scoped("agent-1").len(), 1);
        assert_eq!(outcome.state.len(), 1);
    }

    #[test]
    fn scoped_upsert_emits_pause_request() {
        let delta = IngressDelta {
            scoped_upserts: vec![("agent-1".into(), approval("a-1").scoped_to("agent-1"))],
            ..Default::default()
        };
        let outcome = apply_ingress(
            PendingApprovalState::new(),
            delta,
            &one_agent("agent-1", Some("run-1")),
            &PausedRunTable::new(),
        );

        assert_eq!(outcome.pause_requests.len(), 1);
        assert_eq!(outcome.pause_requests[0].preferred_agent_id, "agent-1");
        assert_eq!(outcome.pause_requests[0].approval.id, "a-1");
    }

    #[test]
    fn already_paused_current_run_suppresses_pause_request() {
        let mut paused = PausedRunTable::new();
        paused.record("agent-1", "run-1");

        let delta = IngressDelta {
            scoped_upserts: vec![("agent-1".into(), approval("a-2").scoped_to("agent-1"))],
            ..Default::default()
        };
        let outcome = apply_ingress(
            PendingApprovalState::new(),
            delta,
            &one_agent("agent-1", Some("run-1")),
            &paused,
        );

        assert!(outcome.pause_requests.is_empty());
        assert_eq!(outcome.state.scoped("agent-1").len(), 1);
    }

    #[test]
    fn stale_paused_entry_does_not_suppress_pause_request() {
        let mut paused = PausedRunTable::new();
        paused.record("agent-1", "run-old");

        let delta = IngressDelta {
            scoped_upserts: vec![("agent-1".into(), approval("a-1").scoped_to("agent-1"))],
            ..Default::default()
        };
        let outcome = apply_ingress(
            PendingApprovalState::new(),
            delta,
            &one_agent("agent-1", Some("run-1")),
            &paused,
        );

        assert_eq!(outcome.pause_requests.len(), 1);
    }

    #[test]
    fn unscoped_upserts_never_pause() {
        let delta = IngressDelta {
            unscoped_upserts: vec![approval("a-1")],
            mark_activity: vec!["agent-1".into()],
            ..Default::default()
        };
        let outcome = apply_ingress(
            PendingApprovalState::new(),
            delta,
            &one_agent("agent-1", Some("run-1")),
            &PausedRunTable::new(),
        );

        assert!(outcome.pause_requests.is_empty());
        assert_eq!(outcome.state.unscoped().len(), 1);
        assert_eq!(outcome.mark_activity, vec!["agent-1".to_string()]);
    }

    #[test]
    fn each_id_lands_in_exactly_one_slot() {
        let mut state = PendingApprovalState::new();
        state.upsert_unscoped(approval("a-1"));

        // the same id arrives again, now bound to an agent
        let delta = IngressDelta {
            scoped_upserts: vec![("agent-1".into(), approval("a-1").scoped_to("agent-1"))],
            ..Default::default()
        };
        let outcome = apply_ingress(
            state,
            delta,
            &one_agent("agent-1", Some("run-1")),
            &PausedRunTable::new(),
        );

        assert_eq!(outcome.state.len(), 1);
        assert!(outcome.state.unscoped().is_empty());
        assert_eq!(outcome.state.scoped("agent-1").len(), 1);
    }
}
