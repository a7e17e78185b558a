//! Auto-resume preflight and re-validation.
//!
//! The asynchronous resume sequence itself lives on the coordinator; this
//! module holds its deterministic pieces so they can be tested without a
//! runtime: the preflight check run before anything is touched, and the
//! dispatch check run after the remote wait, when the world may have moved
//! on.

use serde::{Deserialize, Serialize};

use wd_core::types::{AgentId, AgentSnapshot, ExecApproval, RunId};

use crate::paused::PausedRunTable;
use crate::pending::PendingApprovalState;

/// Marker tagged onto synthetic continuation messages so downstream
/// consumers can tell them from genuine user input.
pub const CONTINUATION_MARKER: &str = "warden-continuation";

/// Body of the synthetic continuation message.
pub const CONTINUATION_TEXT: &str =
    "The command you requested was approved. Continue with the task.";

// ---------------------------------------------------------------------------
// Skip reasons
// ---------------------------------------------------------------------------

/// Why a resume attempt stopped without sending a continuation. None of
/// these are errors; each one means "resuming now would be unsafe or
/// meaningless".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Other scoped approvals are still undecided for this agent; resuming
    /// would let it act before those are signed off.
    BlockingPendingApprovals,
    /// No paused run is recorded for the agent (or another resume already
    /// claimed it).
    NoPausedRun,
    /// The allow decision could not be tied to any agent.
    NoTargetAgent,
    /// The agent's current run no longer matches the one that was paused.
    RunReplaced,
    /// The transport dropped mid-sequence; remote state is unknown.
    Disconnected,
    /// The runtime rejected a call; logged, never retried.
    RpcFailed,
}

/// How an auto-resume attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed { agent_id: AgentId, run_id: RunId },
    Skipped(SkipReason),
}

// ---------------------------------------------------------------------------
// Preflight
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightOutcome {
    Proceed { paused_run_id: RunId },
    Skip(SkipReason),
}

/// Decide whether a resume for `approval` may start at all.
pub fn auto_resume_preflight(
    approval: &ExecApproval,
    target_agent_id: &str,
    pending: &PendingApprovalState,
    paused: &PausedRunTable,
) -> PreflightOutcome {
    if pending.has_other_scoped(target_agent_id, &approval.id) {
        return PreflightOutcome::Skip(SkipReason::BlockingPendingApprovals);
    }
    match paused.get(target_agent_id) {
        Some(run_id) => PreflightOutcome::Proceed {
            paused_run_id: run_id.to_string(),
        },
        None => PreflightOutcome::Skip(SkipReason::NoPausedRun),
    }
}

// ---------------------------------------------------------------------------
// Dispatch re-validation
// ---------------------------------------------------------------------------

/// After the remote wait: confirm the pause context still holds and return
/// the session to send the continuation to.
///
/// Returns `None` when the agent is gone or its current run differs from
/// the one that was paused — the continuation must then be dropped.
pub fn auto_resume_dispatch(agent: Option<&AgentSnapshot>, paused_run_id: &str) -> Option<String> {
    let agent = agent?;
    if agent.current_run_id.as_deref() == Some(paused_run_id) {
        Some(agent.session_key.clone())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(id: &str, agent_id: &str) -> ExecApproval {
        ExecApproval::new(id, format!("agent:{agent_id}:main"), "docker push", 10_000)
            .scoped_to(agent_id)
    }

    #[test]
    fn preflight_skips_while_siblings_are_pending() {
        let mut pending = PendingApprovalState::new();
        pending.upsert_scoped("agent-1", approval("a-1", "agent-1"));
        pending.upsert_scoped("agent-1", approval("a-2", "agent-1"));
        let mut paused = PausedRunTable::new();
        paused.record("agent-1", "run-1");

        let outcome = auto_resume_preflight(&approval("a-1", "agent-1"), "agent-1", &pending, &paused);
        assert_eq!(
            outcome,
            PreflightOutcome::Skip(SkipReason::BlockingPendingApprovals)
        );
    }

    #[test]
    fn preflight_ignores_the_resolved_approval_itself() {
        let mut pending = PendingApprovalState::new();
        pending.upsert_scoped("agent-1", approval("a-1", "agent-1"));
        let mut paused = PausedRunTable::new();
        paused.record("agent-1", "run-1");

        let outcome = auto_resume_preflight(&approval("a-1", "agent-1"), "agent-1", &pending, &paused);
        assert_eq!(
            outcome,
            PreflightOutcome::Proceed {
                paused_run_id: "run-1".into()
            }
        );
    }

    #[test]
    fn preflight_skips_without_a_paused_run() {
        let pending = PendingApprovalState::new();
        let paused = PausedRunTable::new();

        let outcome = auto_resume_preflight(&approval("a-1", "agent-1"), "agent-1", &pending, &paused);
        assert_eq!(outcome, PreflightOutcome::Skip(SkipReason::NoPausedRun));
    }

    #[test]
    fn preflight_ignores_unscoped_and_other_agents() {
        let mut pending = PendingApprovalState::new();
        pending.upsert_unscoped(ExecApproval::new("u-1", "agent:agent-9:main", "ls", 1_000));
        pending.upsert_scoped("agent-2", approval("b-1", "agent-2"));
        let mut paused = PausedRunTable::new();
        paused.record("agent-1", "run-1");

        let outcome = auto_resume_preflight(&approval("a-1", "agent-1"), "agent-1", &pending, &paused);
        assert!(matches!(outcome, PreflightOutcome::Proceed { .. }));
    }

    #[test]
    fn dispatch_requires_matching_run() {
        let live = AgentSnapshot::new("agent-1").with_run("run-1");
        assert_eq!(
            auto_resume_dispatch(Some(&live), "run-1").as_deref(),
            Some("agent:agent-1:main")
        );

        let replaced = AgentSnapshot::new("agent-1").with_run("run-2");
        assert!(auto_resume_dispatch(Some(&replaced), "run-1").is_none());

        let idle = AgentSnapshot::new("agent-1");
        assert!(auto_resume_dispatch(Some(&idle), "run-1").is_none());
        assert!(auto_resume_dispatch(None, "run-1").is_none());
    }

    #[test]
    fn skip_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&SkipReason::BlockingPendingApprovals).unwrap();
        assert_eq!(json, "\"blocking-pending-approvals\"");
    }
}
