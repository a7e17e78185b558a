//! Best-effort pausing of an agent's in-flight run.

use std::collections::HashMap;

use tracing::{debug, warn};

use wd_core::types::{agent_id_from_session_key, AgentId, AgentSnapshot, ExecApproval, RunId};
use wd_runtime::client::{ConnectionStatus, RuntimeClient};

use crate::paused::PausedRunTable;

// ---------------------------------------------------------------------------
// PauseOutcome
// ---------------------------------------------------------------------------

/// What a pause attempt did. Pausing is best-effort: every variant leaves
/// the approval pending and the decision flow unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseOutcome {
    NotConnected,
    /// Neither the preferred agent id nor the approval's session key led to
    /// a known agent.
    NoTargetAgent,
    /// The target agent has no run in flight; nothing to pause.
    NoCurrentRun,
    Paused {
        agent_id: AgentId,
        run_id: RunId,
    },
    AbortFailed {
        agent_id: AgentId,
        /// Whether the optimistic table entry was reverted. It is kept on
        /// disconnects, where the abort may have landed remotely.
        rolled_back: bool,
    },
}

// ---------------------------------------------------------------------------
// pause_run_for_approval
// ---------------------------------------------------------------------------

/// Pause the run of the agent that owes a decision on `approval`.
///
/// Sweeps stale paused-run entries first so leftovers from finished runs
/// never mask a pause that is actually needed, then optimistically records
/// the new entry before issuing the abort. A non-disconnect rejection
/// reverts the entry; a disconnect keeps it, since the remote outcome is
/// unknown and the staleness sweep reclaims it if the run moved on.
pub async fn pause_run_for_approval(
    status: ConnectionStatus,
    approval: &ExecApproval,
    preferred_agent_id: Option<&str>,
    agents: &HashMap<AgentId, AgentSnapshot>,
    paused: &mut PausedRunTable,
    client: &dyn RuntimeClient,
) -> PauseOutcome {
    if !status.is_connected() {
        return PauseOutcome::NotConnected;
    }

    paused.sweep_stale(agents);

    let target = preferred_agent_id
        .and_then(|id| agents.get(id))
        .or_else(|| {
            agent_id_from_session_key(&approval.session_key).and_then(|id| agents.get(id))
        });
    let Some(agent) = target else {
        debug!(approval_id = %approval.id, "no target agent for pause");
        return PauseOutcome::NoTargetAgent;
    };
    let Some(run_id) = agent.current_run_id.clone() else {
        debug!(agent_id = %agent.id, approval_id = %approval.id, "agent has no run to pause");
        return PauseOutcome::NoCurrentRun;
    };

    paused.record(agent.id.clone(), run_id.clone());

    match client.abort(&agent.session_key).await {
        Ok(()) => {
            debug!(agent_id = %agent.id, run_id = %run_id, approval_id = %approval.id, "paused run for approval");
            PauseOutcome::Paused {
                agent_id: agent.id.clone(),
                run_id,
            }
        }
        Err(e) if e.is_disconnect() => {
            debug!(agent_id = %agent.id, error = %e, "disconnected during pause, keeping entry");
            PauseOutcome::AbortFailed {
                agent_id: agent.id.clone(),
                rolled_back: false,
            }
        }
        Err(e) => {
            paused.clear_if(&agent.id, &run_id);
            warn!(agent_id = %agent.id, run_id = %run_id, error = %e, "abort rejected, pause rolled back");
            PauseOutcome::AbortFailed {
                agent_id: agent.id.clone(),
                rolled_back: true,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wd_runtime::client::RuntimeError;
    use wd_runtime::mock::{MockRuntime, RuntimeCall};

    fn approval_for(agent_id: &str) -> ExecApproval {
        ExecApproval::new(
            format!("appr-{agent_id}"),
            format!("agent:{agent_id}:main"),
            "terraform apply",
            10_000,
        )
        .scoped_to(agent_id)
    }

    fn one_agent(id: &str, run: Option<&str>) -> HashMap<AgentId, AgentSnapshot> {
        let mut snap = AgentSnapshot::new(id);
        if let Some(run) = run {
            snap = snap.with_run(run);
        }
        HashMap::from([(id.to_string(), snap)])
    }

    #[tokio::test]
    async fn pause_sweeps_stale_entry_and_records_new_one() {
        let mock = MockRuntime::new();
        let mut paused = PausedRunTable::new();
        paused.record("stale-agent", "stale-run");

        let outcome = pause_run_for_approval(
            ConnectionStatus::Connected,
            &approval_for("agent-1"),
            Some("agent-1"),
            &one_agent("agent-1", Some("run-1")),
            &mut paused,
            &mock,
        )
        .await;

        assert_eq!(
            outcome,
            PauseOutcome::Paused {
                agent_id: "agent-1".into(),
                run_id: "run-1".into()
            }
        );
        assert!(paused.get("stale-agent").is_none());
        assert_eq!(paused.get("agent-1"), Some("run-1"));
        assert_eq!(
            mock.calls(),
            vec![RuntimeCall::Abort {
                session_key: "agent:agent-1:main".into()
            }]
        );
    }

    #[tokio::test]
    async fn rejected_abort_rolls_the_entry_back() {
        let mock = MockRuntime::new();
        mock.push_abort_result(Err(RuntimeError::Rejected("session busy".into())));
        let mut paused = PausedRunTable::new();

        let outcome = pause_run_for_approval(
            ConnectionStatus::Connected,
            &approval_for("agent-1"),
            Some("agent-1"),
            &one_agent("agent-1", Some("run-1")),
            &mut paused,
            &mock,
        )
        .await;

        assert_eq!(
            outcome,
            PauseOutcome::AbortFailed {
                agent_id: "agent-1".into(),
                rolled_back: true
            }
        );
        assert!(paused.get("agent-1").is_none());
    }

    #[tokio::test]
    async fn disconnect_keeps_the_optimistic_entry() {
        let mock = MockRuntime::new();
        mock.push_abort_result(Err(RuntimeError::Disconnected("socket closed".into())));
        let mut paused = PausedRunTable::new();

        let outcome = pause_run_for_approval(
            ConnectionStatus::Connected,
            &approval_for("agent-1"),
            Some("agent-1"),
            &one_agent("agent-1", Some("run-1")),
            &mut paused,
            &mock,
        )
        .await;

        assert_eq!(
            outcome,
            PauseOutcome::AbortFailed {
                agent_id: "agent-1".into(),
                rolled_back: false
            }
        );
        assert_eq!(paused.get("agent-1"), Some("run-1"));
    }

    #[tokio::test]
    async fn not_connected_is_a_no_op() {
        let mock = MockRuntime::new();
        let mut paused = PausedRunTable::new();

        let outcome = pause_run_for_approval(
            ConnectionStatus::Disconnected,
            &approval_for("agent-1"),
            Some("agent-1"),
            &one_agent("agent-1", Some("run-1")),
            &mut paused,
            &mock,
        )
        .await;

        assert_eq!(outcome, PauseOutcome::NotConnected);
        assert!(mock.calls().is_empty());
        assert!(paused.is_empty());
    }

    #[tokio::test]
    async fn target_falls_back_to_session_key() {
        let mock = MockRuntime::new();
        let mut paused = PausedRunTable::new();

        let outcome = pause_run_for_approval(
            ConnectionStatus::Connected,
            &approval_for("agent-1"),
            None,
            &one_agent("agent-1", Some("run-1")),
            &mut paused,
            &mock,
        )
        .await;

        assert!(matches!(outcome, PauseOutcome::Paused { .. }));
        assert_eq!(paused.get("agent-1"), Some("run-1"));
    }

    #[tokio::test]
    async fn idle_agent_means_nothing_to_pause() {
        let mock = MockRuntime::new();
        let mut paused = PausedRunTable::new();

        let outcome = pause_run_for_approval(
            ConnectionStatus::Connected,
            &approval_for("agent-1"),
            Some("agent-1"),
            &one_agent("agent-1", None),
            &mut paused,
            &mock,
        )
        .await;

        assert_eq!(outcome, PauseOutcome::NoCurrentRun);
        assert!(mock.calls().is_empty());
        assert!(paused.is_empty());
    }
}
