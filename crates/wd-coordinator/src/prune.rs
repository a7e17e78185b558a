//! Time-based expiry of undecided approvals and the derived
//! awaiting-input view.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use wd_core::types::{AgentId, AgentSnapshot, ExecApproval};

use crate::pending::PendingApprovalState;

// ---------------------------------------------------------------------------
// Prune scheduling
// ---------------------------------------------------------------------------

/// Milliseconds until the soonest approval outlives its grace window:
/// `min(expires_at_ms) + grace_ms - now_ms`. Negative when a prune is
/// already overdue; `None` when nothing is pending and no pass needs to be
/// scheduled.
pub fn prune_delay(pending: &PendingApprovalState, now_ms: i64, grace_ms: u64) -> Option<i64> {
    pending
        .iter()
        .map(|a| a.expires_at_ms)
        .min()
        .map(|soonest| soonest + grace_ms as i64 - now_ms)
}

/// Remove every approval whose expiry plus grace has passed, from both the
/// scoped and unscoped collections, preserving the relative order of
/// survivors. Returns the removed approvals.
pub fn prune_pending(
    pending: &mut PendingApprovalState,
    now_ms: i64,
    grace_ms: u64,
) -> Vec<ExecApproval> {
    pending.retain_approvals(|a| !a.is_expired(now_ms, grace_ms))
}

// ---------------------------------------------------------------------------
// Awaiting-input derived view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingInputPatch {
    pub agent_id: AgentId,
    pub awaiting: bool,
}

/// For every known agent, the awaiting-input flag should equal "has at
/// least one scoped pending approval". Returns only the patches whose
/// value differs from the agent's current flag, sorted by agent id.
pub fn awaiting_input_patches(
    agents: &HashMap<AgentId, AgentSnapshot>,
    pending: &PendingApprovalState,
) -> Vec<AwaitingInputPatch> {
    let mut patches: Vec<AwaitingInputPatch> = agents
        .values()
        .filter_map(|agent| {
            let awaiting = !pending.scoped(&agent.id).is_empty();
            (awaiting != agent.awaiting_user_input).then(|| AwaitingInputPatch {
                agent_id: agent.id.clone(),
                awaiting,
            })
        })
        .collect();
    patches.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    patches
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
