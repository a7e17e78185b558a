//! Inbound notification surface.
//!
//! One channel carries everything the remote runtime pushes at us: approval
//! lifecycle notifications the coordinator owns, and unrelated events other
//! consumers own. [`partition_notifications`] splits a batch into the
//! ingress delta plus the untouched pass-through remainder.

use serde::{Deserialize, Serialize};

use wd_core::types::{AgentId, ApprovalId, ExecApproval};

// ---------------------------------------------------------------------------
// RuntimeNotification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum RuntimeNotification {
    /// A new approval is awaiting a decision. Scoped when the embedded
    /// approval carries an `agent_id`, unscoped otherwise.
    ApprovalRequested { approval: ExecApproval },
    /// An existing approval changed (e.g. got bound to an agent).
    ApprovalUpdated { approval: ExecApproval },
    /// An approval was decided or withdrawn remotely.
    ApprovalRemoved { approval_id: ApprovalId },
    /// The agent produced output or otherwise showed signs of life.
    AgentActivity { agent_id: AgentId },

    // Events this coordinator does not own; forwarded untouched.
    JobFinished { job_id: String, success: bool },
    SessionClosed { session_key: String },
}

// ---------------------------------------------------------------------------
// IngressDelta
// ---------------------------------------------------------------------------

/// The approval-owned slice of a notification batch, in reducer input form.
#[derive(Debug, Clone, Default)]
pub struct IngressDelta {
    pub scoped_upserts: Vec<(AgentId, ExecApproval)>,
    pub unscoped_upserts: Vec<ExecApproval>,
    pub removals: Vec<ApprovalId>,
    pub mark_activity: Vec<AgentId>,
}

impl IngressDelta {
    pub fn is_empty(&self) -> bool {
        self.scoped_upserts.is_empty()
            && self.unscoped_upserts.is_empty()
            && self.removals.is_empty()
            && self.mark_activity.is_empty()
    }
}

/// Split a notification batch into the ingress delta this coordinator owns
/// and the pass-through remainder, preserving the remainder's order.
pub fn partition_notifications(
    batch: Vec<RuntimeNotification>,
) -> (IngressDelta, Vec<RuntimeNotification>) {
    let mut delta = IngressDelta::default();
    let mut passthrough = Vec::new();

    for event in batch {
        match event {
            RuntimeNotification::ApprovalRequested { approval }
            | RuntimeNotification::ApprovalUpdated { approval } => match &approval.agent_id {
                Some(agent_id) => delta.scoped_upserts.push((agent_id.clone(), approval)),
                None => delta.unscoped_upserts.push(approval),
            },
            RuntimeNotification::ApprovalRemoved { approval_id } => {
                delta.removals.push(approval_id);
            }
            RuntimeNotification::AgentActivity { agent_id } => {
                delta.mark_activity.push(agent_id);
            }
            other => passthrough.push(other),
        }
    }

    (delta, passthrough)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
