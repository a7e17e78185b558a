//! Applying a human decision to a pending approval.
//!
//! The coordinator does not own approval policy: decisions (including any
//! persistence of "allow always") are applied by an injected
//! [`ApprovalResolver`]. The coordinator's job is the bookkeeping around
//! the call — the `resolving` flag, the error surface, and triggering
//! auto-resume exactly once when the outcome allows execution.

use async_trait::async_trait;

use wd_core::types::{AgentId, ApprovalDecision, ApprovalId, ExecApproval};

use crate::resume::ResumeOutcome;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("approval not found: {0}")]
    NotFound(ApprovalId),
    #[error("resolver backend: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// ApprovalResolver
// ---------------------------------------------------------------------------

/// Outcome of applying a decision remotely.
#[derive(Debug, Clone)]
pub enum ResolverOutcome {
    Denied,
    /// Execution was allowed. Carries the resolved approval and the agent
    /// the decision targeted, when the resolver knows it.
    Allowed {
        approval: ExecApproval,
        agent_id: Option<AgentId>,
    },
}

/// Collaborator that applies allow/deny decisions against the remote
/// policy store.
#[async_trait]
pub trait ApprovalResolver: Send + Sync {
    async fn resolve(
        &self,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<ResolverOutcome, ResolveError>;
}

// ---------------------------------------------------------------------------
// Resolved
// ---------------------------------------------------------------------------

/// What a completed `resolve` call did locally.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub allowed: bool,
    /// Present on allow decisions: how the auto-resume attempt ended.
    pub resume: Option<ResumeOutcome>,
}
