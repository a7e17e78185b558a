use chrono::Utc;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of an agent, assigned by the remote runtime.
pub type AgentId = String;
/// Identifier of a single run (one in-flight turn of an agent).
pub type RunId = String;
/// Identifier of an exec approval request.
pub type ApprovalId = String;

/// Session key for an agent's main session, in the runtime wire format
/// `agent:<agent_id>:main`.
pub fn main_session_key(agent_id: &str) -> String {
    format!("agent:{agent_id}:main")
}

/// Extract the agent id from a session key of the form `agent:<id>:<tag>`.
///
/// Returns `None` for keys that do not follow the agent session format
/// (e.g. machine-scoped or daemon sessions).
pub fn agent_id_from_session_key(session_key: &str) -> Option<&str> {
    let mut parts = session_key.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("agent"), Some(id), Some(_)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// AgentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

// ---------------------------------------------------------------------------
// AgentSnapshot
// ---------------------------------------------------------------------------

/// Read-only view of an agent as known to the coordinator.
///
/// Snapshots are produced by the embedding application (which owns agent
/// state) and consumed here for pause targeting and resume re-validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub session_key: String,
    pub status: AgentStatus,
    /// Run currently executing on the agent's behalf, if any.
    pub current_run_id: Option<RunId>,
    /// Whether the agent is blocked on human input.
    pub awaiting_user_input: bool,
    pub last_activity_ms: i64,
}

impl AgentSnapshot {
    /// Create an idle snapshot with the main session key for `id`.
    pub fn new(id: impl Into<AgentId>) -> Self {
        let id = id.into();
        Self {
            session_key: main_session_key(&id),
            id,
            status: AgentStatus::Idle,
            current_run_id: None,
            awaiting_user_input: false,
            last_activity_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Same snapshot with `run_id` as the current run and status `Running`.
    pub fn with_run(mut self, run_id: impl Into<RunId>) -> Self {
        self.current_run_id = Some(run_id.into());
        self.status = AgentStatus::Running;
        self
    }
}

// ---------------------------------------------------------------------------
// Exec context
// ---------------------------------------------------------------------------

/// Risk classification attached to a command by the remote runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    ReadOnly,
    Mutating,
    Destructive,
}

/// When the runtime asks for human sign-off before executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskPolicy {
    Always,
    UnlessTrusted,
    Never,
}

/// Execution context the command would run in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecContext {
    pub cwd: Option<String>,
    pub host: Option<String>,
    pub risk: RiskLevel,
    pub ask_policy: AskPolicy,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self {
            cwd: None,
            host: None,
            risk: RiskLevel::Mutating,
            ask_policy: AskPolicy::Always,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecApproval
// ---------------------------------------------------------------------------

/// A pending request for human sign-off on a privileged command.
///
/// Approvals are minted by the remote runtime and mirrored locally. Every
/// field except `resolving` and `error` is immutable once received; those
/// two track an in-flight decision so input controls can be disabled and
/// re-enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecApproval {
    pub id: ApprovalId,
    /// Owning agent; `None` while the request is not yet bound to one.
    pub agent_id: Option<AgentId>,
    pub session_key: String,
    /// Human-readable description of the command awaiting sign-off.
    pub command: String,
    #[serde(default)]
    pub context: ExecContext,
    /// Absolute path of the executable, when the runtime resolved one.
    pub resolved_path: Option<String>,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    /// True while a decision is being applied remotely.
    #[serde(default)]
    pub resolving: bool,
    /// Last decision failure, surfaced to the UI until the next attempt.
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecApproval {
    /// Create an unscoped approval expiring at `expires_at_ms`.
    pub fn new(
        id: impl Into<ApprovalId>,
        session_key: impl Into<String>,
        command: impl Into<String>,
        expires_at_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id: None,
            session_key: session_key.into(),
            command: command.into(),
            context: ExecContext::default(),
            resolved_path: None,
            created_at_ms: Utc::now().timestamp_millis(),
            expires_at_ms,
            resolving: false,
            error: None,
        }
    }

    /// Same approval scoped to `agent_id`.
    pub fn scoped_to(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// True once the approval has outlived its expiry plus the grace window.
    pub fn is_expired(&self, now_ms: i64, grace_ms: u64) -> bool {
        self.expires_at_ms + grace_ms as i64 <= now_ms
    }
}

// ---------------------------------------------------------------------------
// ApprovalDecision
// ---------------------------------------------------------------------------

/// A human decision on a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    AllowOnce,
    AllowAlways,
    Deny,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_roundtrip() {
        let key = main_session_key("agent-1");
        assert_eq!(key, "agent:agent-1:main");
        assert_eq!(agent_id_from_session_key(&key), Some("agent-1"));
    }

    #[test]
    fn session_key_rejects_other_formats() {
        assert_eq!(agent_id_from_session_key("machine:host-1:main"), None);
        assert_eq!(agent_id_from_session_key("agent:"), None);
        assert_eq!(agent_id_from_session_key("agent::main"), None);
        assert_eq!(agent_id_from_session_key(""), None);
    }

    #[test]
    fn expiry_respects_grace_window() {
        let approval = ExecApproval::new("a-1", "agent:agent-1:main", "rm -rf build", 6_000);
        assert!(!approval.is_expired(6_400, 500));
        assert!(approval.is_expired(6_500, 500));
        assert!(approval.is_expired(7_000, 500));
    }

    #[test]
    fn scoped_to_sets_owner() {
        let approval =
            ExecApproval::new("a-1", "agent:agent-1:main", "ls", 1_000).scoped_to("agent-1");
        assert_eq!(approval.agent_id.as_deref(), Some("agent-1"));
    }

    #[test]
    fn decision_serializes_snake_case() {
        let json = serde_json::to_string(&ApprovalDecision::AllowAlways).unwrap();
        assert_eq!(json, "\"allow_always\"");
    }

    #[test]
    fn approval_deserializes_without_optional_flags() {
        let json = r#"{
            "id": "a-1",
            "agent_id": "agent-1",
            "session_key": "agent:agent-1:main",
            "command": "cargo publish",
            "resolved_path": null,
            "created_at_ms": 1000,
            "expires_at_ms": 2000
        }"#;
        let approval: ExecApproval = serde_json::from_str(json).unwrap();
        assert!(!approval.resolving);
        assert!(approval.error.is_none());
        assert_eq!(approval.context.ask_policy, AskPolicy::Always);
    }
}
