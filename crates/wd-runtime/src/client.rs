//! RPC surface of the remote agent runtime.
//!
//! The coordinator never talks to a transport directly: it goes through the
//! [`RuntimeClient`] trait so implementations can be swapped (socket-backed
//! client, in-process runtime, mock runtime).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by remote runtime calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// The transport dropped before a response arrived. The remote state is
    /// unknown: the call may or may not have taken effect.
    #[error("runtime disconnected: {0}")]
    Disconnected(String),

    /// The runtime answered with a rejection.
    #[error("runtime rejected call: {0}")]
    Rejected(String),

    /// The response could not be interpreted.
    #[error("runtime protocol error: {0}")]
    Protocol(String),
}

impl RuntimeError {
    /// Classification predicate used by callers that must distinguish
    /// "state unknown" from a definitive rejection.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, RuntimeError::Disconnected(_))
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

// ---------------------------------------------------------------------------
// Connection status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Terminal-or-not status of a run as reported by `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The wait timeout elapsed while the run was still executing.
    Running,
    Completed,
    Failed,
    Aborted,
}

// ---------------------------------------------------------------------------
// SendOptions
// ---------------------------------------------------------------------------

/// Delivery options for `send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Whether the runtime should echo the message back as user-authored
    /// input. Synthetic messages suppress this.
    pub echo: bool,
    /// Internal marker tag distinguishing synthetic messages from genuine
    /// user input.
    pub marker: Option<String>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            echo: true,
            marker: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeClient
// ---------------------------------------------------------------------------

/// Client half of the remote runtime RPC surface.
///
/// Every call suspends the caller until a response, rejection, or transport
/// failure. None of these calls retry internally.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Abort the current run of the given session.
    async fn abort(&self, session_key: &str) -> Result<()>;

    /// Block until `run_id` reaches a terminal state or `timeout_ms`
    /// elapses; a timeout reports the run as still [`RunStatus::Running`].
    async fn wait(&self, run_id: &str, timeout_ms: u64) -> Result<RunStatus>;

    /// Deliver a message to a session.
    async fn send_message(&self, session_key: &str, text: &str, options: SendOptions)
        -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_classification() {
        assert!(RuntimeError::Disconnected("socket closed".into()).is_disconnect());
        assert!(!RuntimeError::Rejected("unknown session".into()).is_disconnect());
        assert!(!RuntimeError::Protocol("bad frame".into()).is_disconnect());
    }

    #[test]
    fn send_options_default_to_echo() {
        let options = SendOptions::default();
        assert!(options.echo);
        assert!(options.marker.is_none());
    }
}
