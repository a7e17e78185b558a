//! Scriptable in-memory runtime for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{Result, RunStatus, RuntimeClient, SendOptions};

// ---------------------------------------------------------------------------
// RuntimeCall
// ---------------------------------------------------------------------------

/// One recorded RPC, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
    Abort {
        session_key: String,
    },
    Wait {
        run_id: String,
        timeout_ms: u64,
    },
    SendMessage {
        session_key: String,
        text: String,
        options: SendOptions,
    },
}

// ---------------------------------------------------------------------------
// MockRuntime
// ---------------------------------------------------------------------------

/// [`RuntimeClient`] that records every call and answers from scripted
/// result queues. Unscripted calls succeed: `abort` and `send_message`
/// return `Ok(())`, `wait` reports [`RunStatus::Completed`].
///
/// A wait hook can mutate external state (e.g. an agents view) while a
/// `wait` call is "in flight", to exercise the world-changed-during-await
/// paths.
#[derive(Default)]
pub struct MockRuntime {
    calls: Mutex<Vec<RuntimeCall>>,
    abort_results: Mutex<VecDeque<Result<()>>>,
    wait_results: Mutex<VecDeque<Result<RunStatus>>>,
    send_results: Mutex<VecDeque<Result<()>>>,
    wait_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    /// Number of `abort` calls recorded so far.
    pub fn abort_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Abort { .. }))
            .count()
    }

    /// Script the outcome of the next `abort` call.
    pub fn push_abort_result(&self, result: Result<()>) {
        self.abort_results
            .lock()
            .expect("mock lock poisoned")
            .push_back(result);
    }

    /// Script the outcome of the next `wait` call.
    pub fn push_wait_result(&self, result: Result<RunStatus>) {
        self.wait_results
            .lock()
            .expect("mock lock poisoned")
            .push_back(result);
    }

    /// Script the outcome of the next `send_message` call.
    pub fn push_send_result(&self, result: Result<()>) {
        self.send_results
            .lock()
            .expect("mock lock poisoned")
            .push_back(result);
    }

    /// Install a hook invoked on every `wait` before its result resolves.
    pub fn set_wait_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.wait_hook.lock().expect("mock lock poisoned") = Some(Box::new(hook));
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().expect("mock lock poisoned").push(call);
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn abort(&self, session_key: &str) -> Result<()> {
        self.record(RuntimeCall::Abort {
            session_key: session_key.to_string(),
        });
        self.abort_results
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn wait(&self, run_id: &str, timeout_ms: u64) -> Result<RunStatus> {
        self.record(RuntimeCall::Wait {
            run_id: run_id.to_string(),
            timeout_ms,
        });
        if let Some(hook) = &*self.wait_hook.lock().expect("mock lock poisoned") {
            hook();
        }
        self.wait_results
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or(Ok(RunStatus::Completed))
    }

    async fn send_message(
        &self,
        session_key: &str,
        text: &str,
        options: SendOptions,
    ) -> Result<()> {
        self.record(RuntimeCall::SendMessage {
            session_key: session_key.to_string(),
            text: text.to_string(),
            options,
        });
        self.send_results
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
