use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use wd_core::types::{AgentId, RunId};
use wd_runtime::events::RuntimeNotification;

// ---------------------------------------------------------------------------
// StateEvent
// ---------------------------------------------------------------------------

/// Updates published to observers (dashboards, persistence layers).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum StateEvent {
    /// A paused run is executing again. Published optimistically, before
    /// remote confirmation.
    AgentRunning {
        agent_id: AgentId,
        run_id: RunId,
        at_ms: i64,
    },
    /// The agent showed signs of life; refresh its activity timestamp.
    AgentActivity { agent_id: AgentId, at_ms: i64 },
    /// The agent's awaiting-input flag changed.
    AwaitingInput { agent_id: AgentId, awaiting: bool },
    /// An inbound event this coordinator does not own, forwarded verbatim.
    Notification { event: RuntimeNotification },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A broadcast-style event bus built on top of flume channels.
///
/// Each call to [`subscribe`](Self::subscribe) creates a new receiver that
/// will receive all events published after the subscription was created.
/// The bus is thread-safe and can be cloned cheaply.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<flume::Sender<StateEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> flume::Receiver<StateEvent> {
        let (tx, rx) = flume::unbounded();
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.push(tx);
        rx
    }

    /// Publish an event to all current subscribers.
    ///
    /// Disconnected subscribers (whose receivers have been dropped) are
    /// automatically pruned.
    pub fn publish(&self, event: StateEvent) {
        let mut senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        let senders = self.inner.lock().expect("EventBus lock poisoned");
        senders.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_events_published_after_joining() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        bus.publish(StateEvent::AgentActivity {
            agent_id: "agent-1".into(),
            at_ms: 1_000,
        });

        match rx.try_recv().unwrap() {
            StateEvent::AgentActivity { agent_id, at_ms } => {
                assert_eq!(agent_id, "agent-1");
                assert_eq!(at_ms, 1_000);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx);
        bus.publish(StateEvent::AwaitingInput {
            agent_id: "agent-1".into(),
            awaiting: true,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
