//! The coordinator facade: owns pending state and the paused-run table,
//! and exposes the four entry points (ingest, pause, resolve, prune).
//!
//! Entry points take `&mut self`; callers serialize through the borrow (or
//! a mutex around the whole coordinator). Interleaving only happens at the
//! remote-call suspension points inside an entry point, which is why every
//! post-await step re-validates against current state instead of trusting
//! what it saw before the call.

use std::sync::Arc;

use tracing::{debug, warn};

use wd_core::agents::AgentsView;
use wd_core::clock::{Clock, SystemClock};
use wd_core::config::ApprovalsConfig;
use wd_core::types::{agent_id_from_session_key, ApprovalDecision, ExecApproval};
use wd_runtime::client::{ConnectionStatus, RuntimeClient, SendOptions};
use wd_runtime::events::{partition_notifications, RuntimeNotification};

use crate::bus::{EventBus, StateEvent};
use crate::ingress::apply_ingress;
use crate::pause::{pause_run_for_approval, PauseOutcome};
use crate::paused::PausedRunTable;
use crate::pending::PendingApprovalState;
use crate::prune::{awaiting_input_patches, prune_delay, prune_pending};
use crate::resolve::{ApprovalResolver, Resolved, ResolveError, ResolverOutcome};
use crate::resume::{
    auto_resume_dispatch, auto_resume_preflight, PreflightOutcome, ResumeOutcome, SkipReason,
    CONTINUATION_MARKER, CONTINUATION_TEXT,
};

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    pending: PendingApprovalState,
    paused: PausedRunTable,
    connection: ConnectionStatus,
    client: Arc<dyn RuntimeClient>,
    resolver: Arc<dyn ApprovalResolver>,
    agents: Arc<dyn AgentsView>,
    clock: Arc<dyn Clock>,
    config: ApprovalsConfig,
    bus: EventBus,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn RuntimeClient>,
        resolver: Arc<dyn ApprovalResolver>,
        agents: Arc<dyn AgentsView>,
        config: ApprovalsConfig,
    ) -> Self {
        Self {
            pending: PendingApprovalState::new(),
            paused: PausedRunTable::new(),
            connection: ConnectionStatus::Connected,
            client,
            resolver,
            agents,
            clock: Arc::new(SystemClock),
            config,
            bus: EventBus::new(),
        }
    }

    /// Swap the clock (tests drive time explicitly).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&self) -> flume::Receiver<StateEvent> {
        self.bus.subscribe()
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Current pending-state snapshot (read surface).
    pub fn pending(&self) -> &PendingApprovalState {
        &self.pending
    }

    pub fn paused(&self) -> &PausedRunTable {
        &self.paused
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    /// Apply a batch of inbound notifications.
    ///
    /// Approval events are reduced into pending state and may trigger
    /// pauses; everything else is forwarded on the bus untouched.
    pub async fn ingest(&mut self, batch: Vec<RuntimeNotification>) {
        let (delta, passthrough) = partition_notifications(batch);
        for event in passthrough {
            self.bus.publish(StateEvent::Notification { event });
        }
        if delta.is_empty() {
            return;
        }

        let agents = self.agents.snapshot_map();
        let state = std::mem::take(&mut self.pending);
        let outcome = apply_ingress(state, delta, &agents, &self.paused);
        self.pending = outcome.state;

        let at_ms = self.clock.now_ms();
        for agent_id in outcome.mark_activity {
            self.bus.publish(StateEvent::AgentActivity { agent_id, at_ms });
        }

        for request in outcome.pause_requests {
            pause_run_for_approval(
                self.connection,
                &request.approval,
                Some(&request.preferred_agent_id),
                &agents,
                &mut self.paused,
                self.client.as_ref(),
            )
            .await;
        }

        self.publish_awaiting_patches();
    }

    // -----------------------------------------------------------------------
    // Pause
    // -----------------------------------------------------------------------

    /// Pause the run owing a decision on `approval`. Best-effort; see
    /// [`PauseOutcome`].
    pub async fn pause_for_approval(
        &mut self,
        approval: &ExecApproval,
        preferred_agent_id: Option<&str>,
    ) -> PauseOutcome {
        let agents = self.agents.snapshot_map();
        pause_run_for_approval(
            self.connection,
            approval,
            preferred_agent_id,
            &agents,
            &mut self.paused,
            self.client.as_ref(),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Resolve
    // -----------------------------------------------------------------------

    /// Apply a human decision to `approval_id` through the injected
    /// resolver, then auto-resume the paused run when the outcome allows
    /// execution. At most one resume attempt is made per allow, right
    /// after resolution returns.
    pub async fn resolve(
        &mut self,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<Resolved, ResolveError> {
        if let Some(approval) = self.pending.get_mut(approval_id) {
            approval.resolving = true;
            approval.error = None;
        }

        match self.resolver.resolve(approval_id, decision).await {
            Ok(outcome) => {
                // the approval leaves pending state on any applied decision;
                // the remote removal notification arriving later is a no-op
                let local = self.pending.remove(approval_id);
                let resolved = match outcome {
                    ResolverOutcome::Denied => Resolved {
                        allowed: false,
                        resume: None,
                    },
                    ResolverOutcome::Allowed {
                        approval: resolved,
                        agent_id,
                    } => {
                        // prefer the local copy; the resolver's is the
                        // fallback when the id was never mirrored here
                        let mut approval = local.unwrap_or(resolved);
                        approval.resolving = false;
                        let target = agent_id
                            .or_else(|| approval.agent_id.clone())
                            .or_else(|| {
                                agent_id_from_session_key(&approval.session_key)
                                    .map(str::to_string)
                            });
                        let resume = match target {
                            Some(target) => self.auto_resume(&approval, &target).await,
                            None => {
                                debug!(approval_id = %approval.id, "allow without a target agent");
                                ResumeOutcome::Skipped(SkipReason::NoTargetAgent)
                            }
                        };
                        Resolved {
                            allowed: true,
                            resume: Some(resume),
                        }
                    }
                };
                self.publish_awaiting_patches();
                Ok(resolved)
            }
            Err(e) => {
                if let Some(approval) = self.pending.get_mut(approval_id) {
                    approval.resolving = false;
                    approval.error = Some(e.to_string());
                }
                warn!(approval_id, error = %e, "decision failed to apply");
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Auto-resume
    // -----------------------------------------------------------------------

    /// Resume `target_agent_id`'s paused run after an allow on `approval`.
    ///
    /// Step order is load-bearing:
    /// 1. claim (clear) the paused-run entry before any await, so a racing
    ///    resume for the same pause observes `no-paused-run` and stops;
    /// 2. publish the optimistic running patch so observers reflect
    ///    resumption without waiting on the network;
    /// 3. bounded wait on the paused run (a timeout is a normal outcome);
    /// 4. re-validate run ownership against the *current* snapshot;
    /// 5. only then deliver the marked continuation, echo suppressed.
    async fn auto_resume(&mut self, approval: &ExecApproval, target_agent_id: &str) -> ResumeOutcome {
        let paused_run_id =
            match auto_resume_preflight(approval, target_agent_id, &self.pending, &self.paused) {
                PreflightOutcome::Proceed { paused_run_id } => paused_run_id,
                PreflightOutcome::Skip(reason) => {
                    debug!(agent_id = target_agent_id, ?reason, "auto-resume skipped");
                    return ResumeOutcome::Skipped(reason);
                }
            };

        self.paused.clear(target_agent_id);

        self.bus.publish(StateEvent::AgentRunning {
            agent_id: target_agent_id.to_string(),
            run_id: paused_run_id.clone(),
            at_ms: self.clock.now_ms(),
        });

        match self
            .client
            .wait(&paused_run_id, self.config.wait_timeout_ms)
            .await
        {
            Ok(status) => {
                debug!(run_id = %paused_run_id, ?status, "wait returned");
            }
            Err(e) if e.is_disconnect() => {
                debug!(run_id = %paused_run_id, error = %e, "disconnected during wait, not resuming blindly");
                return ResumeOutcome::Skipped(SkipReason::Disconnected);
            }
            Err(e) => {
                warn!(run_id = %paused_run_id, error = %e, "wait failed");
                return ResumeOutcome::Skipped(SkipReason::RpcFailed);
            }
        }

        let current = self.agents.agent(target_agent_id);
        let Some(session_key) = auto_resume_dispatch(current.as_ref(), &paused_run_id) else {
            debug!(
                agent_id = target_agent_id,
                run_id = %paused_run_id,
                "pause context obsolete, dropping continuation"
            );
            return ResumeOutcome::Skipped(SkipReason::RunReplaced);
        };

        let options = SendOptions {
            echo: false,
            marker: Some(CONTINUATION_MARKER.to_string()),
        };
        match self
            .client
            .send_message(&session_key, CONTINUATION_TEXT, options)
            .await
        {
            Ok(()) => {
                debug!(agent_id = target_agent_id, run_id = %paused_run_id, "run resumed");
                ResumeOutcome::Resumed {
                    agent_id: target_agent_id.to_string(),
                    run_id: paused_run_id,
                }
            }
            Err(e) if e.is_disconnect() => {
                debug!(error = %e, "disconnected delivering continuation");
                ResumeOutcome::Skipped(SkipReason::Disconnected)
            }
            Err(e) => {
                warn!(error = %e, "continuation delivery failed");
                ResumeOutcome::Skipped(SkipReason::RpcFailed)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Prune
    // -----------------------------------------------------------------------

    /// Remove every approval past its grace window. Returns the removed
    /// approvals.
    pub fn prune_now(&mut self) -> Vec<ExecApproval> {
        let now_ms = self.clock.now_ms();
        let removed = prune_pending(&mut self.pending, now_ms, self.config.grace_ms);
        if !removed.is_empty() {
            debug!(count = removed.len(), "pruned expired approvals");
            self.publish_awaiting_patches();
        }
        removed
    }

    /// Milliseconds until the next prune pass is due; `None` when nothing
    /// is pending.
    pub fn prune_delay_ms(&self) -> Option<i64> {
        prune_delay(&self.pending, self.clock.now_ms(), self.config.grace_ms)
    }

    // -----------------------------------------------------------------------
    // Derived view
    // -----------------------------------------------------------------------

    fn publish_awaiting_patches(&self) {
        let agents = self.agents.snapshot_map();
        for patch in awaiting_input_patches(&agents, &self.pending) {
            self.bus.publish(StateEvent::AwaitingInput {
                agent_id: patch.agent_id,
                awaiting: patch.awaiting,
            });
        }
    }
}
