//! Daemon-style loop driving the coordinator.
//!
//! Consumes inbound runtime notifications, and schedules prune passes from
//! the soonest pending expiry, re-arming after every state change. The
//! coordinator is shared behind an async mutex so the embedding
//! application can call `resolve` and the read surface on the same
//! instance; the mutex is what serializes callers into the entry points.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use wd_core::config::ServiceConfig;
use wd_runtime::events::RuntimeNotification;

use crate::coordinator::Coordinator;

// Used while nothing is pending; the loop re-arms on every notification
// long before this elapses.
const IDLE_PRUNE_DELAY: Duration = Duration::from_secs(3_600);

// ---------------------------------------------------------------------------
// CoordinatorService
// ---------------------------------------------------------------------------

pub struct CoordinatorService {
    coordinator: Arc<Mutex<Coordinator>>,
    inbound: flume::Receiver<RuntimeNotification>,
    shutdown: watch::Receiver<bool>,
    min_prune_delay: Duration,
}

impl CoordinatorService {
    pub fn new(
        coordinator: Arc<Mutex<Coordinator>>,
        inbound: flume::Receiver<RuntimeNotification>,
        shutdown: watch::Receiver<bool>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            coordinator,
            inbound,
            shutdown,
            min_prune_delay: Duration::from_millis(config.min_prune_delay_ms),
        }
    }

    /// Bounded inbound channel sized from config.
    pub fn channel(
        config: &ServiceConfig,
    ) -> (
        flume::Sender<RuntimeNotification>,
        flume::Receiver<RuntimeNotification>,
    ) {
        flume::bounded(config.channel_capacity)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown is signalled or every notification sender is
    /// dropped.
    pub async fn run(mut self) -> Result<()> {
        info!("coordinator service started");
        loop {
            let prune_due = {
                let coordinator = self.coordinator.lock().await;
                coordinator.prune_delay_ms()
            };
            let prune_sleep = match prune_due {
                Some(ms) => {
                    let ms = ms.max(self.min_prune_delay.as_millis() as i64) as u64;
                    Duration::from_millis(ms)
                }
                None => IDLE_PRUNE_DELAY,
            };

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                event = self.inbound.recv_async() => {
                    match event {
                        Ok(first) => {
                            // drain whatever already queued up behind it
                            let mut batch = vec![first];
                            while let Ok(more) = self.inbound.try_recv() {
                                batch.push(more);
                            }
                            debug!(count = batch.len(), "applying notification batch");
                            let mut coordinator = self.coordinator.lock().await;
                            coordinator.ingest(batch).await;
                        }
                        Err(_) => {
                            info!("notification channel closed");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(prune_sleep), if prune_due.is_some() => {
                    let mut coordinator = self.coordinator.lock().await;
                    let removed = coordinator.prune_now();
                    if !removed.is_empty() {
                        debug!(count = removed.len(), "prune pass removed approvals");
                    }
                }
            }
        }
        info!("coordinator service stopped");
        Ok(())
    }
}
