//! Background scan for intents addressed to one agent.
//!
//! Each cycle accepts pending intents (when `auto_accept` is set) and
//! processes accepted ones. Cancellation is checked between intents, so a
//! stop never leaves an intent half-transitioned; the next run resumes.

use crate::core::{Address, Error, ErrorKind, Result};
use crate::intent::coordinator::IntentCoordinator;
use crate::intent::record::{Intent, IntentStatus};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts from one scan cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub accepted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Periodic poller for one destination agent.
pub struct IntentPoller {
    coordinator: Arc<IntentCoordinator>,
    agent: Address,
    shutdown: CancellationToken,
}

impl IntentPoller {
    pub fn new(coordinator: Arc<IntentCoordinator>, agent: Address) -> Self {
        Self {
            coordinator,
            agent,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the poller when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Spawn the polling loop.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        let period = self.coordinator.config().poll_interval();
        info!(agent = %self.agent, interval_ms = period.as_millis() as u64, "intent poller started");

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.scan().await {
                        Ok(report) => debug!(agent = %self.agent, ?report, "scan finished"),
                        Err(e) => warn!(agent = %self.agent, error = %e, "scan failed"),
                    }
                }
                _ = self.shutdown.cancelled() => break,
            }
        }
        info!(agent = %self.agent, "intent poller stopped");
    }

    /// Run one scan cycle.
    pub async fn scan(&self) -> Result<ScanReport> {
        let agent = self.agent;
        let auto_accept = self.coordinator.config().auto_accept;
        let due = self
            .coordinator
            .list_intents(&move |i: &Intent| {
                i.to_agent == agent
                    && (i.status == IntentStatus::Accepted
                        || (auto_accept && i.status == IntentStatus::Pending))
            })
            .await?;
        debug!(agent = %agent, due = due.len(), "scanning intents");

        let outcomes: Vec<Outcome> = futures::stream::iter(due)
            .take_until(self.shutdown.cancelled())
            .then(|intent| self.handle(intent))
            .collect()
            .await;

        let mut report = ScanReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Accepted => report.accepted += 1,
                Outcome::Completed => report.completed += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }
        Ok(report)
    }

    async fn handle(&self, intent: Intent) -> Outcome {
        let accepted_here = intent.status == IntentStatus::Pending;
        if accepted_here {
            if let Err(e) = self.coordinator.accept_intent(&intent.address, &self.agent).await {
                return skipped(&intent.address, e);
            }
            if self.shutdown.is_cancelled() {
                return Outcome::Accepted;
            }
        }

        match self.coordinator.process_intent(&intent.address).await {
            Ok(_) => Outcome::Completed,
            Err(e) if matches!(e.kind(), ErrorKind::BackendUnavailable | ErrorKind::BackendTimeout) => {
                warn!(intent = %intent.address, error = %e, "intent failed");
                Outcome::Failed
            }
            Err(e) if accepted_here => {
                skipped(&intent.address, e);
                Outcome::Accepted
            }
            Err(e) => skipped(&intent.address, e),
        }
    }
}

enum Outcome {
    Accepted,
    Completed,
    Failed,
    Skipped,
}

fn skipped(intent: &Address, e: Error) -> Outcome {
    if e.kind() == ErrorKind::InvalidState {
        // Another worker got there first.
        debug!(intent = %intent, "intent already handled");
    } else {
        warn!(intent = %intent, error = %e, "intent skipped");
    }
    Outcome::Skipped
}
