use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::context::RequestContext;
use crate::domain::TransactionStatus;
use crate::error::AppError;
use crate::services::ActivationOrchestrator;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;

/// Outcome counts for one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub activated: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}

/// Periodically re-drives PENDING activations whose last update is older than
/// `stale_after`. Sweeps never overlap: the next tick waits for the current sweep.
pub struct RetryScheduler {
    orchestrator: Arc<ActivationOrchestrator>,
    interval: Duration,
    stale_after: Duration,
}

/// Stops a running scheduler loop.
pub struct RetrySchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetrySchedulerHandle {
    /// Signals the loop and waits for an in-flight sweep to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Retry scheduler task ended abnormally: {}", e);
        }
    }
}

impl RetryScheduler {
    pub fn new(orchestrator: Arc<ActivationOrchestrator>) -> Self {
        Self {
            orchestrator,
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn start(self) -> RetrySchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                stale_after_secs = self.stale_after.as_secs(),
                "Retry scheduler started"
            );
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; the first sweep runs one interval after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("Retry sweep failed: {}", e);
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Retry scheduler stopped");
        });

        RetrySchedulerHandle { shutdown, task }
    }

    pub async fn run_once(&self) -> Result<SweepReport, AppError> {
        self.sweep_at(Utc::now()).await
    }

    /// Runs one sweep as if the clock read `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .map_err(|e| AppError::Internal(format!("invalid stale_after: {}", e)))?;
        let cutoff = now - stale_after;

        let candidates = self.orchestrator.pending_for_retry(cutoff).await?;
        let mut report = SweepReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            debug!("No pending transactions to retry");
            return Ok(report);
        }

        info!("Retrying {} pending transaction(s)", candidates.len());

        for candidate in &candidates {
            let ctx = RequestContext::generate();
            match self.orchestrator.retry_pending(&ctx, candidate).await {
                Ok(tx) => match tx.status {
                    TransactionStatus::Activated => report.activated += 1,
                    TransactionStatus::Failed => report.failed += 1,
                    TransactionStatus::Pending => report.still_pending += 1,
                    other => debug!(unique_ref = %tx.unique_ref, status = %other, "Retry left transaction untouched"),
                },
                Err(e) => {
                    report.errors += 1;
                    warn!(
                        unique_ref = %candidate.unique_ref,
                        correlation_id = %ctx.correlation_id,
                        "Retry error: {}", e
                    );
                }
            }
        }

        info!(
            candidates = report.candidates,
            activated = report.activated,
            failed = report.failed,
            still_pending = report.still_pending,
            errors = report.errors,
            "Retry sweep complete"
        );
        Ok(report)
    }
}
