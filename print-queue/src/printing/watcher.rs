//! Queue Watcher
//!
//! Polls the job store and drives each pending job to an outcome:
//! claim, load the order, print, then record success or failure.
//! Several watchers may run against one database; the conditional
//! claim is the only coordination between them.

use futures::FutureExt;
use parking_lot::RwLock;
use sqlx::SqlitePool;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::adapter::{PrintError, PrinterAdapter, probe_logged};
use crate::db::models::PrintJob;
use crate::db::repository::{OrderSource, RepoError, RepoResult, print_job};
use crate::notify::{EventNotifier, PrintEvent};
use crate::utils::{AppError, AppResult, error_chain};

/// Watcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Running,
}

/// What happened to one job in a poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Claimed by someone else first
    Skipped,
    Printed,
    /// Failed this attempt, back to `pending`
    Requeued,
    /// Failed the last attempt
    Failed,
    /// Left `printing` while this watcher held it (operator retry,
    /// delete, lease reclaim); the outcome was not recorded
    Superseded,
}

/// Counters for one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub reclaimed: usize,
    pub skipped: usize,
    pub printed: usize,
    pub requeued: usize,
    pub failed: usize,
    pub superseded: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Printed => self.printed += 1,
            JobOutcome::Requeued => self.requeued += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Superseded => self.superseded += 1,
        }
    }

    /// Jobs this watcher actually worked on
    pub fn handled(&self) -> usize {
        self.printed + self.requeued + self.failed + self.superseded
    }
}

pub struct QueueWatcher {
    name: String,
    pool: SqlitePool,
    orders: Arc<dyn OrderSource>,
    printer: Arc<dyn PrinterAdapter>,
    notifier: EventNotifier,
    poll_interval: Duration,
    lease: Option<Duration>,
    state: RwLock<WatcherState>,
}

impl QueueWatcher {
    pub fn new(
        name: impl Into<String>,
        pool: SqlitePool,
        orders: Arc<dyn OrderSource>,
        printer: Arc<dyn PrinterAdapter>,
        notifier: EventNotifier,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            pool,
            orders,
            printer,
            notifier,
            poll_interval,
            lease: None,
            state: RwLock::new(WatcherState::Stopped),
        }
    }

    /// Reclaim `printing` jobs older than `lease` at the start of each cycle
    pub fn with_lease(mut self, lease: Option<Duration>) -> Self {
        self.lease = lease;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WatcherState {
        *self.state.read()
    }

    /// Startup precondition, see [`ensure_printer_ready`]
    pub async fn check_startup(&self) -> AppResult<()> {
        ensure_printer_ready(self.printer.as_ref()).await
    }

    /// Poll until `shutdown` is cancelled
    ///
    /// A cycle already in progress runs to completion before the loop
    /// exits. A second concurrent `run` on the same watcher returns at once.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        {
            let mut state = self.state.write();
            if *state == WatcherState::Running {
                tracing::warn!(watcher = %self.name, "Watcher already running");
                return;
            }
            *state = WatcherState::Running;
        }
        tracing::info!(
            watcher = %self.name,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Queue watcher started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.guarded_cycle().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        *self.state.write() = WatcherState::Stopped;
        tracing::info!(watcher = %self.name, "Queue watcher stopped");
    }

    /// One cycle with every error and panic contained
    async fn guarded_cycle(&self) {
        match AssertUnwindSafe(self.poll_cycle()).catch_unwind().await {
            Ok(Ok(report)) => {
                if report.handled() > 0 || report.reclaimed > 0 {
                    tracing::debug!(watcher = %self.name, ?report, "Poll cycle done");
                }
            }
            Ok(Err(e)) => {
                tracing::error!(watcher = %self.name, error = %e, "Poll cycle aborted");
            }
            Err(_) => {
                tracing::error!(watcher = %self.name, "Poll cycle panicked");
            }
        }
    }

    /// Process every pending job once, oldest first
    ///
    /// A storage error aborts the rest of the cycle.
    pub async fn poll_cycle(&self) -> RepoResult<CycleReport> {
        let mut report = CycleReport::default();

        if let Some(lease) = self.lease {
            let reclaimed = print_job::reclaim_stale(&self.pool, lease).await?;
            for job in &reclaimed {
                tracing::warn!(
                    watcher = %self.name,
                    job_id = job.id,
                    order_id = job.order_id,
                    attempt = job.attempts,
                    status = %job.status,
                    "Reclaimed job with expired print lease"
                );
                if job.is_failed() {
                    self.notifier.notify(&PrintEvent::PrintFailed(job.clone())).await;
                }
            }
            report.reclaimed = reclaimed.len();
        }

        for job in print_job::list_pending(&self.pool).await? {
            let outcome = self.process_job(&job).await?;
            report.record(outcome);
        }
        Ok(report)
    }

    /// Drive one listed job
    ///
    /// Storage errors propagate. A job that another actor moved out of
    /// `printing` mid-print only ends this job, not the cycle.
    pub async fn process_job(&self, listed: &PrintJob) -> RepoResult<JobOutcome> {
        let Some(job) = print_job::claim(&self.pool, listed.id).await? else {
            tracing::debug!(watcher = %self.name, job_id = listed.id, "Job claimed elsewhere");
            return Ok(JobOutcome::Skipped);
        };

        let attempt = job.attempts + 1;
        tracing::info!(
            watcher = %self.name,
            job_id = job.id,
            order_id = job.order_id,
            attempt,
            max_attempts = job.max_attempts,
            "Printing order"
        );

        match self.print_order(job.order_id).await {
            Ok(()) => {
                let printed = match print_job::mark_printed(&self.pool, job.id).await {
                    Ok(printed) => printed,
                    Err(e) => return self.superseded(&job, e),
                };
                tracing::info!(
                    watcher = %self.name,
                    job_id = job.id,
                    order_id = job.order_id,
                    "Order printed"
                );
                self.notifier.notify(&PrintEvent::PrintSuccess(printed)).await;
                Ok(JobOutcome::Printed)
            }
            Err(e) => {
                let stack = error_chain(&e);
                let updated =
                    match print_job::record_failure(&self.pool, job.id, &e.message, Some(&stack))
                        .await
                    {
                        Ok(updated) => updated,
                        Err(err) => return self.superseded(&job, err),
                    };

                if updated.is_failed() {
                    tracing::error!(
                        watcher = %self.name,
                        job_id = job.id,
                        order_id = job.order_id,
                        attempt = updated.attempts,
                        error = %e.message,
                        "Print failed, attempts exhausted"
                    );
                    self.notifier.notify(&PrintEvent::PrintFailed(updated)).await;
                    Ok(JobOutcome::Failed)
                } else {
                    tracing::warn!(
                        watcher = %self.name,
                        job_id = job.id,
                        order_id = job.order_id,
                        attempt = updated.attempts,
                        remaining = updated.remaining_attempts(),
                        error = %e.message,
                        "Print failed, job re-queued"
                    );
                    Ok(JobOutcome::Requeued)
                }
            }
        }
    }

    fn superseded(&self, job: &PrintJob, err: RepoError) -> RepoResult<JobOutcome> {
        match err {
            RepoError::InvalidTransition(_) | RepoError::NotFound(_) => {
                tracing::warn!(
                    watcher = %self.name,
                    job_id = job.id,
                    order_id = job.order_id,
                    reason = %err,
                    "Job changed while printing, outcome not recorded"
                );
                Ok(JobOutcome::Superseded)
            }
            other => Err(other),
        }
    }

    async fn print_order(&self, order_id: i64) -> Result<(), PrintError> {
        let order = match self.orders.find_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Err(PrintError::new(format!("Ordine #{order_id} non trovato"))),
            Err(e) => {
                return Err(PrintError::with_cause(
                    format!("Ordine #{order_id} non leggibile"),
                    e,
                ));
            }
        };
        self.printer.print(&order).await
    }
}

/// A real printer must answer the probe before any watcher runs
pub async fn ensure_printer_ready(printer: &dyn PrinterAdapter) -> AppResult<()> {
    if printer.is_mock() {
        tracing::info!("Mock printer, skipping startup probe");
        return Ok(());
    }
    if !probe_logged(printer).await {
        return Err(AppError::PrinterUnavailable(printer.describe()));
    }
    tracing::info!(printer = %printer.describe(), "Printer reachable");
    Ok(())
}
