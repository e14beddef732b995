//! Print queue service - operator facing job operations
//!
//! Status lookups, manual retry and deletion, sending an order to print
//! and the printer self-test. Everything the watcher does goes through
//! `print_job` directly.

use sqlx::SqlitePool;
use std::sync::Arc;

use super::adapter::{PrintError, PrintResult, PrinterAdapter};
use crate::db::models::{Order, PrintJob};
use crate::db::repository::{OrderRepository, RepoError, RepoResult, print_job};

#[derive(Clone)]
pub struct PrintQueueService {
    pool: SqlitePool,
    orders: OrderRepository,
    printer: Option<Arc<dyn PrinterAdapter>>,
}

impl PrintQueueService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            orders: OrderRepository::new(pool.clone()),
            pool,
            printer: None,
        }
    }

    /// Printer used by [`Self::test_print`]
    pub fn with_printer(mut self, printer: Arc<dyn PrinterAdapter>) -> Self {
        self.printer = Some(printer);
        self
    }

    /// Print the self-test page, bypassing the queue
    pub async fn test_print(&self) -> PrintResult<()> {
        let Some(printer) = &self.printer else {
            return Err(PrintError::new("no printer attached"));
        };
        if let Err(e) = printer.test_print().await {
            tracing::warn!(printer = %printer.describe(), error = %e, "Test print failed");
            return Err(e);
        }
        tracing::info!(printer = %printer.describe(), "Test print done");
        Ok(())
    }

    /// Mark an order sent and queue its receipt, atomically
    pub async fn send_order(
        &self,
        order_id: i64,
        printer_name: Option<&str>,
    ) -> RepoResult<(Order, PrintJob)> {
        self.orders.send(order_id, printer_name).await
    }

    /// Queue a job for an order outside the send workflow (reprint)
    pub async fn create(&self, order_id: i64, printer_name: Option<&str>) -> RepoResult<PrintJob> {
        let job = print_job::create(&self.pool, order_id, printer_name).await?;
        tracing::info!(order_id, job_id = job.id, "Print job queued");
        Ok(job)
    }

    pub async fn find_by_id(&self, id: i64) -> RepoResult<Option<PrintJob>> {
        print_job::find_by_id(&self.pool, id).await
    }

    /// Latest job of an order
    pub async fn find_by_order_id(&self, order_id: i64) -> RepoResult<Option<PrintJob>> {
        print_job::find_by_order(&self.pool, order_id).await
    }

    pub async fn find_all(&self) -> RepoResult<Vec<PrintJob>> {
        print_job::find_all(&self.pool).await
    }

    pub async fn find_failed(&self) -> RepoResult<Vec<PrintJob>> {
        print_job::find_failed(&self.pool).await
    }

    /// Put a job back in the queue with a fresh attempt budget
    pub async fn retry(&self, id: i64) -> RepoResult<PrintJob> {
        let job = print_job::retry(&self.pool, id).await?;
        if job.is_printed() {
            tracing::warn!(job_id = id, order_id = job.order_id, "Retry ignored, job already printed");
        } else {
            tracing::info!(job_id = id, order_id = job.order_id, "Print job reset for retry");
        }
        Ok(job)
    }

    pub async fn delete(&self, id: i64) -> RepoResult<()> {
        if !print_job::delete(&self.pool, id).await? {
            return Err(RepoError::NotFound(format!("print job {id}")));
        }
        tracing::info!(job_id = id, "Print job deleted");
        Ok(())
    }
}
