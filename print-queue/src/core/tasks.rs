//! Background task supervision
//!
//! Named tasks sharing one cancellation token. Panics are caught and
//! logged; shutdown cancels the token and awaits every task.
//!
//! # Task kinds
//!
//! - [`TaskKind::Worker`] - queue watchers
//! - [`TaskKind::Listener`] - transport connection loops
//! - [`TaskKind::Periodic`] - interval probes

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Worker,
    Listener,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Listener => write!(f, "Listener"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: String,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Background task registry
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.spawn("watcher-1", TaskKind::Worker, watcher.run(tasks.shutdown_token()));
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token the tasks listen on
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn and register a task
    ///
    /// Returning before shutdown is logged as unexpected; a panic is
    /// logged with its message.
    pub fn spawn<F>(&mut self, name: impl Into<String>, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let shutdown = self.shutdown.clone();

        let wrapped_future = async move {
            let result = AssertUnwindSafe(future).catch_unwind().await;
            match result {
                Ok(()) if shutdown.is_cancelled() => {
                    tracing::debug!(task = %task_name, kind = %kind, "Background task finished");
                }
                Ok(()) => {
                    tracing::warn!(task = %task_name, kind = %kind, "Background task completed unexpectedly");
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        task = %task_name,
                        kind = %kind,
                        panic = %panic_msg,
                        "Background task panicked"
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// (worker, listener, periodic)
    pub fn count_by_kind(&self) -> (usize, usize, usize) {
        let mut worker = 0;
        let mut listener = 0;
        let mut periodic = 0;

        for task in &self.tasks {
            match task.kind {
                TaskKind::Worker => worker += 1,
                TaskKind::Listener => listener += 1,
                TaskKind::Periodic => periodic += 1,
            }
        }

        (worker, listener, periodic)
    }

    pub fn log_summary(&self) {
        let (worker, listener, periodic) = self.count_by_kind();
        tracing::info!(
            "Background tasks registered: {} total (Worker: {}, Listener: {}, Periodic: {})",
            self.tasks.len(),
            worker,
            listener,
            periodic
        );
    }

    /// Number of tasks that already ended; each one is logged
    pub fn check_health(&self) -> usize {
        let mut failed_count = 0;
        for task in &self.tasks {
            if task.handle.is_finished() {
                tracing::error!(
                    task = %task.name,
                    kind = %task.kind,
                    "Background task is no longer running"
                );
                failed_count += 1;
            }
        }
        failed_count
    }

    /// Cancel every task and wait for each to finish
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());

        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => {
                    tracing::debug!(task = %task.name, "Task completed");
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(task = %task.name, "Task cancelled");
                }
                Err(e) => {
                    tracing::error!(task = %task.name, error = ?e, "Task panicked");
                }
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
