//! Server Implementation
//!
//! Runs the print pipeline until a termination signal, then shuts down
//! in order: watchers and health monitor, printer, notifier, database.

use std::time::Duration;

use crate::core::tasks::BackgroundTasks;
use crate::core::{Config, ServerState};
use crate::utils::AppResult;

/// How often the task registry is checked for dead tasks
const SUPERVISION_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until SIGINT/SIGTERM
    ///
    /// Fails only at startup (database, printer precondition).
    pub async fn run(self) -> AppResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves
    pub async fn run_until(self, signal: impl std::future::Future<Output = ()>) -> AppResult<()> {
        let mut transport = BackgroundTasks::new();
        let state = ServerState::initialize(&self.config, &mut transport).await?;

        let mut pipeline = BackgroundTasks::new();
        state.start_pipeline(&mut pipeline);
        transport.log_summary();
        pipeline.log_summary();
        tracing::info!(
            watchers = self.config.watcher_instances,
            mock = state.printer.is_mock(),
            "Print queue running"
        );

        let mut supervision = tokio::time::interval(SUPERVISION_INTERVAL);
        supervision.tick().await;
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => break,
                _ = supervision.tick() => {
                    pipeline.check_health();
                    transport.check_health();
                }
            }
        }

        tracing::info!("Shutting down print queue...");
        pipeline.shutdown().await;
        state.close().await;
        transport.shutdown().await;
        tracing::info!("Print queue stopped");
        Ok(())
    }
}

/// Graceful shutdown handler
///
/// Listens for SIGTERM and Ctrl+C. A handler that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
