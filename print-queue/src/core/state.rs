use std::sync::Arc;

use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::db::repository::OrderRepository;
use crate::notify::{EventNotifier, HubConfig, HubPublisher};
use crate::printing::{
    MockPrinter, PrintQueueService, PrinterAdapter, PrinterHealthMonitor, QueueWatcher,
    ReceiptRenderer, ThermalPrinter, ensure_printer_ready,
};
use crate::utils::{AppError, AppResult};
use vicanto_printer::NetworkPrinter;

/// Shared handles of the print-queue process
///
/// | Field | Meaning |
/// |-------|---------|
/// | config | Process configuration (immutable) |
/// | db | SQLite pool holding orders and the queue |
/// | orders | Order lookup used before printing |
/// | printer | Thermal or mock printer |
/// | notifier | Real-time side channel (possibly disabled) |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub orders: Arc<OrderRepository>,
    pub printer: Arc<dyn PrinterAdapter>,
    pub notifier: EventNotifier,
}

impl ServerState {
    /// Open the database, build the printer, enforce the printer
    /// precondition, then connect the notifier
    ///
    /// The hub connection loop, when enabled, is registered in `transport`.
    pub async fn initialize(config: &Config, transport: &mut BackgroundTasks) -> AppResult<Self> {
        let db = DbService::new(&config.database_path).await?;
        let printer = build_printer(config)?;
        tracing::info!(printer = %printer.describe(), "Printer adapter ready");

        if let Err(e) = ensure_printer_ready(printer.as_ref()).await {
            db.close().await;
            return Err(e);
        }

        let notifier = build_notifier(config, transport);

        let mut config = config.clone();
        config.lease_timeout = config.effective_lease();
        if let Some(lease) = config.lease_timeout {
            tracing::info!(lease_secs = lease.as_secs(), "Stale print lease enabled");
        }

        Ok(Self {
            config,
            orders: Arc::new(OrderRepository::new(db.pool.clone())),
            db,
            printer,
            notifier,
        })
    }

    /// One queue watcher wired to the shared handles
    pub fn watcher(&self, name: impl Into<String>) -> QueueWatcher {
        QueueWatcher::new(
            name,
            self.db.pool.clone(),
            self.orders.clone(),
            self.printer.clone(),
            self.notifier.clone(),
            self.config.poll_interval,
        )
        .with_lease(self.config.lease_timeout)
    }

    /// Operator operations on this process's queue and printer
    pub fn queue_service(&self) -> PrintQueueService {
        PrintQueueService::new(self.db.pool.clone()).with_printer(self.printer.clone())
    }

    /// Spawn the watchers and, for a real printer, the health monitor
    pub fn start_pipeline(&self, tasks: &mut BackgroundTasks) {
        let shutdown = tasks.shutdown_token();

        for i in 1..=self.config.watcher_instances {
            let watcher = Arc::new(self.watcher(format!("watcher-{i}")));
            let name = watcher.name().to_string();
            tasks.spawn(name, TaskKind::Worker, watcher.run(shutdown.clone()));
        }

        if self.printer.is_mock() {
            tracing::info!("Mock printer, health monitor not started");
        } else {
            let monitor = PrinterHealthMonitor::new(
                self.printer.clone(),
                self.notifier.clone(),
                self.config.health_interval,
            );
            tasks.spawn("printer-health", TaskKind::Periodic, monitor.run(shutdown));
        }
    }

    /// Release the printer, the notifier and the database
    pub async fn close(&self) {
        self.printer.close().await;
        self.notifier.close().await;
        self.db.close().await;
    }
}

fn renderer(config: &Config) -> ReceiptRenderer {
    ReceiptRenderer::new(
        config.paper_width,
        config.timezone,
        config.shop.clone(),
        config.cover_price,
    )
}

fn build_printer(config: &Config) -> AppResult<Arc<dyn PrinterAdapter>> {
    if config.printer_mock {
        return Ok(Arc::new(MockPrinter::new(renderer(config), config.mock_delay)));
    }
    let device = NetworkPrinter::from_addr(&config.printer_addr)
        .map_err(|e| AppError::config(format!("PRINTER_ADDR: {e}")))?
        .with_timeout(config.printer_timeout);
    Ok(Arc::new(ThermalPrinter::new(
        device,
        renderer(config),
        config.printer_timeout,
    )))
}

fn build_notifier(config: &Config, transport: &mut BackgroundTasks) -> EventNotifier {
    let Some(token) = config.event_hub_token.clone() else {
        tracing::warn!("EVENT_HUB_TOKEN not set, real-time notifications disabled");
        return EventNotifier::disabled();
    };

    let shutdown = transport.shutdown_token();
    let (publisher, connection) = HubPublisher::new(
        HubConfig {
            addr: config.event_hub_addr.clone(),
            token,
            reconnect_delay: config.reconnect_delay,
        },
        shutdown,
    );
    transport.spawn("event-hub", TaskKind::Listener, connection);
    EventNotifier::new(publisher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_state_starts_watchers_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let mut config = Config::for_mock(path.to_str().unwrap());
        config.watcher_instances = 2;
        // shorter than one mock print plus margin
        config.lease_timeout = Some(std::time::Duration::from_secs(1));

        let mut transport = BackgroundTasks::new();
        let state = ServerState::initialize(&config, &mut transport).await.unwrap();
        assert!(state.printer.is_mock());
        assert!(!state.notifier.is_enabled());
        assert!(transport.is_empty());

        let mut tasks = BackgroundTasks::new();
        state.start_pipeline(&mut tasks);
        assert_eq!(tasks.count_by_kind(), (2, 0, 0));
        assert_eq!(state.config.lease_timeout, None);
        state.queue_service().test_print().await.unwrap();

        tasks.shutdown().await;
        state.close().await;
    }

    #[tokio::test]
    async fn test_unreachable_printer_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let mut config = Config::for_mock(path.to_str().unwrap());
        config.printer_mock = false;
        config.printer_addr = "127.0.0.1:1".into();
        config.printer_timeout = std::time::Duration::from_millis(200);

        let mut transport = BackgroundTasks::new();
        let result = ServerState::initialize(&config, &mut transport).await;
        assert!(matches!(result, Err(AppError::PrinterUnavailable(_))));
    }
}
