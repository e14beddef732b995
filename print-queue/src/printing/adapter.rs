//! Printer adapters
//!
//! [`PrinterAdapter`] is the seam the watcher and health monitor print
//! through. [`ThermalPrinter`] drives a network ESC/POS printer;
//! [`MockPrinter`] logs a text rendering and always succeeds.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use vicanto_printer::{DeviceError, NetworkPrinter, Printer};

use super::renderer::ReceiptRenderer;
use crate::db::models::Order;
use crate::utils::time::now_millis;

/// Print failure with an optional underlying cause
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PrintError {
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl PrintError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl From<DeviceError> for PrintError {
    fn from(err: DeviceError) -> Self {
        Self::with_cause(format!("printer I/O failed: {err}"), err)
    }
}

pub type PrintResult<T> = Result<T, PrintError>;

/// Output device for customer receipts
///
/// `print` is not idempotent: every successful call is one physical receipt.
#[async_trait]
pub trait PrinterAdapter: Send + Sync {
    /// Reachability check; never fails, `false` on any problem
    async fn probe(&self) -> bool;

    /// Print one order's receipt
    async fn print(&self, order: &Order) -> PrintResult<()>;

    /// Print a self-test page
    async fn test_print(&self) -> PrintResult<()>;

    /// Release the device; later prints fail
    async fn close(&self);

    fn is_mock(&self) -> bool;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// Network thermal printer (raw TCP, ESC/POS)
pub struct ThermalPrinter {
    device: NetworkPrinter,
    renderer: ReceiptRenderer,
    timeout: Duration,
    closed: AtomicBool,
}

impl ThermalPrinter {
    /// `timeout` bounds one whole print call, connect and write included;
    /// the device keeps its own per-step timeout
    pub fn new(device: NetworkPrinter, renderer: ReceiptRenderer, timeout: Duration) -> Self {
        Self {
            device,
            renderer,
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    async fn send(&self, data: Vec<u8>) -> PrintResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PrintError::new("printer connection closed"));
        }
        match tokio::time::timeout(self.timeout, self.device.print(&data)).await {
            Ok(result) => Ok(result?),
            Err(elapsed) => Err(PrintError::with_cause(
                format!(
                    "printer {} did not answer within {}ms",
                    self.device.addr(),
                    self.timeout.as_millis()
                ),
                elapsed,
            )),
        }
    }
}

#[async_trait]
impl PrinterAdapter for ThermalPrinter {
    async fn probe(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.device.is_online().await
    }

    #[instrument(skip_all, fields(order_id = order.id, printer = %self.device.addr()))]
    async fn print(&self, order: &Order) -> PrintResult<()> {
        ReceiptRenderer::validate(order).map_err(PrintError::new)?;
        let data = self.renderer.render_escpos(&self.renderer.layout(order));
        self.send(data).await?;
        info!("Receipt printed");
        Ok(())
    }

    #[instrument(skip_all, fields(printer = %self.device.addr()))]
    async fn test_print(&self) -> PrintResult<()> {
        let data = self
            .renderer
            .render_escpos(&self.renderer.test_layout(now_millis()));
        self.send(data).await?;
        info!("Test page printed");
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(printer = %self.device.addr(), "Printer connection closed");
        }
    }

    fn is_mock(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.device.addr())
    }
}

/// Printer stand-in: no I/O, logs the receipt as text
pub struct MockPrinter {
    renderer: ReceiptRenderer,
    delay: Duration,
    printed: AtomicUsize,
    last_receipt: Mutex<Option<String>>,
}

impl MockPrinter {
    pub fn new(renderer: ReceiptRenderer, delay: Duration) -> Self {
        Self {
            renderer,
            delay,
            printed: AtomicUsize::new(0),
            last_receipt: Mutex::new(None),
        }
    }

    /// Receipts "printed" so far
    pub fn printed_count(&self) -> usize {
        self.printed.load(Ordering::Relaxed)
    }

    pub fn last_receipt(&self) -> Option<String> {
        self.last_receipt.lock().clone()
    }
}

#[async_trait]
impl PrinterAdapter for MockPrinter {
    async fn probe(&self) -> bool {
        true
    }

    async fn print(&self, order: &Order) -> PrintResult<()> {
        tokio::time::sleep(self.delay).await;

        let text = self.renderer.render_text(&self.renderer.layout(order));
        info!(
            order_id = order.id,
            table = order.table_number,
            covers = order.covers,
            items = order.items.len(),
            "MOCK PRINT\n{}",
            text
        );

        *self.last_receipt.lock() = Some(text);
        self.printed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn test_print(&self) -> PrintResult<()> {
        let text = self.renderer.render_text(&self.renderer.test_layout(now_millis()));
        info!("MOCK TEST PRINT\n{}", text);
        Ok(())
    }

    async fn close(&self) {}

    fn is_mock(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Probe, logging instead of failing
pub async fn probe_logged(adapter: &dyn PrinterAdapter) -> bool {
    let online = adapter.probe().await;
    if !online {
        warn!(printer = %adapter.describe(), "Printer did not answer probe");
    }
    online
}
