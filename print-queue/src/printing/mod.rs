//! Receipt Printing Module
//!
//! - `renderer`: order -> receipt lines -> ESC/POS bytes or text
//! - `adapter`: thermal and mock printers behind [`PrinterAdapter`]
//! - `watcher`: the polling loop that drives jobs to an outcome
//! - `health`: edge-triggered printer reachability
//! - `service`: operator operations on the queue

pub mod adapter;
pub mod health;
pub mod renderer;
pub mod service;
pub mod watcher;

pub use adapter::{MockPrinter, PrintError, PrintResult, PrinterAdapter, ThermalPrinter};
pub use health::{PrinterHealthMonitor, PrinterHealthState};
pub use renderer::{ReceiptLine, ReceiptRenderer};
pub use service::PrintQueueService;
pub use watcher::{CycleReport, JobOutcome, QueueWatcher, WatcherState, ensure_printer_ready};
