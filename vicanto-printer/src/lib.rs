//! # vicanto-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Windows-1252 encoding for European receipt printers (€, accented letters)
//! - Network printing (TCP port 9100) with a bounded connect and a reachability probe
//!
//! Business logic (WHAT to print) stays in application code:
//! - Order receipt rendering → print-queue
//!
//! ## Example
//!
//! ```ignore
//! use vicanto_printer::{Align, EscPosBuilder, NetworkPrinter, Printer, TextSize};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder
//!     .align(Align::Center)
//!     .size(TextSize::Double)
//!     .line("GELATERIA")
//!     .size(TextSize::Normal)
//!     .align(Align::Left)
//!     .rule('-')
//!     .line_lr("2x Coppetta", "€9.00")
//!     .cut_feed(4);
//!
//! let printer = NetworkPrinter::from_addr("192.168.1.100:9100")?;
//! printer.print(&builder.build()).await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod printer;

// Re-exports
pub use encoding::{convert_to_cp1252, pad_text, text_width, truncate_text};
pub use error::{DeviceError, DeviceResult};
pub use escpos::{Align, EscPosBuilder, TextSize};
pub use printer::{NetworkPrinter, Printer};
