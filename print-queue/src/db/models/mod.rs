//! Database Models

pub mod order;
pub mod print_job;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
pub use print_job::{PrintJob, PrintJobStatus};
