//! Order Model
//!
//! Orders are owned by order taking; the print pipeline reads them
//! (receipt content) and moves them `pending -> sent` together with
//! the creation of their print job.

use serde::{Deserialize, Serialize};

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Sent,
    Completed,
    Cancelled,
}

/// `orders` row (items loaded separately)
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub id: i64,
    pub table_number: i64,
    pub waiter: Option<String>,
    pub status: OrderStatus,
    pub covers: i64,
    pub subtotal: f64,
    pub cover_charge: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub created_at: i64,
    pub sent_at: Option<i64>,
}

/// `order_items` row, flavors still JSON text
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OrderItemRow {
    pub id: i64,
    pub category: String,
    pub flavors: String,
    pub quantity: i64,
    pub course: i64,
    pub custom_note: Option<String>,
    pub unit_price: f64,
    pub total_price: f64,
}

/// Full order with line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub table_number: i64,
    pub covers: i64,
    pub waiter: Option<String>,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub cover_charge: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub created_at: i64,
    pub sent_at: Option<i64>,
    pub items: Vec<OrderItem>,
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    /// Menu label, e.g. "Coppetta Media"
    pub category: String,
    pub flavors: Vec<String>,
    pub quantity: i64,
    /// Service sequence, 1 = first out
    pub course: i64,
    pub custom_note: Option<String>,
    pub unit_price: f64,
    pub total_price: f64,
}

impl Order {
    pub(crate) fn from_rows(row: OrderRow, items: Vec<OrderItem>) -> Self {
        Self {
            id: row.id,
            table_number: row.table_number,
            covers: row.covers,
            waiter: row.waiter,
            status: row.status,
            subtotal: row.subtotal,
            cover_charge: row.cover_charge,
            total: row.total,
            notes: row.notes,
            created_at: row.created_at,
            sent_at: row.sent_at,
            items,
        }
    }
}

/// Input for a new order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrder {
    pub table_number: i64,
    pub covers: i64,
    pub waiter: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// Input for a new order line; totals are computed on insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub category: String,
    #[serde(default)]
    pub flavors: Vec<String>,
    pub quantity: i64,
    #[serde(default = "default_course")]
    pub course: i64,
    pub custom_note: Option<String>,
    pub unit_price: f64,
}

fn default_course() -> i64 {
    1
}

impl NewOrderItem {
    pub fn new(category: impl Into<String>, quantity: i64, unit_price: f64) -> Self {
        Self {
            category: category.into(),
            flavors: Vec::new(),
            quantity,
            course: default_course(),
            custom_note: None,
            unit_price,
        }
    }

    pub fn with_flavors(mut self, flavors: &[&str]) -> Self {
        self.flavors = flavors.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_course(mut self, course: i64) -> Self {
        self.course = course;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.custom_note = Some(note.into());
        self
    }
}
