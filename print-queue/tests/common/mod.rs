//! Shared fixtures for the pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use print_queue::db::models::{NewOrder, NewOrderItem};
use print_queue::db::repository::OrderRepository;
use print_queue::notify::{EventPublisher, NotifyError, NotifyResult};
use print_queue::printing::{PrintError, PrintResult};
use print_queue::{DbService, EventNotifier, Order, PrintJob, PrinterAdapter, QueueWatcher};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub async fn test_db() -> (TempDir, DbService) {
    print_queue::init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.db");
    let db = DbService::new(path.to_str().unwrap()).await.unwrap();
    (dir, db)
}

fn sample_order(table_number: i64) -> NewOrder {
    NewOrder {
        table_number,
        covers: 2,
        waiter: Some("Giulia".into()),
        notes: None,
        items: vec![
            NewOrderItem::new("Coppetta Media", 2, 3.5).with_flavors(&["Pistacchio", "Fragola"]),
            NewOrderItem::new("Affogato", 1, 5.0).with_course(2),
        ],
    }
}

/// Pending order with generated id
pub async fn create_order(pool: &SqlitePool) -> i64 {
    OrderRepository::new(pool.clone())
        .create(sample_order(4), Decimal::ONE)
        .await
        .unwrap()
        .id
}

/// Pending order with a chosen id
pub async fn create_order_with_id(pool: &SqlitePool, id: i64) -> i64 {
    sqlx::query(
        "INSERT INTO orders (id, table_number, status, covers, subtotal, cover_charge, total, created_at)
         VALUES (?, 9, 'pending', 1, 3.0, 1.0, 4.0, 0)",
    )
    .bind(id)
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO order_items (order_id, category, flavors, quantity, course, unit_price, total_price, created_at)
         VALUES (?, 'Cono', '[\"Nocciola\"]', 1, 1, 3.0, 3.0, 0)",
    )
    .bind(id)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Send an order; returns its job
pub async fn send_order(pool: &SqlitePool, order_id: i64) -> PrintJob {
    OrderRepository::new(pool.clone())
        .send(order_id, None)
        .await
        .unwrap()
        .1
}

/// Printer failing a scripted number of times per order
#[derive(Default)]
pub struct ScriptedPrinter {
    failures: Mutex<HashMap<i64, usize>>,
    calls: Mutex<Vec<i64>>,
    printed: Mutex<Vec<i64>>,
    delay: Duration,
}

impl ScriptedPrinter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// Fail the next `times` prints of `order_id`
    pub fn fail(&self, order_id: i64, times: usize) {
        self.failures.lock().insert(order_id, times);
    }

    /// Every print call, in order
    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().clone()
    }

    /// Successful prints, in order
    pub fn printed(&self) -> Vec<i64> {
        self.printed.lock().clone()
    }
}

#[async_trait]
impl PrinterAdapter for ScriptedPrinter {
    async fn probe(&self) -> bool {
        true
    }

    async fn print(&self, order: &Order) -> PrintResult<()> {
        self.calls.lock().push(order.id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let attempt_fails = {
            let mut failures = self.failures.lock();
            match failures.get_mut(&order.id) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    Some(*left)
                }
                _ => None,
            }
        };
        if let Some(left) = attempt_fails {
            return Err(PrintError::new(format!(
                "printer timeout on order {} ({left} failures left)",
                order.id
            )));
        }

        self.printed.lock().push(order.id);
        Ok(())
    }

    async fn test_print(&self) -> PrintResult<()> {
        Ok(())
    }

    async fn close(&self) {}

    fn is_mock(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

/// Publisher recording `(room, event, payload)`
#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingPublisher {
    /// Event names delivered to the monitor room
    pub fn monitor_events(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(room, _, _)| room == "monitor")
            .map(|(_, event, _)| event.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, room: &str, event: &str, payload: &Value) -> NotifyResult<()> {
        self.sent
            .lock()
            .push((room.to_string(), event.to_string(), payload.clone()));
        Ok(())
    }
}

/// Publisher that errors or panics on every event
pub struct BrokenPublisher {
    pub panic: bool,
}

#[async_trait]
impl EventPublisher for BrokenPublisher {
    async fn publish(&self, _: &str, _: &str, _: &Value) -> NotifyResult<()> {
        if self.panic {
            panic!("hub client crashed");
        }
        Err(NotifyError::NotConnected)
    }
}

pub fn watcher(
    name: &str,
    pool: &SqlitePool,
    printer: Arc<dyn PrinterAdapter>,
    notifier: EventNotifier,
) -> QueueWatcher {
    QueueWatcher::new(
        name,
        pool.clone(),
        Arc::new(OrderRepository::new(pool.clone())),
        printer,
        notifier,
        Duration::from_millis(20),
    )
}
