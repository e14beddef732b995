//! Order Repository
//!
//! Read side used by the watcher before printing, plus the `send`
//! transition that creates the order's print job in the same transaction.

use super::{RepoError, RepoResult, print_job};
use crate::db::models::order::{OrderItemRow, OrderRow};
use crate::db::models::{NewOrder, Order, OrderItem, OrderStatus, PrintJob};
use crate::utils::money::{to_decimal, to_f64};
use crate::utils::time::now_millis;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

/// Highest course number accepted on an item
const MAX_COURSE: i64 = 5;

/// Order lookup used by the print pipeline
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Full order with items, `None` when it does not exist
    async fn find_order(&self, order_id: i64) -> RepoResult<Option<Order>>;
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending order, computing line totals and the cover charge
    pub async fn create(&self, data: NewOrder, cover_price: Decimal) -> RepoResult<Order> {
        validate_new_order(&data)?;

        let mut subtotal = Decimal::ZERO;
        let mut line_totals = Vec::with_capacity(data.items.len());
        for item in &data.items {
            let line = to_decimal(item.unit_price) * Decimal::from(item.quantity);
            subtotal += line;
            line_totals.push(line);
        }
        let cover_charge = cover_price * Decimal::from(data.covers);
        let total = subtotal + cover_charge;
        let now = now_millis();

        let mut tx = self.pool.begin().await?;

        let (order_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO orders (table_number, waiter, status, covers, subtotal, cover_charge, total, notes, created_at)
            VALUES (?, ?, 'pending', ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(data.table_number)
        .bind(&data.waiter)
        .bind(data.covers)
        .bind(to_f64(subtotal))
        .bind(to_f64(cover_charge))
        .bind(to_f64(total))
        .bind(&data.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for (item, line_total) in data.items.iter().zip(line_totals) {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, category, flavors, quantity, course, custom_note, unit_price, total_price, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(order_id)
            .bind(&item.category)
            .bind(serde_json::to_string(&item.flavors)?)
            .bind(item.quantity)
            .bind(item.course)
            .bind(&item.custom_note)
            .bind(item.unit_price)
            .bind(to_f64(line_total))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_order(order_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("order {order_id}")))
    }

    /// Send an order to print
    ///
    /// Moves the order `pending -> sent` and creates its print job inside
    /// one transaction; if either step fails neither is recorded.
    pub async fn send(
        &self,
        order_id: i64,
        printer_name: Option<&str>,
    ) -> RepoResult<(Order, PrintJob)> {
        let mut tx = self.pool.begin().await?;

        let sent: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = 'sent', sent_at = ?
            WHERE id = ? AND status = 'pending'
            RETURNING id
            "#,
        )
        .bind(now_millis())
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        if sent.is_none() {
            let status: Option<(OrderStatus,)> =
                sqlx::query_as("SELECT status FROM orders WHERE id = ?")
                    .bind(order_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match status {
                Some((status,)) => RepoError::InvalidTransition(format!(
                    "order {order_id} is {status:?}, only pending orders can be sent"
                )),
                None => RepoError::NotFound(format!("order {order_id}")),
            });
        }

        let job = print_job::create(&mut *tx, order_id, printer_name).await?;
        tx.commit().await?;

        tracing::info!(order_id, job_id = job.id, "Order sent, print job queued");

        let order = self
            .find_order(order_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("order {order_id}")))?;
        Ok((order, job))
    }
}

#[async_trait]
impl OrderSource for OrderRepository {
    async fn find_order(&self, order_id: i64) -> RepoResult<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, table_number, waiter, status, covers, subtotal, cover_charge, total, notes, created_at, sent_at
            FROM orders
            WHERE id = ?
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, category, flavors, quantity, course, custom_note, unit_price, total_price
            FROM order_items
            WHERE order_id = ?
            ORDER BY course ASC, created_at ASC, id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .into_iter()
            .map(|r| {
                Ok(OrderItem {
                    id: r.id,
                    category: r.category,
                    flavors: serde_json::from_str(&r.flavors)?,
                    quantity: r.quantity,
                    course: r.course,
                    custom_note: r.custom_note,
                    unit_price: r.unit_price,
                    total_price: r.total_price,
                })
            })
            .collect::<RepoResult<Vec<_>>>()?;

        Ok(Some(Order::from_rows(row, items)))
    }
}

fn validate_new_order(data: &NewOrder) -> RepoResult<()> {
    if data.covers <= 0 {
        return Err(RepoError::Validation(format!(
            "covers must be positive, got {}",
            data.covers
        )));
    }
    if data.items.is_empty() {
        return Err(RepoError::Validation("order has no items".to_string()));
    }
    for item in &data.items {
        if item.quantity <= 0 {
            return Err(RepoError::Validation(format!(
                "quantity must be positive, got {}",
                item.quantity
            )));
        }
        if !(1..=MAX_COURSE).contains(&item.course) {
            return Err(RepoError::Validation(format!(
                "course must be between 1 and {MAX_COURSE}, got {}",
                item.course
            )));
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(RepoError::Validation(format!(
                "unit_price must be a non-negative amount, got {}",
                item.unit_price
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewOrderItem, PrintJobStatus};
    use crate::db::test_support::test_db;
    use rust_decimal::prelude::FromPrimitive;

    fn sample_order() -> NewOrder {
        NewOrder {
            table_number: 4,
            covers: 2,
            waiter: Some("giulia".to_string()),
            notes: None,
            items: vec![
                NewOrderItem::new("Coppetta Media", 2, 3.5)
                    .with_flavors(&["Pistacchio", "Nocciola"])
                    .with_course(2),
                NewOrderItem::new("Cono Piccolo", 1, 2.2).with_note("senza cialda"),
            ],
        }
    }

    fn cover_price() -> Decimal {
        Decimal::from_f64(1.5).unwrap()
    }

    #[tokio::test]
    async fn test_create_computes_totals() {
        let (_dir, db) = test_db().await;
        let repo = OrderRepository::new(db.pool.clone());

        let order = repo.create(sample_order(), cover_price()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.subtotal, 9.2);
        assert_eq!(order.cover_charge, 3.0);
        assert_eq!(order.total, 12.2);

        // course ascending
        assert_eq!(order.items[0].category, "Cono Piccolo");
        assert_eq!(order.items[1].flavors, vec!["Pistacchio", "Nocciola"]);
        assert_eq!(order.items[1].total_price, 7.0);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (_dir, db) = test_db().await;
        let repo = OrderRepository::new(db.pool.clone());

        let mut empty = sample_order();
        empty.items.clear();
        assert!(matches!(
            repo.create(empty, cover_price()).await,
            Err(RepoError::Validation(_))
        ));

        let mut bad_course = sample_order();
        bad_course.items[0].course = 9;
        assert!(matches!(
            repo.create(bad_course, cover_price()).await,
            Err(RepoError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_find_missing_order() {
        let (_dir, db) = test_db().await;
        let repo = OrderRepository::new(db.pool.clone());
        assert!(repo.find_order(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_creates_job() {
        let (_dir, db) = test_db().await;
        let repo = OrderRepository::new(db.pool.clone());
        let order = repo.create(sample_order(), cover_price()).await.unwrap();

        let (sent, job) = repo.send(order.id, None).await.unwrap();
        assert_eq!(sent.status, OrderStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert_eq!(job.order_id, order.id);
        assert_eq!(job.status, PrintJobStatus::Pending);

        // second send is rejected and adds no job
        assert!(matches!(
            repo.send(order.id, None).await,
            Err(RepoError::InvalidTransition(_))
        ));
        assert_eq!(print_job::find_all(&db.pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_rolls_back_when_job_insert_fails() {
        let (_dir, db) = test_db().await;
        let repo = OrderRepository::new(db.pool.clone());
        let order = repo.create(sample_order(), cover_price()).await.unwrap();

        // printer_name longer than the column allows
        let too_long = "x".repeat(101);
        assert!(repo.send(order.id, Some(&too_long)).await.is_err());

        let reloaded = repo.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, OrderStatus::Pending);
        assert!(reloaded.sent_at.is_none());
        assert!(print_job::find_all(&db.pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_unknown_order() {
        let (_dir, db) = test_db().await;
        let repo = OrderRepository::new(db.pool.clone());
        assert!(matches!(
            repo.send(999, None).await,
            Err(RepoError::NotFound(_))
        ));
    }
}
