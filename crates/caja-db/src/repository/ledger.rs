//! # Ledger Repository
//!
//! Read side of the day's activity for the reconciliation builder, plus the
//! inserts used by the posting path, the seed tool and tests.
//!
//! ## One Read
//! ```text
//! day_snapshot(client, start, end)
//!   BEGIN
//!     orders / payments / expenses / debt_payments / cash_movements
//!         WHERE client_id = ? AND created_at >= start AND created_at < end
//!     vendors / products / customers   (master lists, whole client)
//!   COMMIT
//! ```
//! A single transaction keeps the eight result sets consistent with each
//! other while the posting path keeps writing.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use caja_core::ledger::{
    CashMovement, Customer, DaySnapshot, DebtPayment, Expense, Order, Payment, Product, Vendor,
};

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Everything for `client_id` with `start <= created_at < end`.
    pub async fn day_snapshot(
        &self,
        client_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<DaySnapshot> {
        let mut tx = self.pool.begin().await?;

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, client_id, vendor_id, customer_id, product_id, total_cents, currency, status, created_at
            FROM orders
            WHERE client_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, id
            "#,
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *tx)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, client_id, order_id, amount_cents, currency, method, created_at
            FROM payments
            WHERE client_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, id
            "#,
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *tx)
        .await?;

        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, client_id, description, amount_cents, currency, created_at
            FROM expenses
            WHERE client_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, id
            "#,
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *tx)
        .await?;

        let debt_payments = sqlx::query_as::<_, DebtPayment>(
            r#"
            SELECT id, client_id, customer_id, amount_cents, currency, created_at
            FROM debt_payments
            WHERE client_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, id
            "#,
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *tx)
        .await?;

        let cash_movements = sqlx::query_as::<_, CashMovement>(
            r#"
            SELECT id, client_id, cash_register_id, kind, amount_cents, currency, description, created_at
            FROM cash_movements
            WHERE client_id = ?1 AND created_at >= ?2 AND created_at < ?3
            ORDER BY created_at, id
            "#,
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *tx)
        .await?;

        let vendors = sqlx::query_as::<_, Vendor>(
            "SELECT id, client_id, name, commission_rate_bps, is_active FROM vendors WHERE client_id = ?1 ORDER BY name",
        )
        .bind(client_id)
        .fetch_all(&mut *tx)
        .await?;

        let products = sqlx::query_as::<_, Product>(
            "SELECT id, client_id, name, is_active FROM products WHERE client_id = ?1 ORDER BY name",
        )
        .bind(client_id)
        .fetch_all(&mut *tx)
        .await?;

        let customers = sqlx::query_as::<_, Customer>(
            "SELECT id, client_id, name FROM customers WHERE client_id = ?1 ORDER BY name",
        )
        .bind(client_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            client_id = %client_id,
            orders = orders.len(),
            payments = payments.len(),
            expenses = expenses.len(),
            "Loaded day snapshot"
        );

        Ok(DaySnapshot {
            orders,
            payments,
            expenses,
            debt_payments,
            cash_movements,
            vendors,
            products,
            customers,
        })
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    pub async fn insert_vendor(&self, vendor: &Vendor) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO vendors (id, client_id, name, commission_rate_bps, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&vendor.id)
        .bind(&vendor.client_id)
        .bind(&vendor.name)
        .bind(vendor.commission_rate_bps)
        .bind(vendor.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        sqlx::query("INSERT INTO products (id, client_id, name, is_active) VALUES (?1, ?2, ?3, ?4)")
            .bind(&product.id)
            .bind(&product.client_id)
            .bind(&product.name)
            .bind(product.is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_customer(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query("INSERT INTO customers (id, client_id, name) VALUES (?1, ?2, ?3)")
            .bind(&customer.id)
            .bind(&customer.client_id)
            .bind(&customer.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_order(&self, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, client_id, vendor_id, customer_id, product_id, total_cents, currency, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(&order.client_id)
        .bind(&order.vendor_id)
        .bind(&order.customer_id)
        .bind(&order.product_id)
        .bind(order.total_cents)
        .bind(order.currency)
        .bind(order.status)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_payment(&self, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, client_id, order_id, amount_cents, currency, method, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.client_id)
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(payment.currency)
        .bind(&payment.method)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_expense(&self, expense: &Expense) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, client_id, description, amount_cents, currency, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.client_id)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.currency)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_debt_payment(&self, debt: &DebtPayment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO debt_payments (id, client_id, customer_id, amount_cents, currency, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&debt.id)
        .bind(&debt.client_id)
        .bind(&debt.customer_id)
        .bind(debt.amount_cents)
        .bind(debt.currency)
        .bind(debt.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_cash_movement(&self, movement: &CashMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cash_movements
                (id, client_id, cash_register_id, kind, amount_cents, currency, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.client_id)
        .bind(&movement.cash_register_id)
        .bind(movement.kind)
        .bind(movement.amount_cents)
        .bind(movement.currency)
        .bind(&movement.description)
        .bind(movement.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
