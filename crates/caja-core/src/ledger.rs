//! # Ledger Types
//!
//! Read-side view of the day's business activity. These rows are written by
//! the sales/expense posting path; the reconciliation builder only reads them.
//!
//! ```text
//!   vendors ──┐
//!   products ─┼──► orders ──► payments
//!   customers ┘        │
//!                      └──► (vendor performance)
//!   expenses, debt_payments, cash_movements ──► financial summary
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Currency, Money, Rate};

// =============================================================================
// Master Data
// =============================================================================

/// A salesperson earning commission on estimated profit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Vendor {
    pub id: String,
    pub client_id: String,
    pub name: String,

    /// Commission on estimated profit, in basis points (1000 = 10%).
    pub commission_rate_bps: u32,

    pub is_active: bool,
}

impl Vendor {
    #[inline]
    pub fn commission_rate(&self) -> Rate {
        Rate::from_bps(self.commission_rate_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub client_id: String,
    pub name: String,
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub client_id: String,
    pub vendor_id: Option<String>,
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
    pub total_cents: i64,
    pub currency: Currency,
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub client_id: String,
    pub order_id: Option<String>,
    pub amount_cents: i64,
    pub currency: Currency,
    pub method: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub client_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: Currency,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A customer paying down an outstanding balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtPayment {
    pub id: String,
    pub client_id: String,
    pub customer_id: Option<String>,
    pub amount_cents: i64,
    pub currency: Currency,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DebtPayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Income,
    Expense,
}

/// Manual cash in/out of the drawer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub client_id: String,
    pub cash_register_id: Option<String>,
    pub kind: MovementKind,
    pub amount_cents: i64,
    pub currency: Currency,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Day Snapshot
// =============================================================================

/// Everything the reconciliation needs for one client and one day, fetched
/// in a single read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub expenses: Vec<Expense>,
    pub debt_payments: Vec<DebtPayment>,
    pub cash_movements: Vec<CashMovement>,
    pub vendors: Vec<Vendor>,
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
}
