//! # Reconciliation
//!
//! Pure aggregation of one client's day into the report payload.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DaySnapshot ──┐                                                        │
//! │  CashRegister ─┼──► compute() ──► ReconciliationPayload                 │
//! │  ExchangeRate ─┤                   ├── metadata                         │
//! │  ProfitEstimator                   ├── summary (USD cents)              │
//! │                                    ├── itemized transactions            │
//! │                                    ├── order_lines (named, USD)         │
//! │                                    ├── vendor_performance               │
//! │                                    └── counts                           │
//! │                                                                         │
//! │  total_income   = Σ payments        (USD)                               │
//! │  total_expenses = Σ expenses        (USD)                               │
//! │  net_profit     = income − expenses                                     │
//! │  debt payments are reported separately and do not enter net profit     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Vendor Profit
//! There is no cost basis in the ledger, so vendor profit is estimated by a
//! [`ProfitEstimator`]. [`FixedMarginPolicy`] (30% of sales) is the default.
//! Only vendors with at least one order that day are reported.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::ledger::{
    CashMovement, DaySnapshot, DebtPayment, Expense, Order, OrderStatus, Payment, Vendor,
};
use crate::money::{ExchangeRate, Money, Rate};
use crate::types::CashRegister;
use crate::DEFAULT_PROFIT_MARGIN_BPS;

// =============================================================================
// Profit Policy
// =============================================================================

/// Estimates a vendor's profit from their sales for the day.
pub trait ProfitEstimator: Send + Sync {
    fn estimate_profit(&self, vendor: &Vendor, sales: Money) -> Money;

    /// Recorded in the report metadata.
    fn name(&self) -> &str;
}

/// Profit = a fixed share of sales, regardless of product cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMarginPolicy {
    pub margin: Rate,
}

impl FixedMarginPolicy {
    pub fn new(margin: Rate) -> Self {
        FixedMarginPolicy { margin }
    }
}

impl Default for FixedMarginPolicy {
    fn default() -> Self {
        FixedMarginPolicy {
            margin: Rate::from_bps(DEFAULT_PROFIT_MARGIN_BPS),
        }
    }
}

impl ProfitEstimator for FixedMarginPolicy {
    fn estimate_profit(&self, _vendor: &Vendor, sales: Money) -> Money {
        sales.apply_rate(self.margin)
    }

    fn name(&self) -> &str {
        "fixed_margin"
    }
}

// =============================================================================
// Payload Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportMetadata {
    pub client_id: String,
    #[ts(as = "String")]
    pub report_date: NaiveDate,
    pub cash_register_id: Option<String>,
    pub timezone: String,
    #[ts(as = "String")]
    pub period_start: DateTime<Utc>,
    #[ts(as = "String")]
    pub period_end: DateTime<Utc>,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
    pub is_auto_generated: bool,
    pub profit_policy: String,
}

/// Money fields are USD cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinancialSummary {
    pub total_income: Money,
    pub total_expenses: Money,
    pub total_debt_payments: Money,
    pub net_profit: Money,
    pub total_commissions: Money,
    pub total_sales: Money,
    pub exchange_rate: i64,
    pub opening_balance: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VendorPerformance {
    pub vendor_id: String,
    pub vendor_name: String,
    pub order_count: u32,
    pub completed_orders: u32,
    pub total_sales: Money,
    pub estimated_profit: Money,
    pub commission_rate_bps: u32,
    pub commission: Money,

    /// Completed orders / all orders, percent.
    pub completion_rate: f64,

    /// Payments against this vendor's orders / sales, percent.
    pub payment_collection_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportCounts {
    pub orders: u32,
    pub payments: u32,
    pub expenses: u32,
    pub debt_payments: u32,
    pub cash_movements: u32,
    pub vendors_with_orders: u32,

    /// Distinct products on non-cancelled orders.
    pub products_sold: u32,

    /// Distinct customers on non-cancelled orders or debt payments.
    pub customers_served: u32,
}

/// An order with its references resolved to display names.
///
/// Names are `None` when the order has no reference or the referenced row
/// is not in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub order_id: String,
    pub status: OrderStatus,
    pub total: Money,
    pub product_name: Option<String>,
    pub customer_name: Option<String>,
    pub vendor_name: Option<String>,
}

/// The complete structured report, serialized once into the report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPayload {
    pub metadata: ReportMetadata,
    pub summary: FinancialSummary,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub expenses: Vec<Expense>,
    pub debt_payments: Vec<DebtPayment>,
    pub cash_movements: Vec<CashMovement>,
    pub vendor_performance: Vec<VendorPerformance>,
    pub order_lines: Vec<OrderLine>,
    pub counts: ReportCounts,
}

impl ReconciliationPayload {
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn movement_count(&self) -> i64 {
        self.cash_movements.len() as i64
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Aggregates the snapshot into a payload.
///
/// `register` supplies opening/closing balances; without one both are zero.
pub fn compute(
    snapshot: &DaySnapshot,
    register: Option<&CashRegister>,
    rate: ExchangeRate,
    policy: &dyn ProfitEstimator,
    metadata: ReportMetadata,
) -> ReconciliationPayload {
    let total_income: Money = snapshot
        .payments
        .iter()
        .map(|p| rate.to_usd(p.amount(), p.currency))
        .sum();
    let total_expenses: Money = snapshot
        .expenses
        .iter()
        .map(|e| rate.to_usd(e.amount(), e.currency))
        .sum();
    let total_debt_payments: Money = snapshot
        .debt_payments
        .iter()
        .map(|d| rate.to_usd(d.amount(), d.currency))
        .sum();
    let total_sales: Money = snapshot
        .orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .map(|o| rate.to_usd(o.total(), o.currency))
        .sum();

    let vendor_performance = vendor_performance(snapshot, rate, policy);
    let total_commissions: Money = vendor_performance.iter().map(|v| v.commission).sum();

    let (opening_balance, closing_balance) = match register {
        Some(r) => (r.opening_balance_usd(rate), r.closing_balance_usd(rate)),
        None => (Money::zero(), Money::zero()),
    };

    let counts = ReportCounts {
        orders: snapshot.orders.len() as u32,
        payments: snapshot.payments.len() as u32,
        expenses: snapshot.expenses.len() as u32,
        debt_payments: snapshot.debt_payments.len() as u32,
        cash_movements: snapshot.cash_movements.len() as u32,
        vendors_with_orders: vendor_performance.len() as u32,
        products_sold: products_sold(snapshot),
        customers_served: customers_served(snapshot),
    };

    ReconciliationPayload {
        metadata,
        summary: FinancialSummary {
            total_income,
            total_expenses,
            total_debt_payments,
            net_profit: total_income - total_expenses,
            total_commissions,
            total_sales,
            exchange_rate: rate.ars_minor_per_usd(),
            opening_balance,
            closing_balance,
        },
        orders: snapshot.orders.clone(),
        payments: snapshot.payments.clone(),
        expenses: snapshot.expenses.clone(),
        debt_payments: snapshot.debt_payments.clone(),
        cash_movements: snapshot.cash_movements.clone(),
        vendor_performance,
        order_lines: order_lines(snapshot, rate),
        counts,
    }
}

fn order_lines(snapshot: &DaySnapshot, rate: ExchangeRate) -> Vec<OrderLine> {
    let products: HashMap<&str, &str> = snapshot
        .products
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();
    let customers: HashMap<&str, &str> = snapshot
        .customers
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();
    let vendors: HashMap<&str, &str> = snapshot
        .vendors
        .iter()
        .map(|v| (v.id.as_str(), v.name.as_str()))
        .collect();

    snapshot
        .orders
        .iter()
        .map(|o| OrderLine {
            order_id: o.id.clone(),
            status: o.status,
            total: rate.to_usd(o.total(), o.currency),
            product_name: resolve(&products, o.product_id.as_deref()),
            customer_name: resolve(&customers, o.customer_id.as_deref()),
            vendor_name: resolve(&vendors, o.vendor_id.as_deref()),
        })
        .collect()
}

fn resolve(names: &HashMap<&str, &str>, id: Option<&str>) -> Option<String> {
    id.and_then(|id| names.get(id)).map(|name| name.to_string())
}

fn products_sold(snapshot: &DaySnapshot) -> u32 {
    snapshot
        .orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .filter_map(|o| o.product_id.as_deref())
        .collect::<HashSet<_>>()
        .len() as u32
}

fn customers_served(snapshot: &DaySnapshot) -> u32 {
    let from_orders = snapshot
        .orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .filter_map(|o| o.customer_id.as_deref());
    let from_debts = snapshot
        .debt_payments
        .iter()
        .filter_map(|d| d.customer_id.as_deref());
    from_orders.chain(from_debts).collect::<HashSet<_>>().len() as u32
}

/// Per-vendor statistics, highest sales first. Vendors without orders are omitted.
fn vendor_performance(
    snapshot: &DaySnapshot,
    rate: ExchangeRate,
    policy: &dyn ProfitEstimator,
) -> Vec<VendorPerformance> {
    // order id -> USD collected
    let mut collected: HashMap<&str, Money> = HashMap::new();
    for payment in &snapshot.payments {
        if let Some(order_id) = payment.order_id.as_deref() {
            *collected.entry(order_id).or_default() += rate.to_usd(payment.amount(), payment.currency);
        }
    }

    let mut stats: Vec<VendorPerformance> = snapshot
        .vendors
        .iter()
        .filter_map(|vendor| {
            let orders: Vec<&Order> = snapshot
                .orders
                .iter()
                .filter(|o| o.vendor_id.as_deref() == Some(vendor.id.as_str()))
                .collect();
            if orders.is_empty() {
                return None;
            }

            let completed = orders
                .iter()
                .filter(|o| o.status == OrderStatus::Completed)
                .count() as u32;
            let total_sales: Money = orders
                .iter()
                .filter(|o| o.status != OrderStatus::Cancelled)
                .map(|o| rate.to_usd(o.total(), o.currency))
                .sum();
            let paid: Money = orders
                .iter()
                .filter_map(|o| collected.get(o.id.as_str()).copied())
                .sum();

            let estimated_profit = policy.estimate_profit(vendor, total_sales);
            let commission = estimated_profit.apply_rate(vendor.commission_rate());

            Some(VendorPerformance {
                vendor_id: vendor.id.clone(),
                vendor_name: vendor.name.clone(),
                order_count: orders.len() as u32,
                completed_orders: completed,
                total_sales,
                estimated_profit,
                commission_rate_bps: vendor.commission_rate_bps,
                commission,
                completion_rate: completed as f64 / orders.len() as f64 * 100.0,
                payment_collection_rate: total_sales.percentage_of(paid),
            })
        })
        .collect();

    stats.sort_by(|a, b| {
        b.total_sales
            .cmp(&a.total_sales)
            .then_with(|| a.vendor_name.cmp(&b.vendor_name))
    });
    stats
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Customer, Product};
    use crate::money::Currency;

    fn at() -> DateTime<Utc> {
        "2024-06-03T15:00:00Z".parse().unwrap()
    }

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            client_id: "c1".to_string(),
            report_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            cash_register_id: None,
            timezone: "UTC".to_string(),
            period_start: "2024-06-03T00:00:00Z".parse().unwrap(),
            period_end: "2024-06-04T00:00:00Z".parse().unwrap(),
            generated_at: at(),
            is_auto_generated: true,
            profit_policy: "fixed_margin".to_string(),
        }
    }

    fn payment(id: &str, order: Option<&str>, cents: i64, currency: Currency) -> Payment {
        Payment {
            id: id.to_string(),
            client_id: "c1".to_string(),
            order_id: order.map(str::to_string),
            amount_cents: cents,
            currency,
            method: "cash".to_string(),
            created_at: at(),
        }
    }

    fn order(id: &str, vendor: &str, cents: i64, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            client_id: "c1".to_string(),
            vendor_id: Some(vendor.to_string()),
            customer_id: None,
            product_id: None,
            total_cents: cents,
            currency: Currency::Usd,
            status,
            created_at: at(),
        }
    }

    fn vendor(id: &str, name: &str, bps: u32) -> Vendor {
        Vendor {
            id: id.to_string(),
            client_id: "c1".to_string(),
            name: name.to_string(),
            commission_rate_bps: bps,
            is_active: true,
        }
    }

    fn rate() -> ExchangeRate {
        ExchangeRate::from_ars_minor_per_usd(100_000).unwrap()
    }

    #[test]
    fn test_totals_and_net_profit() {
        let snapshot = DaySnapshot {
            payments: vec![
                payment("p1", None, 10_000, Currency::Usd),
                // 50 USD paid as 50000.00 ARS
                payment("p2", None, 5_000_000, Currency::Ars),
            ],
            expenses: vec![Expense {
                id: "e1".to_string(),
                client_id: "c1".to_string(),
                description: "Rent".to_string(),
                amount_cents: 3_000,
                currency: Currency::Usdt,
                created_at: at(),
            }],
            debt_payments: vec![DebtPayment {
                id: "d1".to_string(),
                client_id: "c1".to_string(),
                customer_id: None,
                amount_cents: 2_000,
                currency: Currency::Usd,
                created_at: at(),
            }],
            ..Default::default()
        };

        let payload = compute(&snapshot, None, rate(), &FixedMarginPolicy::default(), metadata());

        assert_eq!(payload.summary.total_income.cents(), 15_000);
        assert_eq!(payload.summary.total_expenses.cents(), 3_000);
        assert_eq!(payload.summary.net_profit.cents(), 12_000);
        assert_eq!(payload.summary.total_debt_payments.cents(), 2_000);
        assert_eq!(payload.counts.payments, 2);
    }

    #[test]
    fn test_vendor_without_orders_is_excluded() {
        let snapshot = DaySnapshot {
            orders: vec![order("o1", "v1", 10_000, OrderStatus::Completed)],
            vendors: vec![vendor("v1", "Ana", 1000), vendor("v2", "Idle", 1000)],
            ..Default::default()
        };

        let payload = compute(&snapshot, None, rate(), &FixedMarginPolicy::default(), metadata());

        assert_eq!(payload.vendor_performance.len(), 1);
        assert_eq!(payload.vendor_performance[0].vendor_id, "v1");
        assert!(payload.vendor_performance.iter().all(|v| v.vendor_id != "v2"));
    }

    #[test]
    fn test_vendor_commission_and_rates() {
        let snapshot = DaySnapshot {
            orders: vec![
                order("o1", "v1", 10_000, OrderStatus::Completed),
                order("o2", "v1", 5_000, OrderStatus::Pending),
                order("o3", "v1", 7_000, OrderStatus::Cancelled),
            ],
            payments: vec![payment("p1", Some("o1"), 10_000, Currency::Usd)],
            vendors: vec![vendor("v1", "Ana", 1000)],
            ..Default::default()
        };

        let payload = compute(&snapshot, None, rate(), &FixedMarginPolicy::default(), metadata());
        let stats = &payload.vendor_performance[0];

        // sales exclude the cancelled order: 100 + 50
        assert_eq!(stats.total_sales.cents(), 15_000);
        // 30% of 150 = 45, commission 10% of 45 = 4.50
        assert_eq!(stats.estimated_profit.cents(), 4_500);
        assert_eq!(stats.commission.cents(), 450);
        assert_eq!(stats.order_count, 3);
        assert_eq!(stats.completed_orders, 1);
        assert!((stats.completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!((stats.payment_collection_rate - 10_000.0 / 15_000.0 * 100.0).abs() < 1e-9);
        assert_eq!(payload.summary.total_commissions.cents(), 450);
    }

    #[test]
    fn test_profit_policy_is_replaceable() {
        struct HalfMargin;
        impl ProfitEstimator for HalfMargin {
            fn estimate_profit(&self, _vendor: &Vendor, sales: Money) -> Money {
                sales.apply_rate(Rate::from_percent(50))
            }
            fn name(&self) -> &str {
                "half"
            }
        }

        let snapshot = DaySnapshot {
            orders: vec![order("o1", "v1", 10_000, OrderStatus::Completed)],
            vendors: vec![vendor("v1", "Ana", 1000)],
            ..Default::default()
        };

        let payload = compute(&snapshot, None, rate(), &HalfMargin, metadata());
        assert_eq!(payload.vendor_performance[0].estimated_profit.cents(), 5_000);
        assert_eq!(payload.vendor_performance[0].commission.cents(), 500);
    }

    #[test]
    fn test_order_lines_resolve_names() {
        let mut sold = order("o1", "v1", 10_000, OrderStatus::Completed);
        sold.product_id = Some("prod1".to_string());
        sold.customer_id = Some("cust1".to_string());
        let mut unknown = order("o2", "v9", 5_000, OrderStatus::Pending);
        unknown.product_id = Some("gone".to_string());
        let mut cancelled = order("o3", "v1", 7_000, OrderStatus::Cancelled);
        cancelled.product_id = Some("prod2".to_string());
        cancelled.customer_id = Some("cust2".to_string());

        let snapshot = DaySnapshot {
            orders: vec![sold, unknown, cancelled],
            vendors: vec![vendor("v1", "Ana", 1000)],
            products: vec![
                Product {
                    id: "prod1".to_string(),
                    client_id: "c1".to_string(),
                    name: "Coffee".to_string(),
                    is_active: true,
                },
                Product {
                    id: "prod2".to_string(),
                    client_id: "c1".to_string(),
                    name: "Tea".to_string(),
                    is_active: true,
                },
            ],
            customers: vec![Customer {
                id: "cust1".to_string(),
                client_id: "c1".to_string(),
                name: "Bruno".to_string(),
            }],
            debt_payments: vec![DebtPayment {
                id: "d1".to_string(),
                client_id: "c1".to_string(),
                customer_id: Some("cust3".to_string()),
                amount_cents: 1_000,
                currency: Currency::Usd,
                created_at: at(),
            }],
            ..Default::default()
        };

        let payload = compute(&snapshot, None, rate(), &FixedMarginPolicy::default(), metadata());

        assert_eq!(payload.order_lines.len(), 3);
        let first = &payload.order_lines[0];
        assert_eq!(first.product_name.as_deref(), Some("Coffee"));
        assert_eq!(first.customer_name.as_deref(), Some("Bruno"));
        assert_eq!(first.vendor_name.as_deref(), Some("Ana"));
        assert_eq!(first.total.cents(), 10_000);

        let second = &payload.order_lines[1];
        assert_eq!(second.product_name, None);
        assert_eq!(second.customer_name, None);
        assert_eq!(second.vendor_name, None);

        // cancelled orders are listed but not counted
        assert_eq!(payload.order_lines[2].product_name.as_deref(), Some("Tea"));
        assert_eq!(payload.counts.products_sold, 2);
        assert_eq!(payload.counts.customers_served, 2);
    }

    #[test]
    fn test_payload_serializes() {
        let payload = compute(
            &DaySnapshot::default(),
            None,
            rate(),
            &FixedMarginPolicy::default(),
            metadata(),
        );
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"net_profit\":0"));

        let back: ReconciliationPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.client_id, "c1");
    }
}
