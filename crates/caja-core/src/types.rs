//! # Domain Types
//!
//! Core domain types for the cash-register automation engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐         ┌──────────────────────┐             │
//! │  │ ClientScheduleConfig │ 1 ─── * │   SchedulePeriod     │             │
//! │  │  ──────────────────  │         │  ──────────────────  │             │
//! │  │  timezone (IANA)     │         │  day_of_week 1..=7   │             │
//! │  │  auto_schedule_...   │         │  open / close h:m    │             │
//! │  │  notification lead   │         │  priority, flags     │             │
//! │  └──────────────────────┘         └──────────────────────┘             │
//! │                                                                         │
//! │  ┌──────────────────────┐         ┌──────────────────────┐             │
//! │  │    CashRegister      │ 1 ─── 1 │ DailyReconciliation  │             │
//! │  │  ──────────────────  │         │       Report         │             │
//! │  │  (client, date) UNQ  │         │  (client, date) UNQ  │             │
//! │  │  USD / ARS / USDT    │         │  totals + payload    │             │
//! │  │  is_open, is_active  │         └──────────────────────┘             │
//! │  └──────────┬───────────┘                                               │
//! │             │ referenced by                                             │
//! │  ┌──────────▼───────────┐                                               │
//! │  │ AutoOperationLogEntry│  append-only audit + idempotency source      │
//! │  └──────────────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All identifiers are UUID v4 strings. All amounts are integer minor units.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::{Currency, ExchangeRate, Money};
use crate::{DEFAULT_NOTIFICATION_LEAD_MINUTES, DEFAULT_TIMEZONE};

// =============================================================================
// Client
// =============================================================================

/// A tenant business. All other data is partitioned by `Client::id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Schedule Period
// =============================================================================

/// One configured opening/closing window for one day of the week.
///
/// `day_of_week` is ISO numbering: 1 = Monday .. 7 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SchedulePeriod {
    pub id: String,
    pub client_id: String,
    pub day_of_week: u8,
    pub label: String,
    pub open_hour: u8,
    pub open_minute: u8,
    pub close_hour: u8,
    pub close_minute: u8,
    pub auto_open_enabled: bool,
    pub auto_close_enabled: bool,

    /// Only active periods are considered by the evaluator.
    pub is_active: bool,

    /// Lower value wins when several periods apply to the same day.
    pub priority: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SchedulePeriod {
    /// Minute of day (0..1440) at which the register should open.
    #[inline]
    pub fn open_minute_of_day(&self) -> u32 {
        self.open_hour as u32 * 60 + self.open_minute as u32
    }

    /// Minute of day (0..1440) at which the register should close.
    #[inline]
    pub fn close_minute_of_day(&self) -> u32 {
        self.close_hour as u32 * 60 + self.close_minute as u32
    }
}

/// Input for creating schedule periods.
///
/// `days` is a comma-separated list such as `"1,2,3,4,5"`; one period row is
/// created per listed day, each with its own id.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSchedulePeriod {
    pub client_id: String,
    pub days: String,
    pub label: String,
    pub open_hour: u8,
    pub open_minute: u8,
    pub close_hour: u8,
    pub close_minute: u8,
    #[serde(default = "default_true")]
    pub auto_open_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_close_enabled: bool,
    #[serde(default)]
    pub priority: i64,
}

fn default_true() -> bool {
    true
}

/// Partial update for a schedule period. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SchedulePeriodUpdate {
    pub day_of_week: Option<u8>,
    pub label: Option<String>,
    pub open_hour: Option<u8>,
    pub open_minute: Option<u8>,
    pub close_hour: Option<u8>,
    pub close_minute: Option<u8>,
    pub auto_open_enabled: Option<bool>,
    pub auto_close_enabled: Option<bool>,
    pub is_active: Option<bool>,
    pub priority: Option<i64>,
}

impl SchedulePeriodUpdate {
    /// Merges this update over `current`, returning the resulting period.
    ///
    /// `updated_at` is left untouched; the repository stamps it.
    pub fn merge(&self, current: &SchedulePeriod) -> SchedulePeriod {
        SchedulePeriod {
            id: current.id.clone(),
            client_id: current.client_id.clone(),
            day_of_week: self.day_of_week.unwrap_or(current.day_of_week),
            label: self.label.clone().unwrap_or_else(|| current.label.clone()),
            open_hour: self.open_hour.unwrap_or(current.open_hour),
            open_minute: self.open_minute.unwrap_or(current.open_minute),
            close_hour: self.close_hour.unwrap_or(current.close_hour),
            close_minute: self.close_minute.unwrap_or(current.close_minute),
            auto_open_enabled: self.auto_open_enabled.unwrap_or(current.auto_open_enabled),
            auto_close_enabled: self.auto_close_enabled.unwrap_or(current.auto_close_enabled),
            is_active: self.is_active.unwrap_or(current.is_active),
            priority: self.priority.unwrap_or(current.priority),
            created_at: current.created_at,
            updated_at: current.updated_at,
        }
    }
}

// =============================================================================
// Client Schedule Config
// =============================================================================

/// Per-client automation settings. Created lazily with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ClientScheduleConfig {
    pub client_id: String,

    /// IANA zone identifier, e.g. `America/Argentina/Buenos_Aires`.
    pub timezone: String,

    pub auto_schedule_enabled: bool,
    pub notification_lead_minutes: u32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a client config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientScheduleConfigUpdate {
    pub timezone: Option<String>,
    pub auto_schedule_enabled: Option<bool>,
    pub notification_lead_minutes: Option<u32>,
}

/// Values used when a client's config row is created on first access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfigDefaults {
    pub timezone: String,
    pub auto_schedule_enabled: bool,
    pub notification_lead_minutes: u32,
}

impl Default for ClientConfigDefaults {
    fn default() -> Self {
        ClientConfigDefaults {
            timezone: DEFAULT_TIMEZONE.to_string(),
            auto_schedule_enabled: true,
            notification_lead_minutes: DEFAULT_NOTIFICATION_LEAD_MINUTES,
        }
    }
}

// =============================================================================
// Cash Register
// =============================================================================

/// The daily cash drawer for one client.
///
/// ## Invariants
/// - At most one row per `(client_id, register_date)`.
/// - At most one row with `is_open = true` per client.
/// - `register_date` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub client_id: String,

    /// Client-local calendar date this register covers.
    #[ts(as = "String")]
    pub register_date: NaiveDate,

    pub initial_usd_cents: i64,
    pub initial_ars_cents: i64,
    pub initial_usdt_cents: i64,
    pub current_usd_cents: i64,
    pub current_ars_cents: i64,
    pub current_usdt_cents: i64,

    pub total_sales_cents: i64,
    pub total_expenses_cents: i64,
    pub total_debts_cents: i64,

    /// ARS minor units per USD, snapshotted when the register is created.
    pub exchange_rate: i64,

    pub is_open: bool,
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub reopened_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashRegister {
    pub fn exchange_rate(&self) -> CoreResult<ExchangeRate> {
        ExchangeRate::from_ars_minor_per_usd(self.exchange_rate)
    }

    /// Opening balance across all three currencies, in USD cents.
    pub fn opening_balance_usd(&self, rate: ExchangeRate) -> Money {
        balance_usd(
            rate,
            self.initial_usd_cents,
            self.initial_ars_cents,
            self.initial_usdt_cents,
        )
    }

    /// Running balance across all three currencies, in USD cents.
    pub fn closing_balance_usd(&self, rate: ExchangeRate) -> Money {
        balance_usd(
            rate,
            self.current_usd_cents,
            self.current_ars_cents,
            self.current_usdt_cents,
        )
    }
}

fn balance_usd(rate: ExchangeRate, usd: i64, ars: i64, usdt: i64) -> Money {
    rate.to_usd(Money::from_cents(usd), Currency::Usd)
        + rate.to_usd(Money::from_cents(ars), Currency::Ars)
        + rate.to_usd(Money::from_cents(usdt), Currency::Usdt)
}

// =============================================================================
// Operation Log
// =============================================================================

/// Type of automatic operation recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    AutoOpen,
    AutoClose,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::AutoOpen => "auto_open",
            OperationType::AutoClose => "auto_close",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an automatic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Failed,
    Skipped,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Failed => "failed",
            OperationStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one automatic (or manual) open/close attempt.
///
/// Never updated or deleted. `success` entries are the source of truth for
/// the "already executed recently" guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AutoOperationLogEntry {
    pub id: String,
    pub client_id: String,
    pub operation_type: OperationType,
    pub cash_register_id: Option<String>,
    pub report_id: Option<String>,
    #[ts(as = "String")]
    pub executed_at: DateTime<Utc>,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub notes: Option<String>,
}

/// Input for appending a log entry.
///
/// ## Example
/// ```rust
/// use caja_core::{NewOperationLogEntry, OperationType};
///
/// let entry = NewOperationLogEntry::success("client-1", OperationType::AutoOpen)
///     .with_register("reg-1")
///     .with_note("already open");
/// assert_eq!(entry.notes.as_deref(), Some("already open"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperationLogEntry {
    pub client_id: String,
    pub operation_type: OperationType,
    pub cash_register_id: Option<String>,
    pub report_id: Option<String>,

    /// Falls back to the caller's clock instant when `None`.
    pub executed_at: Option<DateTime<Utc>>,

    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub notes: Option<String>,
}

impl NewOperationLogEntry {
    fn new(client_id: impl Into<String>, operation_type: OperationType, status: OperationStatus) -> Self {
        NewOperationLogEntry {
            client_id: client_id.into(),
            operation_type,
            cash_register_id: None,
            report_id: None,
            executed_at: None,
            status,
            error_message: None,
            notes: None,
        }
    }

    pub fn success(client_id: impl Into<String>, operation_type: OperationType) -> Self {
        Self::new(client_id, operation_type, OperationStatus::Success)
    }

    pub fn skipped(client_id: impl Into<String>, operation_type: OperationType) -> Self {
        Self::new(client_id, operation_type, OperationStatus::Skipped)
    }

    pub fn failed(
        client_id: impl Into<String>,
        operation_type: OperationType,
        error_message: impl Into<String>,
    ) -> Self {
        let mut entry = Self::new(client_id, operation_type, OperationStatus::Failed);
        entry.error_message = Some(error_message.into());
        entry
    }

    pub fn with_register(mut self, cash_register_id: impl Into<String>) -> Self {
        self.cash_register_id = Some(cash_register_id.into());
        self
    }

    pub fn with_report(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }

    /// Appends a note, joining with `"; "` when one is already present.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{}; {}", existing, note),
            None => note,
        });
        self
    }

    pub fn executed_at(mut self, at: DateTime<Utc>) -> Self {
        self.executed_at = Some(at);
        self
    }
}

// =============================================================================
// Daily Reconciliation Report
// =============================================================================

/// The immutable financial summary written when a register closes.
///
/// Money columns are USD cents. `payload` holds the full serialized
/// [`ReconciliationPayload`](crate::reconciliation::ReconciliationPayload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailyReconciliationReport {
    pub id: String,
    pub client_id: String,
    pub cash_register_id: Option<String>,
    #[ts(as = "String")]
    pub report_date: NaiveDate,
    pub total_income_cents: i64,
    pub total_expenses_cents: i64,
    pub total_debt_payments_cents: i64,
    pub net_profit_cents: i64,
    pub total_commissions_cents: i64,
    pub exchange_rate: i64,
    pub opening_balance_cents: i64,
    pub closing_balance_cents: i64,
    pub movement_count: i64,
    pub payload: String,
    pub is_auto_generated: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DailyReconciliationReport {
    #[inline]
    pub fn net_profit(&self) -> Money {
        Money::from_cents(self.net_profit_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> SchedulePeriod {
        let now = Utc::now();
        SchedulePeriod {
            id: "p1".to_string(),
            client_id: "c1".to_string(),
            day_of_week: 1,
            label: "Morning".to_string(),
            open_hour: 9,
            open_minute: 30,
            close_hour: 18,
            close_minute: 0,
            auto_open_enabled: true,
            auto_close_enabled: true,
            is_active: true,
            priority: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_minute_of_day() {
        let p = period();
        assert_eq!(p.open_minute_of_day(), 570);
        assert_eq!(p.close_minute_of_day(), 1080);
    }

    #[test]
    fn test_update_merge_keeps_unset_fields() {
        let p = period();
        let update = SchedulePeriodUpdate {
            close_hour: Some(20),
            is_active: Some(false),
            ..Default::default()
        };

        let merged = update.merge(&p);
        assert_eq!(merged.close_hour, 20);
        assert!(!merged.is_active);
        assert_eq!(merged.open_hour, 9);
        assert_eq!(merged.label, "Morning");
        assert_eq!(merged.id, p.id);
    }

    #[test]
    fn test_log_entry_builders() {
        let entry = NewOperationLogEntry::failed("c1", OperationType::AutoClose, "disk I/O error")
            .with_register("r1")
            .with_note("manual")
            .with_note("retry");

        assert_eq!(entry.status, OperationStatus::Failed);
        assert_eq!(entry.error_message.as_deref(), Some("disk I/O error"));
        assert_eq!(entry.cash_register_id.as_deref(), Some("r1"));
        assert_eq!(entry.notes.as_deref(), Some("manual; retry"));
    }

    #[test]
    fn test_register_balances_in_usd() {
        let now = Utc::now();
        let register = CashRegister {
            id: "r1".to_string(),
            client_id: "c1".to_string(),
            register_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            initial_usd_cents: 10_000,
            initial_ars_cents: 1_000_000,
            initial_usdt_cents: 500,
            current_usd_cents: 20_000,
            current_ars_cents: 0,
            current_usdt_cents: 0,
            total_sales_cents: 0,
            total_expenses_cents: 0,
            total_debts_cents: 0,
            exchange_rate: 100_000,
            is_open: true,
            is_active: true,
            created_at: now,
            closed_at: None,
            reopened_at: None,
            updated_at: now,
        };

        let rate = register.exchange_rate().unwrap();
        // $100 + (10000.00 ARS / 1000) + $5 = $115
        assert_eq!(register.opening_balance_usd(rate).cents(), 11_500);
        assert_eq!(register.closing_balance_usd(rate).cents(), 20_000);
    }

    #[test]
    fn test_operation_type_serialization() {
        assert_eq!(
            serde_json::to_string(&OperationType::AutoOpen).unwrap(),
            "\"auto_open\""
        );
        assert_eq!(OperationStatus::Skipped.to_string(), "skipped");
    }
}
