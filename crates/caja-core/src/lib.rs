//! # caja-core: Pure Business Logic for Cash-Register Automation
//!
//! Everything the scheduler decides or computes, as pure functions over
//! plain data. Storage and timers live in `caja-db` and `caja-scheduler`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 caja-daemon / admin surface                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │       caja-scheduler (loop, evaluator, lifecycle, reports)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐ │   │
//! │  │   │   types   │  │   money   │  │ schedule  │  │reconcile   │ │   │
//! │  │   │  Period   │  │   Money   │  │  windows  │  │  totals    │ │   │
//! │  │   │ Register  │  │ Currency  │  │ weekday   │  │  vendors   │ │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caja-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Periods, client config, registers, log entries, reports
//! - [`ledger`] - Read-side rows of the day's activity
//! - [`money`] - Integer money, basis-point rates, currencies, exchange rate
//! - [`schedule`] - Day-of-week remap, execution windows, upcoming projection
//! - [`reconciliation`] - Report aggregation and the profit policy
//! - [`validation`] - Period Store input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::schedule::{in_window, iso_day_of_week};
//!
//! // Sunday-zero numbering maps to ISO 7
//! assert_eq!(iso_day_of_week(0), 7);
//!
//! // Open at 09:00 with a 120 minute window accepts 10:59
//! assert!(in_window(10 * 60 + 59, 9 * 60, 120));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod reconciliation;
pub mod schedule;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, ExchangeRate, Money, Rate};
pub use schedule::{Decision, ExecutionWindows, OperationKind, SkipReason, UpcomingOperation};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Business-fixed zone used when a client has no config yet.
pub const DEFAULT_TIMEZONE: &str = "America/Argentina/Buenos_Aires";

pub const DEFAULT_NOTIFICATION_LEAD_MINUTES: u32 = 5;

/// Upper bound for the notification lead (one day).
pub const MAX_NOTIFICATION_LEAD_MINUTES: u32 = 1440;

/// Lookback for the "already executed" guard.
pub const RECENT_EXECUTION_WINDOW_MINUTES: u32 = 5;

/// Open operations stay eligible this long after the target minute.
///
/// Wide enough to survive a process restart.
pub const DEFAULT_OPEN_WINDOW_MINUTES: u32 = 120;

pub const DEFAULT_CLOSE_WINDOW_MINUTES: u32 = 60;

/// Automation ticks only run checks on minutes divisible by this.
pub const TICK_THROTTLE_MINUTES: u32 = 5;

/// Vendor profit estimate: 30% of sales.
pub const DEFAULT_PROFIT_MARGIN_BPS: u32 = 3000;
