//! # caja-scheduler: Automatic Cash-Register Scheduling
//!
//! Opens and closes each client's daily cash register according to its
//! configured schedule, and produces the reconciliation report at close.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Scheduler Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CajaService (administrative facade)              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ AutomationLoop │  │   Evaluator    │  │  CashRegisterService   │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Timer task,    │─►│ Window match,  │  │ open / close / reopen  │    │
//! │  │ client cache,  │  │ local weekday, │  │ state machine, logs    │    │
//! │  │ two passes     │──┼────────────────┼─►│ every attempt          │    │
//! │  └───────▲────────┘  └────────────────┘  └───────────┬────────────┘    │
//! │          │                                           ▼                  │
//! │  ┌───────┴────────┐                      ┌────────────────────────┐    │
//! │  │    Watchdog    │                      │    ReportBuilder       │    │
//! │  │ revives a dead │                      │ snapshot → compute →   │    │
//! │  │ timer task     │                      │ store → export         │    │
//! │  └────────────────┘                      └────────────────────────┘    │
//! │                                                                         │
//! │  All state lives in SQLite (caja-db). Idempotency comes from storage:  │
//! │  the operation-log lookback, the register's open flag and UNIQUE keys. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Scheduler configuration (TOML + environment)
//! - [`error`] - Scheduler error types
//! - [`clock`] - Wall-clock seam
//! - [`evaluator`] - Eligibility evaluation
//! - [`lifecycle`] - Register open/close transitions
//! - [`report`] - Reconciliation report building and export
//! - [`automation`] - The recurring loop
//! - [`watchdog`] - Loop supervision
//! - [`emitter`] - Operation notifications
//! - [`service`] - Administrative facade
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_scheduler::{CajaService, SchedulerConfig};
//! use caja_db::{Database, DbConfig};
//!
//! let config = SchedulerConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//!
//! let service = CajaService::builder(config).with_database(db).build()?;
//! service.start_automation().await?;
//!
//! let upcoming = service.upcoming_operations("client-1", 5).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod automation;
pub mod clock;
pub mod config;
pub mod emitter;
pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod report;
pub mod service;
pub mod watchdog;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use automation::{AutomationLoop, SchedulerStatus, TickReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SchedulerConfig;
pub use emitter::{NoOpEmitter, SchedulerEventEmitter, TracingEmitter};
pub use error::{SchedulerError, SchedulerResult};
pub use evaluator::Evaluator;
pub use lifecycle::{CashRegisterService, TransitionOutcome, Trigger};
pub use report::{JsonFileExporter, NoOpExporter, ReportBuilder, ReportExporter};
pub use service::{CajaService, CajaServiceBuilder};
pub use watchdog::Watchdog;
