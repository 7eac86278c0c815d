//! # caja-db: Database Layer for Cash-Register Automation
//!
//! SQLite storage for schedule configuration, daily registers, the
//! operation log, reconciliation reports and the day ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Data Flow                                   │
//! │                                                                         │
//! │  Automation loop tick / admin call                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ ScheduleRepo   │    │              │ │   │
//! │  │   │ SqlitePool    │    │ OperationLog   │    │ 001_initial  │ │   │
//! │  │   │ Connection    │◄───│ CashRegister   │    │ 002_ledger   │ │   │
//! │  │   │ Management    │    │ Report, Ledger │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ~/.local/share/caja/caja.db (platform data dir)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/caja.db")).await?;
//!
//! let clients = db.clients().list_active().await?;
//! let register = db.cash_registers().get_for_date("client-1", today).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cash_register::{CashRegisterRepository, RunningTotals};
pub use repository::client::ClientRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::operation_log::OperationLogRepository;
pub use repository::report::ReportRepository;
pub use repository::schedule::ScheduleRepository;
