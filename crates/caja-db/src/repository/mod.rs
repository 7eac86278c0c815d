//! # Repository Module
//!
//! Database repository implementations for the caja schema.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Evaluator / lifecycle service                                         │
//! │       │                                                                 │
//! │       │  db.schedules().get_periods_for_day("client-1", 7)             │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ScheduleRepository                                                    │
//! │  ├── get_client_config(&self, client, defaults)                        │
//! │  ├── get_periods_for_day(&self, client, day)                           │
//! │  ├── create_schedule_periods(&self, input)                             │
//! │  └── update_schedule_period(&self, id, partial)                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • Easy to test (mock the repository)                                  │
//! │  • SQL is isolated in one place                                        │
//! │  • Can swap database implementations                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ClientRepository`](client::ClientRepository) - Active client enumeration
//! - [`ScheduleRepository`](schedule::ScheduleRepository) - Periods and client config
//! - [`OperationLogRepository`](operation_log::OperationLogRepository) - Append-only audit log
//! - [`CashRegisterRepository`](cash_register::CashRegisterRepository) - Daily registers
//! - [`ReportRepository`](report::ReportRepository) - Reconciliation reports
//! - [`LedgerRepository`](ledger::LedgerRepository) - Day snapshot reads

pub mod cash_register;
pub mod client;
pub mod ledger;
pub mod operation_log;
pub mod report;
pub mod schedule;
