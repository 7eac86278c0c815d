//! # Operation Log Repository
//!
//! Append-only audit trail of automatic open/close attempts.
//!
//! ## Idempotency Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  has_recent_execution(client, auto_open, 5 min, now)                   │
//! │                                                                         │
//! │      now - 5min                          now                           │
//! │  ────────┬──────────────────────────────────┬────────►                 │
//! │          │  success entry here? → true      │                          │
//! │                                                                         │
//! │  Only `success` entries count. `failed` and `skipped` never block a    │
//! │  retry on the next tick.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table rejects UPDATE and DELETE with triggers.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use caja_core::{AutoOperationLogEntry, NewOperationLogEntry, OperationStatus, OperationType};

const LOG_COLUMNS: &str = "id, client_id, operation_type, cash_register_id, report_id, \
     executed_at, status, error_message, notes";

#[derive(Debug, Clone)]
pub struct OperationLogRepository {
    pool: SqlitePool,
}

impl OperationLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OperationLogRepository { pool }
    }

    /// Appends one entry. `executed_at` defaults to `now`.
    pub async fn log(
        &self,
        entry: NewOperationLogEntry,
        now: DateTime<Utc>,
    ) -> DbResult<AutoOperationLogEntry> {
        let record = AutoOperationLogEntry {
            id: Uuid::new_v4().to_string(),
            client_id: entry.client_id,
            operation_type: entry.operation_type,
            cash_register_id: entry.cash_register_id,
            report_id: entry.report_id,
            executed_at: entry.executed_at.unwrap_or(now),
            status: entry.status,
            error_message: entry.error_message,
            notes: entry.notes,
        };

        sqlx::query(
            r#"
            INSERT INTO auto_operation_logs
                (id, client_id, operation_type, cash_register_id, report_id,
                 executed_at, status, error_message, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.id)
        .bind(&record.client_id)
        .bind(record.operation_type)
        .bind(&record.cash_register_id)
        .bind(&record.report_id)
        .bind(record.executed_at)
        .bind(record.status)
        .bind(&record.error_message)
        .bind(&record.notes)
        .execute(&self.pool)
        .await?;

        debug!(
            client_id = %record.client_id,
            operation = %record.operation_type,
            status = %record.status,
            "Operation logged"
        );
        Ok(record)
    }

    /// True if a `success` entry of this type exists in `[now - window, now]`.
    pub async fn has_recent_execution(
        &self,
        client_id: &str,
        operation_type: OperationType,
        window_minutes: u32,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let since = now - Duration::minutes(window_minutes as i64);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM auto_operation_logs
            WHERE client_id = ?1
              AND operation_type = ?2
              AND status = ?3
              AND executed_at >= ?4
              AND executed_at <= ?5
            "#,
        )
        .bind(client_id)
        .bind(operation_type)
        .bind(OperationStatus::Success)
        .bind(since)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Most recent entries first, at most `limit`.
    pub async fn get_log(&self, client_id: &str, limit: u32) -> DbResult<Vec<AutoOperationLogEntry>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM auto_operation_logs
            WHERE client_id = ?1
            ORDER BY executed_at DESC, rowid DESC
            LIMIT ?2
            "#,
            LOG_COLUMNS
        );
        let entries = sqlx::query_as::<_, AutoOperationLogEntry>(&sql)
            .bind(client_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn count_for(
        &self,
        client_id: &str,
        operation_type: OperationType,
        status: OperationStatus,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM auto_operation_logs
            WHERE client_id = ?1 AND operation_type = ?2 AND status = ?3
            "#,
        )
        .bind(client_id)
        .bind(operation_type)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
