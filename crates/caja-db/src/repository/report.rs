//! # Report Repository
//!
//! Daily reconciliation reports. Insert-only; one per (client, date).

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use caja_core::DailyReconciliationReport;

const REPORT_COLUMNS: &str = "id, client_id, cash_register_id, report_date, total_income_cents, \
     total_expenses_cents, total_debt_payments_cents, net_profit_cents, total_commissions_cents, \
     exchange_rate, opening_balance_cents, closing_balance_cents, movement_count, payload, \
     is_auto_generated, created_at";

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Persists a report.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - a report already exists for (client, date)
    pub async fn insert(&self, report: &DailyReconciliationReport) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_reports
                (id, client_id, cash_register_id, report_date, total_income_cents,
                 total_expenses_cents, total_debt_payments_cents, net_profit_cents,
                 total_commissions_cents, exchange_rate, opening_balance_cents,
                 closing_balance_cents, movement_count, payload, is_auto_generated, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&report.id)
        .bind(&report.client_id)
        .bind(&report.cash_register_id)
        .bind(report.report_date)
        .bind(report.total_income_cents)
        .bind(report.total_expenses_cents)
        .bind(report.total_debt_payments_cents)
        .bind(report.net_profit_cents)
        .bind(report.total_commissions_cents)
        .bind(report.exchange_rate)
        .bind(report.opening_balance_cents)
        .bind(report.closing_balance_cents)
        .bind(report.movement_count)
        .bind(&report.payload)
        .bind(report.is_auto_generated)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            client_id = %report.client_id,
            report_id = %report.id,
            date = %report.report_date,
            net_profit_cents = report.net_profit_cents,
            "Reconciliation report stored"
        );
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<DailyReconciliationReport>> {
        let sql = format!("SELECT {} FROM daily_reports WHERE id = ?1", REPORT_COLUMNS);
        let report = sqlx::query_as::<_, DailyReconciliationReport>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    pub async fn get_by_date(
        &self,
        client_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<DailyReconciliationReport>> {
        let sql = format!(
            "SELECT {} FROM daily_reports WHERE client_id = ?1 AND report_date = ?2",
            REPORT_COLUMNS
        );
        let report = sqlx::query_as::<_, DailyReconciliationReport>(&sql)
            .bind(client_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    /// Newest first.
    pub async fn list_for_client(
        &self,
        client_id: &str,
        limit: u32,
    ) -> DbResult<Vec<DailyReconciliationReport>> {
        let sql = format!(
            "SELECT {} FROM daily_reports WHERE client_id = ?1 ORDER BY report_date DESC LIMIT ?2",
            REPORT_COLUMNS
        );
        let reports = sqlx::query_as::<_, DailyReconciliationReport>(&sql)
            .bind(client_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(reports)
    }

    pub async fn count_for_client(&self, client_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_reports WHERE client_id = ?1")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
