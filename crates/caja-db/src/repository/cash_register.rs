//! # Cash Register Repository
//!
//! Storage for the daily register row and its open/closed flag.
//!
//! ## Race Safety
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two pollers, same client, same date                                   │
//! │                                                                         │
//! │  Poller A: INSERT (client, date) ──► ok                                │
//! │  Poller B: INSERT (client, date) ──► UNIQUE violation                  │
//! │                                      └─► caller re-reads, "already open"│
//! │                                                                         │
//! │  Poller A: UPDATE ... SET is_open = 0 WHERE id = ? AND is_open = 1     │
//! │            ──► 1 row  (this caller closed it)                           │
//! │  Poller B: same UPDATE                                                  │
//! │            ──► 0 rows (someone else did; "already closed")              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is a single conditional statement, so a lost update
//! cannot flip a register twice.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use caja_core::{CashRegister, ExchangeRate};

const REGISTER_COLUMNS: &str = "id, client_id, register_date, initial_usd_cents, \
     initial_ars_cents, initial_usdt_cents, current_usd_cents, current_ars_cents, \
     current_usdt_cents, total_sales_cents, total_expenses_cents, total_debts_cents, \
     exchange_rate, is_open, is_active, created_at, closed_at, reopened_at, updated_at";

#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<Option<CashRegister>> {
        let sql = format!("SELECT {} FROM cash_registers WHERE id = ?1", REGISTER_COLUMNS);
        let register = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(register)
    }

    /// The register for one client-local date, if any.
    pub async fn get_for_date(
        &self,
        client_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<CashRegister>> {
        let sql = format!(
            "SELECT {} FROM cash_registers WHERE client_id = ?1 AND register_date = ?2",
            REGISTER_COLUMNS
        );
        let register = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(client_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(register)
    }

    /// Registers still open on any date other than `date`, oldest first.
    ///
    /// Later dates are included: a timezone change can move the client's
    /// local date backwards past an open register.
    pub async fn find_open_other_dates(
        &self,
        client_id: &str,
        date: NaiveDate,
    ) -> DbResult<Vec<CashRegister>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM cash_registers
            WHERE client_id = ?1 AND is_open = 1 AND register_date <> ?2
            ORDER BY register_date
            "#,
            REGISTER_COLUMNS
        );
        let registers = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(client_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(registers)
    }

    /// The client's most recent register by date.
    pub async fn latest(&self, client_id: &str) -> DbResult<Option<CashRegister>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM cash_registers
            WHERE client_id = ?1
            ORDER BY register_date DESC
            LIMIT 1
            "#,
            REGISTER_COLUMNS
        );
        let register = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(register)
    }

    pub async fn count_open(&self, client_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cash_registers WHERE client_id = ?1 AND is_open = 1")
                .bind(client_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn count_for_date(&self, client_id: &str, date: NaiveDate) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cash_registers WHERE client_id = ?1 AND register_date = ?2",
        )
        .bind(client_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Inserts an open register with zero balances in every currency.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - a register already exists for (client, date)
    pub async fn create_open(
        &self,
        client_id: &str,
        date: NaiveDate,
        exchange_rate: ExchangeRate,
        now: DateTime<Utc>,
    ) -> DbResult<CashRegister> {
        let register = CashRegister {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            register_date: date,
            initial_usd_cents: 0,
            initial_ars_cents: 0,
            initial_usdt_cents: 0,
            current_usd_cents: 0,
            current_ars_cents: 0,
            current_usdt_cents: 0,
            total_sales_cents: 0,
            total_expenses_cents: 0,
            total_debts_cents: 0,
            exchange_rate: exchange_rate.ars_minor_per_usd(),
            is_open: true,
            is_active: true,
            created_at: now,
            closed_at: None,
            reopened_at: None,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_registers
                (id, client_id, register_date, exchange_rate, is_open, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, 1, ?5, ?5)
            "#,
        )
        .bind(&register.id)
        .bind(&register.client_id)
        .bind(register.register_date)
        .bind(register.exchange_rate)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(
            client_id = %client_id,
            register_id = %register.id,
            date = %date,
            "Cash register created"
        );
        Ok(register)
    }

    /// Closes the register if it is open. Returns whether this call closed it.
    pub async fn close(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE cash_registers SET is_open = 0, closed_at = ?1, updated_at = ?1 WHERE id = ?2 AND is_open = 1",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let closed = result.rows_affected() == 1;
        debug!(register_id = %id, closed, "Close attempted");
        Ok(closed)
    }

    /// Reopens the register if it is closed. Returns whether this call reopened it.
    pub async fn reopen(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE cash_registers SET is_open = 1, reopened_at = ?1, updated_at = ?1 WHERE id = ?2 AND is_open = 0",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let reopened = result.rows_affected() == 1;
        debug!(register_id = %id, reopened, "Reopen attempted");
        Ok(reopened)
    }

    /// Overwrites the running balances and aggregates.
    ///
    /// Used by the posting path and the seed tool; the scheduler never calls it.
    pub async fn update_running_totals(&self, id: &str, totals: &RunningTotals) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE cash_registers
            SET current_usd_cents = ?1, current_ars_cents = ?2, current_usdt_cents = ?3,
                total_sales_cents = ?4, total_expenses_cents = ?5, total_debts_cents = ?6
            WHERE id = ?7
            "#,
        )
        .bind(totals.usd_cents)
        .bind(totals.ars_cents)
        .bind(totals.usdt_cents)
        .bind(totals.sales_cents)
        .bind(totals.expenses_cents)
        .bind(totals.debts_cents)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Running balances written by the posting path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningTotals {
    pub usd_cents: i64,
    pub ars_cents: i64,
    pub usdt_cents: i64,
    pub sales_cents: i64,
    pub expenses_cents: i64,
    pub debts_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2024-06-03T12:00:00Z".parse().unwrap()
    }

    fn rate() -> ExchangeRate {
        ExchangeRate::from_ars_minor_per_usd(100_000).unwrap()
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.clients().insert("c1", "Shop").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_one_register_per_client_and_date() {
        let db = setup().await;
        let repo = db.cash_registers();

        let created = repo.create_open("c1", day(3), rate(), now()).await.unwrap();
        assert!(created.is_open);
        assert_eq!(created.initial_usd_cents, 0);

        let err = repo.create_open("c1", day(3), rate(), now()).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(repo.count_for_date("c1", day(3)).await.unwrap(), 1);

        let stored = repo.get_for_date("c1", day(3)).await.unwrap().unwrap();
        assert_eq!(stored.id, created.id);
        assert_eq!(stored.register_date, day(3));
    }

    #[tokio::test]
    async fn test_conditional_close_and_reopen() {
        let db = setup().await;
        let repo = db.cash_registers();
        let register = repo.create_open("c1", day(3), rate(), now()).await.unwrap();

        assert!(repo.close(&register.id, now()).await.unwrap());
        assert!(!repo.close(&register.id, now()).await.unwrap());

        let closed = repo.get(&register.id).await.unwrap().unwrap();
        assert!(!closed.is_open);
        assert_eq!(closed.closed_at, Some(now()));

        assert!(repo.reopen(&register.id, now()).await.unwrap());
        assert!(!repo.reopen(&register.id, now()).await.unwrap());

        let reopened = repo.get(&register.id).await.unwrap().unwrap();
        assert!(reopened.is_open);
        assert_eq!(reopened.reopened_at, Some(now()));
    }

    #[tokio::test]
    async fn test_open_other_dates_and_latest() {
        let db = setup().await;
        let repo = db.cash_registers();

        let old = repo.create_open("c1", day(1), rate(), now()).await.unwrap();
        let closed = repo.create_open("c1", day(2), rate(), now()).await.unwrap();
        repo.close(&closed.id, now()).await.unwrap();

        let stale = repo.find_open_other_dates("c1", day(3)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
        assert!(repo.find_open_other_dates("c1", day(1)).await.unwrap().is_empty());

        assert_eq!(repo.latest("c1").await.unwrap().unwrap().id, closed.id);
        assert_eq!(repo.count_open("c1").await.unwrap(), 1);

        // An open register dated after the reference date is stale too
        let ahead = repo.create_open("c1", day(4), rate(), now()).await.unwrap();
        let stale = repo.find_open_other_dates("c1", day(3)).await.unwrap();
        let ids: Vec<&str> = stale.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![old.id.as_str(), ahead.id.as_str()]);
    }

    #[tokio::test]
    async fn test_running_totals() {
        let db = setup().await;
        let repo = db.cash_registers();
        let register = repo.create_open("c1", day(3), rate(), now()).await.unwrap();

        let totals = RunningTotals {
            usd_cents: 12_000,
            ars_cents: 500_000,
            sales_cents: 15_000,
            ..Default::default()
        };
        repo.update_running_totals(&register.id, &totals).await.unwrap();

        let stored = repo.get(&register.id).await.unwrap().unwrap();
        assert_eq!(stored.current_usd_cents, 12_000);
        assert_eq!(stored.current_ars_cents, 500_000);
        assert_eq!(stored.total_sales_cents, 15_000);
        assert_eq!(stored.closing_balance_usd(rate()).cents(), 12_500);
    }
}
