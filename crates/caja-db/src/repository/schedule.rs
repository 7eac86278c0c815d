//! # Schedule Repository (Period Store)
//!
//! Persists schedule periods and per-client automation config.
//!
//! ## Fan-out on Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_schedule_periods({ days: "1,2,3,4,5", open 09:00, close 18:00 })│
//! │       │                                                                 │
//! │       ▼  validate once (hours, minutes, day list)                      │
//! │  BEGIN                                                                  │
//! │    INSERT period (day 1, id A)                                          │
//! │    INSERT period (day 2, id B)                                          │
//! │    ...                                                                  │
//! │    INSERT period (day 5, id E)                                          │
//! │  COMMIT                      ← all five rows or none                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delete vs Deactivate
//! `delete_schedule_period` removes the row. Deactivation is an update with
//! `is_active = Some(false)`; the row stays and the evaluator ignores it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caja_core::validation::{
    validate_client_id, validate_new_period, validate_notification_lead, validate_period,
    validate_timezone,
};
use caja_core::{
    ClientConfigDefaults, ClientScheduleConfig, ClientScheduleConfigUpdate, NewSchedulePeriod,
    SchedulePeriod, SchedulePeriodUpdate,
};

const PERIOD_COLUMNS: &str = "id, client_id, day_of_week, label, open_hour, open_minute, \
     close_hour, close_minute, auto_open_enabled, auto_close_enabled, is_active, priority, \
     created_at, updated_at";

const CONFIG_COLUMNS: &str =
    "client_id, timezone, auto_schedule_enabled, notification_lead_minutes, created_at, updated_at";

/// Repository for schedule periods and client schedule config.
///
/// ## Usage
/// ```rust,ignore
/// let store = db.schedules();
/// let created = store.create_schedule_periods(&input).await?;
/// let today = store.get_periods_for_day("client-1", 3).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

impl ScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ScheduleRepository { pool }
    }

    // =========================================================================
    // Client Config
    // =========================================================================

    /// Returns the client's config, creating it from `defaults` on first access.
    ///
    /// Concurrent first accesses are safe: the insert is `OR IGNORE` and the
    /// row is re-read afterwards.
    pub async fn get_client_config(
        &self,
        client_id: &str,
        defaults: &ClientConfigDefaults,
    ) -> DbResult<ClientScheduleConfig> {
        if let Some(config) = self.find_client_config(client_id).await? {
            return Ok(config);
        }

        validate_client_id(client_id)?;
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO client_schedule_configs
                (client_id, timezone, auto_schedule_enabled, notification_lead_minutes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(client_id)
        .bind(&defaults.timezone)
        .bind(defaults.auto_schedule_enabled)
        .bind(defaults.notification_lead_minutes)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(client_id = %client_id, timezone = %defaults.timezone, "Created default schedule config");

        self.find_client_config(client_id)
            .await?
            .ok_or_else(|| DbError::not_found("ClientScheduleConfig", client_id))
    }

    async fn find_client_config(&self, client_id: &str) -> DbResult<Option<ClientScheduleConfig>> {
        let sql = format!(
            "SELECT {} FROM client_schedule_configs WHERE client_id = ?1",
            CONFIG_COLUMNS
        );
        let config = sqlx::query_as::<_, ClientScheduleConfig>(&sql)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(config)
    }

    /// Partially updates the client's config. The timezone must be an IANA id.
    pub async fn update_client_config(
        &self,
        client_id: &str,
        update: &ClientScheduleConfigUpdate,
        defaults: &ClientConfigDefaults,
    ) -> DbResult<ClientScheduleConfig> {
        if let Some(tz) = &update.timezone {
            validate_timezone(tz)?;
        }
        if let Some(lead) = update.notification_lead_minutes {
            validate_notification_lead(lead)?;
        }

        let current = self.get_client_config(client_id, defaults).await?;
        let timezone = update
            .timezone
            .as_deref()
            .map(|tz| tz.trim().to_string())
            .unwrap_or(current.timezone);
        let enabled = update
            .auto_schedule_enabled
            .unwrap_or(current.auto_schedule_enabled);
        let lead = update
            .notification_lead_minutes
            .unwrap_or(current.notification_lead_minutes);

        sqlx::query(
            r#"
            UPDATE client_schedule_configs
            SET timezone = ?1, auto_schedule_enabled = ?2, notification_lead_minutes = ?3, updated_at = ?4
            WHERE client_id = ?5
            "#,
        )
        .bind(&timezone)
        .bind(enabled)
        .bind(lead)
        .bind(Utc::now())
        .bind(client_id)
        .execute(&self.pool)
        .await?;

        info!(client_id = %client_id, timezone = %timezone, enabled, "Schedule config updated");

        self.find_client_config(client_id)
            .await?
            .ok_or_else(|| DbError::not_found("ClientScheduleConfig", client_id))
    }

    // =========================================================================
    // Periods: Queries
    // =========================================================================

    /// Active periods for one ISO day, by priority then start time.
    pub async fn get_periods_for_day(
        &self,
        client_id: &str,
        day_of_week: u8,
    ) -> DbResult<Vec<SchedulePeriod>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM schedule_periods
            WHERE client_id = ?1 AND day_of_week = ?2 AND is_active = 1
            ORDER BY priority, open_hour, open_minute, id
            "#,
            PERIOD_COLUMNS
        );
        let periods = sqlx::query_as::<_, SchedulePeriod>(&sql)
            .bind(client_id)
            .bind(day_of_week)
            .fetch_all(&self.pool)
            .await?;

        debug!(client_id = %client_id, day_of_week, count = periods.len(), "Loaded periods for day");
        Ok(periods)
    }

    /// Every period for the client, active or not.
    pub async fn list_periods(&self, client_id: &str) -> DbResult<Vec<SchedulePeriod>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM schedule_periods
            WHERE client_id = ?1
            ORDER BY day_of_week, priority, open_hour, open_minute, id
            "#,
            PERIOD_COLUMNS
        );
        let periods = sqlx::query_as::<_, SchedulePeriod>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(periods)
    }

    pub async fn get_period(&self, id: &str) -> DbResult<Option<SchedulePeriod>> {
        let sql = format!("SELECT {} FROM schedule_periods WHERE id = ?1", PERIOD_COLUMNS);
        let period = sqlx::query_as::<_, SchedulePeriod>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(period)
    }

    // =========================================================================
    // Periods: Mutations
    // =========================================================================

    /// Creates one period per listed day, in a single transaction.
    ///
    /// ## Errors
    /// * `DbError::Validation` - bad hour/minute, empty label, bad day list
    pub async fn create_schedule_periods(
        &self,
        input: &NewSchedulePeriod,
    ) -> DbResult<Vec<SchedulePeriod>> {
        let days = validate_new_period(input)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(days.len());

        for day in days {
            let period = SchedulePeriod {
                id: Uuid::new_v4().to_string(),
                client_id: input.client_id.trim().to_string(),
                day_of_week: day,
                label: input.label.trim().to_string(),
                open_hour: input.open_hour,
                open_minute: input.open_minute,
                close_hour: input.close_hour,
                close_minute: input.close_minute,
                auto_open_enabled: input.auto_open_enabled,
                auto_close_enabled: input.auto_close_enabled,
                is_active: true,
                priority: input.priority,
                created_at: now,
                updated_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO schedule_periods
                    (id, client_id, day_of_week, label, open_hour, open_minute, close_hour,
                     close_minute, auto_open_enabled, auto_close_enabled, is_active, priority,
                     created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )
            .bind(&period.id)
            .bind(&period.client_id)
            .bind(period.day_of_week)
            .bind(&period.label)
            .bind(period.open_hour)
            .bind(period.open_minute)
            .bind(period.close_hour)
            .bind(period.close_minute)
            .bind(period.auto_open_enabled)
            .bind(period.auto_close_enabled)
            .bind(period.is_active)
            .bind(period.priority)
            .bind(period.created_at)
            .bind(period.updated_at)
            .execute(&mut *tx)
            .await?;

            created.push(period);
        }

        tx.commit().await?;

        info!(
            client_id = %input.client_id,
            label = %input.label,
            count = created.len(),
            "Schedule periods created"
        );
        Ok(created)
    }

    /// Partial merge; unset fields keep their stored value.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - no period with this id
    /// * `DbError::Validation` - merged result out of range
    pub async fn update_schedule_period(
        &self,
        id: &str,
        update: &SchedulePeriodUpdate,
    ) -> DbResult<SchedulePeriod> {
        let current = self
            .get_period(id)
            .await?
            .ok_or_else(|| DbError::not_found("SchedulePeriod", id))?;

        let mut merged = update.merge(&current);
        merged.label = merged.label.trim().to_string();
        merged.updated_at = Utc::now();
        validate_period(&merged)?;

        let result = sqlx::query(
            r#"
            UPDATE schedule_periods
            SET day_of_week = ?1, label = ?2, open_hour = ?3, open_minute = ?4,
                close_hour = ?5, close_minute = ?6, auto_open_enabled = ?7,
                auto_close_enabled = ?8, is_active = ?9, priority = ?10, updated_at = ?11
            WHERE id = ?12
            "#,
        )
        .bind(merged.day_of_week)
        .bind(&merged.label)
        .bind(merged.open_hour)
        .bind(merged.open_minute)
        .bind(merged.close_hour)
        .bind(merged.close_minute)
        .bind(merged.auto_open_enabled)
        .bind(merged.auto_close_enabled)
        .bind(merged.is_active)
        .bind(merged.priority)
        .bind(merged.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SchedulePeriod", id));
        }

        debug!(period_id = %id, "Schedule period updated");
        Ok(merged)
    }

    /// Hard delete.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - no period with this id
    pub async fn delete_schedule_period(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM schedule_periods WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SchedulePeriod", id));
        }

        info!(period_id = %id, "Schedule period deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
