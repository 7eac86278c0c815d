//! Shared fixtures for the scheduler's unit tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use caja_core::{ClientConfigDefaults, NewSchedulePeriod};
use caja_db::{Database, DbConfig};

use crate::clock::FixedClock;
use crate::config::SchedulerConfig;

pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// Default config with clients in UTC so wall time equals the test instant.
pub fn utc_config() -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.defaults.timezone = "UTC".to_string();
    config
}

pub fn utc_defaults() -> ClientConfigDefaults {
    utc_config().client_defaults()
}

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn clock(s: &str) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(at(s)))
}

/// Inserts a client and its UTC config row.
pub async fn add_client(db: &Database, id: &str) {
    db.clients().insert(id, &format!("Shop {}", id)).await.unwrap();
    db.schedules()
        .get_client_config(id, &utc_defaults())
        .await
        .unwrap();
}

/// Adds an every-day period `open`..`close` (hour, minute) for `client_id`.
pub async fn add_daily_period(
    db: &Database,
    client_id: &str,
    open: (u8, u8),
    close: (u8, u8),
    auto_open: bool,
    auto_close: bool,
) {
    db.schedules()
        .create_schedule_periods(&NewSchedulePeriod {
            client_id: client_id.to_string(),
            days: "1,2,3,4,5,6,7".to_string(),
            label: "Daily".to_string(),
            open_hour: open.0,
            open_minute: open.1,
            close_hour: close.0,
            close_minute: close.1,
            auto_open_enabled: auto_open,
            auto_close_enabled: auto_close,
            priority: 0,
        })
        .await
        .unwrap();
}
