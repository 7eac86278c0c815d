//! # Eligibility Evaluator
//!
//! Decides whether one automatic operation should fire for one client at
//! one instant. Deterministic given the stored state and the instant.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  evaluate(client, kind, now)                                           │
//! │                                                                         │
//! │  config.auto_schedule_enabled? ── no ──► Skip(AutomationDisabled)      │
//! │        │ yes                                                            │
//! │        ▼                                                                │
//! │  now → client zone → ISO weekday, minute of day                        │
//! │        │                                                                │
//! │  periods for weekday? ─────────── none ► Skip(NoPeriodsForDay)         │
//! │        │                                                                │
//! │  kind enabled + minute in [target, target + window]?                   │
//! │        │                          none ► Skip(NoMatchingWindow)        │
//! │        ▼                                                                │
//! │  success logged in last 5 min? ── yes ─► Skip(RecentlyExecuted)        │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │  Execute { first matching period }                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use caja_core::schedule::{local_day_of_week, local_minute_of_day, matching_periods};
use caja_core::{
    ClientConfigDefaults, ClientScheduleConfig, Decision, ExecutionWindows, OperationKind,
    SkipReason, DEFAULT_TIMEZONE,
};
use caja_db::Database;

use crate::config::SchedulerConfig;
use crate::error::SchedulerResult;

/// Parses the client's stored zone, falling back to the business default.
pub fn client_timezone(config: &ClientScheduleConfig) -> Tz {
    match config.timezone.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(
                client_id = %config.client_id,
                timezone = %config.timezone,
                "Stored timezone is not a valid IANA id, using default"
            );
            DEFAULT_TIMEZONE.parse::<Tz>().unwrap_or(Tz::UTC)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    db: Database,
    windows: ExecutionWindows,
    recent_minutes: u32,
    defaults: ClientConfigDefaults,
}

impl Evaluator {
    pub fn new(db: Database, config: &SchedulerConfig) -> Self {
        Evaluator {
            db,
            windows: config.execution_windows(),
            recent_minutes: config.scheduler.recent_execution_minutes,
            defaults: config.client_defaults(),
        }
    }

    pub async fn evaluate(
        &self,
        client_id: &str,
        kind: OperationKind,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Decision> {
        let config = self
            .db
            .schedules()
            .get_client_config(client_id, &self.defaults)
            .await?;

        if !config.auto_schedule_enabled {
            return Ok(Decision::Skip(SkipReason::AutomationDisabled));
        }

        let tz = client_timezone(&config);
        let day = local_day_of_week(now, tz);
        let periods = self.db.schedules().get_periods_for_day(client_id, day).await?;

        if periods.is_empty() {
            return Ok(Decision::Skip(SkipReason::NoPeriodsForDay));
        }

        let minute = local_minute_of_day(now, tz);
        let candidates = matching_periods(&periods, kind, minute, &self.windows);

        let Some(period) = candidates.first() else {
            debug!(client_id = %client_id, %kind, day, minute, "No matching window");
            return Ok(Decision::Skip(SkipReason::NoMatchingWindow));
        };

        // The lookback is per (client, kind), so one check covers every candidate
        let recent = self
            .db
            .operation_log()
            .has_recent_execution(client_id, kind.operation_type(), self.recent_minutes, now)
            .await?;

        if recent {
            debug!(client_id = %client_id, %kind, "Executed recently, skipping");
            return Ok(Decision::Skip(SkipReason::RecentlyExecuted));
        }

        Ok(Decision::Execute {
            period: (*period).clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use caja_core::{ClientScheduleConfigUpdate, NewOperationLogEntry, OperationType};

    async fn setup() -> (Database, Evaluator) {
        let db = test_db().await;
        add_client(&db, "c1").await;
        add_daily_period(&db, "c1", (9, 0), (18, 0), true, true).await;
        let evaluator = Evaluator::new(db.clone(), &utc_config());
        (db, evaluator)
    }

    #[tokio::test]
    async fn test_open_window_edges() {
        let (_db, evaluator) = setup().await;

        // 2024-06-03 is a Monday
        let at_open = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T09:00:00Z"))
            .await
            .unwrap();
        let late = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T10:59:00Z"))
            .await
            .unwrap();
        let too_late = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T11:01:00Z"))
            .await
            .unwrap();
        let early = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T08:59:00Z"))
            .await
            .unwrap();

        assert!(at_open.is_execute());
        assert!(late.is_execute());
        assert_eq!(too_late.skip_reason(), Some(SkipReason::NoMatchingWindow));
        assert_eq!(early.skip_reason(), Some(SkipReason::NoMatchingWindow));
    }

    #[tokio::test]
    async fn test_close_window_is_shorter() {
        let (_db, evaluator) = setup().await;

        let inside = evaluator
            .evaluate("c1", OperationKind::Close, at("2024-06-03T19:00:00Z"))
            .await
            .unwrap();
        let outside = evaluator
            .evaluate("c1", OperationKind::Close, at("2024-06-03T19:01:00Z"))
            .await
            .unwrap();

        assert!(inside.is_execute());
        assert!(!outside.is_execute());
    }

    #[tokio::test]
    async fn test_sunday_matches_day_seven() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        db.schedules()
            .create_schedule_periods(&caja_core::NewSchedulePeriod {
                client_id: "c1".into(),
                days: "7".into(),
                label: "Domingo".into(),
                open_hour: 10,
                open_minute: 0,
                close_hour: 13,
                close_minute: 0,
                auto_open_enabled: true,
                auto_close_enabled: true,
                priority: 0,
            })
            .await
            .unwrap();
        let evaluator = Evaluator::new(db.clone(), &utc_config());

        // 2024-06-02 is a Sunday
        let sunday = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-02T10:00:00Z"))
            .await
            .unwrap();
        assert!(sunday.is_execute());

        let monday = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(monday.skip_reason(), Some(SkipReason::NoPeriodsForDay));
    }

    #[tokio::test]
    async fn test_disabled_flags() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        add_daily_period(&db, "c1", (9, 0), (18, 0), false, true).await;
        let evaluator = Evaluator::new(db.clone(), &utc_config());

        let open = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T09:00:00Z"))
            .await
            .unwrap();
        assert_eq!(open.skip_reason(), Some(SkipReason::NoMatchingWindow));

        db.schedules()
            .update_client_config(
                "c1",
                &ClientScheduleConfigUpdate {
                    auto_schedule_enabled: Some(false),
                    ..Default::default()
                },
                &utc_defaults(),
            )
            .await
            .unwrap();
        let close = evaluator
            .evaluate("c1", OperationKind::Close, at("2024-06-03T18:00:00Z"))
            .await
            .unwrap();
        assert_eq!(close.skip_reason(), Some(SkipReason::AutomationDisabled));
    }

    #[tokio::test]
    async fn test_recent_success_blocks_execution() {
        let (db, evaluator) = setup().await;
        let now = at("2024-06-03T09:05:00Z");

        db.operation_log()
            .log(
                NewOperationLogEntry::success("c1", OperationType::AutoOpen),
                at("2024-06-03T09:01:00Z"),
            )
            .await
            .unwrap();

        let decision = evaluator.evaluate("c1", OperationKind::Open, now).await.unwrap();
        assert_eq!(decision.skip_reason(), Some(SkipReason::RecentlyExecuted));

        // Six minutes later the lookback has expired
        let later = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T09:07:00Z"))
            .await
            .unwrap();
        assert!(later.is_execute());

        // Close is tracked separately
        let close = evaluator
            .evaluate("c1", OperationKind::Close, at("2024-06-03T18:00:00Z"))
            .await
            .unwrap();
        assert!(close.is_execute());
    }

    #[tokio::test]
    async fn test_local_time_drives_weekday() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        db.schedules()
            .update_client_config(
                "c1",
                &ClientScheduleConfigUpdate {
                    timezone: Some("America/Argentina/Buenos_Aires".into()),
                    ..Default::default()
                },
                &utc_defaults(),
            )
            .await
            .unwrap();
        db.schedules()
            .create_schedule_periods(&caja_core::NewSchedulePeriod {
                client_id: "c1".into(),
                days: "7".into(),
                label: "Domingo noche".into(),
                open_hour: 22,
                open_minute: 0,
                close_hour: 23,
                close_minute: 0,
                auto_open_enabled: true,
                auto_close_enabled: true,
                priority: 0,
            })
            .await
            .unwrap();
        let evaluator = Evaluator::new(db.clone(), &utc_config());

        // Monday 01:00 UTC is Sunday 22:00 in Buenos Aires (UTC-3)
        let decision = evaluator
            .evaluate("c1", OperationKind::Open, at("2024-06-03T01:00:00Z"))
            .await
            .unwrap();
        assert!(decision.is_execute());
    }
}
