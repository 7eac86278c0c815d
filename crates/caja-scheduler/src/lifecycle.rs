//! # Cash Register Lifecycle
//!
//! Executes open and close transitions and records each attempt in the
//! operation log.
//!
//! ## State Machine (per client, per local date)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Absent ──open──► Open ──close──► Closed ──open──► Open (reopened)    │
//! │     │                │                │                                 │
//! │   close            open             close                               │
//! │     ▼                ▼                ▼                                 │
//! │  skipped        success:         success:                               │
//! │  "no register"  "already open"   "already closed"                       │
//! │                                                                         │
//! │  Every path re-reads the row first. Close and reopen are conditional   │
//! │  updates; losing a race yields the "already" outcome, not an error.    │
//! │  UNIQUE(client, date) turns a racing create into "already exists".     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage failures are logged as `failed` and then returned to the caller.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use caja_core::schedule::local_date;
use caja_core::{
    CashRegister, ClientConfigDefaults, ExchangeRate, NewOperationLogEntry, OperationKind,
    OperationType,
};
use caja_db::{Database, DbError};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::emitter::{NoOpEmitter, SchedulerEventEmitter};
use crate::error::{SchedulerError, SchedulerResult};
use crate::evaluator::client_timezone;
use crate::report::ReportBuilder;

// =============================================================================
// Outcomes
// =============================================================================

/// Who asked for the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The automation loop, after a positive evaluation.
    Automatic,
    /// An operator, bypassing the evaluator.
    Manual,
}

impl Trigger {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Trigger::Automatic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Created { register_id: String },
    AlreadyOpen { register_id: String },
    Reopened { register_id: String },
    Closed { register_id: String, report_id: String },
    AlreadyClosed { register_id: String },
    NothingToClose,
}

impl TransitionOutcome {
    pub fn register_id(&self) -> Option<&str> {
        match self {
            TransitionOutcome::Created { register_id }
            | TransitionOutcome::AlreadyOpen { register_id }
            | TransitionOutcome::Reopened { register_id }
            | TransitionOutcome::Closed { register_id, .. }
            | TransitionOutcome::AlreadyClosed { register_id } => Some(register_id),
            TransitionOutcome::NothingToClose => None,
        }
    }

    /// True when nothing changed in storage.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::AlreadyOpen { .. }
                | TransitionOutcome::AlreadyClosed { .. }
                | TransitionOutcome::NothingToClose
        )
    }
}

// =============================================================================
// Service
// =============================================================================

#[derive(Clone)]
pub struct CashRegisterService {
    db: Database,
    clock: Arc<dyn Clock>,
    reports: ReportBuilder,
    emitter: Arc<dyn SchedulerEventEmitter>,
    defaults: ClientConfigDefaults,
    default_rate: ExchangeRate,
}

impl CashRegisterService {
    pub fn new(db: Database, config: &SchedulerConfig, clock: Arc<dyn Clock>) -> SchedulerResult<Self> {
        Ok(CashRegisterService {
            reports: ReportBuilder::new(db.clone()),
            db,
            clock,
            emitter: Arc::new(NoOpEmitter),
            defaults: config.client_defaults(),
            default_rate: config.default_exchange_rate()?,
        })
    }

    pub fn with_reports(mut self, reports: ReportBuilder) -> Self {
        self.reports = reports;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SchedulerEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn auto_open(&self, client_id: &str) -> SchedulerResult<TransitionOutcome> {
        self.transition(client_id, OperationKind::Open, Trigger::Automatic).await
    }

    pub async fn auto_close(&self, client_id: &str) -> SchedulerResult<TransitionOutcome> {
        self.transition(client_id, OperationKind::Close, Trigger::Automatic).await
    }

    /// Operator open. Same state machine, logged with a `manual` note.
    pub async fn force_open(&self, client_id: &str) -> SchedulerResult<TransitionOutcome> {
        self.transition(client_id, OperationKind::Open, Trigger::Manual).await
    }

    pub async fn force_close(&self, client_id: &str) -> SchedulerResult<TransitionOutcome> {
        self.transition(client_id, OperationKind::Close, Trigger::Manual).await
    }

    /// Today's register in the client's zone, if any.
    pub async fn current_register(&self, client_id: &str) -> SchedulerResult<Option<CashRegister>> {
        let tz = self.client_tz(client_id).await?;
        let today = local_date(self.clock.now(), tz);
        Ok(self.db.cash_registers().get_for_date(client_id, today).await?)
    }

    /// Runs one transition and logs it. Failures are logged, then returned.
    pub async fn transition(
        &self,
        client_id: &str,
        kind: OperationKind,
        trigger: Trigger,
    ) -> SchedulerResult<TransitionOutcome> {
        let now = self.clock.now();

        let result = match kind {
            OperationKind::Open => self.open(client_id, now, trigger).await,
            OperationKind::Close => self.close(client_id, now, trigger).await,
        };

        match result {
            Ok((outcome, entry)) => {
                self.record(entry, now).await?;
                info!(client_id = %client_id, %kind, ?outcome, "Register transition");
                Ok(outcome)
            }
            Err(e) => {
                let entry = with_trigger(
                    NewOperationLogEntry::failed(client_id, kind.operation_type(), e.to_string()),
                    trigger,
                );
                if let Err(log_err) = self.record(entry, now).await {
                    warn!(client_id = %client_id, error = %log_err, "Could not log failed operation");
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    async fn open(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        trigger: Trigger,
    ) -> SchedulerResult<(TransitionOutcome, NewOperationLogEntry)> {
        let tz = self.client_tz(client_id).await?;
        let today = local_date(now, tz);
        let registers = self.db.cash_registers();

        self.close_stale(client_id, today, tz, now, trigger).await?;

        let existing = match registers.get_for_date(client_id, today).await? {
            Some(register) => register,
            None => {
                let rate = self.rate_for_new_register(client_id).await?;
                match registers.create_open(client_id, today, rate, now).await {
                    Ok(created) => {
                        let entry = success(client_id, OperationType::AutoOpen, trigger)
                            .with_register(&created.id);
                        return Ok((TransitionOutcome::Created { register_id: created.id }, entry));
                    }
                    // Another poller created it first
                    Err(DbError::UniqueViolation { .. }) => registers
                        .get_for_date(client_id, today)
                        .await?
                        .ok_or_else(|| SchedulerError::not_found("CashRegister", client_id))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let register_id = existing.id.clone();
        if !existing.is_open && registers.reopen(&existing.id, now).await? {
            let entry = success(client_id, OperationType::AutoOpen, trigger)
                .with_register(&register_id)
                .with_note("reopened");
            return Ok((TransitionOutcome::Reopened { register_id }, entry));
        }

        let entry = success(client_id, OperationType::AutoOpen, trigger)
            .with_register(&register_id)
            .with_note("already open");
        Ok((TransitionOutcome::AlreadyOpen { register_id }, entry))
    }

    async fn close(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        trigger: Trigger,
    ) -> SchedulerResult<(TransitionOutcome, NewOperationLogEntry)> {
        let tz = self.client_tz(client_id).await?;
        let today = local_date(now, tz);
        let registers = self.db.cash_registers();

        let Some(register) = registers.get_for_date(client_id, today).await? else {
            let entry = with_trigger(
                NewOperationLogEntry::skipped(client_id, OperationType::AutoClose),
                trigger,
            )
            .with_note("no register for today");
            return Ok((TransitionOutcome::NothingToClose, entry));
        };

        let register_id = register.id.clone();
        if !register.is_open || !registers.close(&register.id, now).await? {
            // A close whose report failed leaves a closed register without one
            if self
                .db
                .reports()
                .get_by_date(client_id, register.register_date)
                .await?
                .is_none()
            {
                let built = self
                    .reports
                    .build(&register, tz, now, trigger.is_automatic())
                    .await?;
                warn!(
                    client_id = %client_id,
                    register_id = %register_id,
                    "Closed register had no report, generated it"
                );
                let entry = success(client_id, OperationType::AutoClose, trigger)
                    .with_register(&register_id)
                    .with_report(&built.report.id)
                    .with_note("already closed; report generated");
                return Ok((
                    TransitionOutcome::Closed {
                        register_id,
                        report_id: built.report.id,
                    },
                    entry,
                ));
            }

            let entry = success(client_id, OperationType::AutoClose, trigger)
                .with_register(&register_id)
                .with_note("already closed");
            return Ok((TransitionOutcome::AlreadyClosed { register_id }, entry));
        }

        let built = self
            .reports
            .build(&register, tz, now, trigger.is_automatic())
            .await?;

        let mut entry = success(client_id, OperationType::AutoClose, trigger)
            .with_register(&register_id)
            .with_report(&built.report.id);
        if built.already_existed {
            entry = entry.with_note("report already existed");
        }

        Ok((
            TransitionOutcome::Closed {
                register_id,
                report_id: built.report.id,
            },
            entry,
        ))
    }

    /// Closes registers left open on any other date, with their reports, so
    /// a client never has two open registers. A timezone change can leave
    /// the open register dated after today.
    async fn close_stale(
        &self,
        client_id: &str,
        today: NaiveDate,
        tz: Tz,
        now: DateTime<Utc>,
        trigger: Trigger,
    ) -> SchedulerResult<()> {
        let registers = self.db.cash_registers();

        for stale in registers.find_open_other_dates(client_id, today).await? {
            if !registers.close(&stale.id, now).await? {
                continue;
            }
            let built = self.reports.build(&stale, tz, now, trigger.is_automatic()).await?;

            warn!(
                client_id = %client_id,
                register_id = %stale.id,
                date = %stale.register_date,
                "Closed register left open from another date"
            );
            let entry = success(client_id, OperationType::AutoClose, trigger)
                .with_register(&stale.id)
                .with_report(&built.report.id)
                .with_note(format!("closed stale register from {}", stale.register_date));
            self.record(entry, now).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn record(&self, entry: NewOperationLogEntry, now: DateTime<Utc>) -> SchedulerResult<()> {
        let stored = self.db.operation_log().log(entry, now).await?;
        self.emitter.emit_operation(&stored);
        Ok(())
    }

    async fn client_tz(&self, client_id: &str) -> SchedulerResult<Tz> {
        let config = self
            .db
            .schedules()
            .get_client_config(client_id, &self.defaults)
            .await?;
        Ok(client_timezone(&config))
    }

    /// The latest register's rate, else the configured default.
    async fn rate_for_new_register(&self, client_id: &str) -> SchedulerResult<ExchangeRate> {
        let Some(latest) = self.db.cash_registers().latest(client_id).await? else {
            return Ok(self.default_rate);
        };
        match latest.exchange_rate() {
            Ok(rate) => Ok(rate),
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Latest register has no usable rate");
                Ok(self.default_rate)
            }
        }
    }
}

fn success(client_id: &str, operation: OperationType, trigger: Trigger) -> NewOperationLogEntry {
    with_trigger(NewOperationLogEntry::success(client_id, operation), trigger)
}

fn with_trigger(entry: NewOperationLogEntry, trigger: Trigger) -> NewOperationLogEntry {
    match trigger {
        Trigger::Automatic => entry,
        Trigger::Manual => entry.with_note("manual"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::test_support::*;
    use caja_core::{OperationStatus, OperationType};
    use chrono::Duration;

    async fn setup(now: &str) -> (Database, Arc<FixedClock>, CashRegisterService) {
        let db = test_db().await;
        add_client(&db, "c1").await;
        let clock = clock(now);
        let service = CashRegisterService::new(db.clone(), &utc_config(), clock.clone()).unwrap();
        (db, clock, service)
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[tokio::test]
    async fn test_open_twice_is_idempotent() {
        let (db, _clock, service) = setup("2024-06-03T09:00:00Z").await;

        let first = service.auto_open("c1").await.unwrap();
        let second = service.auto_open("c1").await.unwrap();

        assert!(matches!(first, TransitionOutcome::Created { .. }));
        assert!(matches!(second, TransitionOutcome::AlreadyOpen { .. }));
        assert_eq!(first.register_id(), second.register_id());
        assert_eq!(db.cash_registers().count_for_date("c1", june(3)).await.unwrap(), 1);

        let log = db.operation_log().get_log("c1", 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.status == OperationStatus::Success));
        assert_eq!(log[0].notes.as_deref(), Some("already open"));
    }

    #[tokio::test]
    async fn test_close_without_register_is_skipped() {
        let (db, _clock, service) = setup("2024-06-03T18:00:00Z").await;

        let outcome = service.auto_close("c1").await.unwrap();

        assert_eq!(outcome, TransitionOutcome::NothingToClose);
        assert_eq!(db.reports().count_for_client("c1").await.unwrap(), 0);
        let log = db.operation_log().get_log("c1", 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, OperationStatus::Skipped);
    }

    #[tokio::test]
    async fn test_close_generates_report_and_references_it() {
        let (db, clock, service) = setup("2024-06-03T09:00:00Z").await;
        service.auto_open("c1").await.unwrap();

        clock.set(at("2024-06-03T18:00:00Z"));
        let outcome = service.auto_close("c1").await.unwrap();

        let TransitionOutcome::Closed { register_id, report_id } = outcome else {
            panic!("expected Closed, got {:?}", outcome);
        };
        let register = db.cash_registers().get(&register_id).await.unwrap().unwrap();
        assert!(!register.is_open);
        assert_eq!(register.closed_at, Some(at("2024-06-03T18:00:00Z")));

        let report = db.reports().get(&report_id).await.unwrap().unwrap();
        assert_eq!(report.cash_register_id.as_deref(), Some(register_id.as_str()));

        let entry = &db.operation_log().get_log("c1", 1).await.unwrap()[0];
        assert_eq!(entry.operation_type, OperationType::AutoClose);
        assert_eq!(entry.cash_register_id.as_deref(), Some(register_id.as_str()));
        assert_eq!(entry.report_id.as_deref(), Some(report_id.as_str()));

        let again = service.auto_close("c1").await.unwrap();
        assert!(matches!(again, TransitionOutcome::AlreadyClosed { .. }));
        assert_eq!(
            db.operation_log().get_log("c1", 1).await.unwrap()[0].notes.as_deref(),
            Some("already closed")
        );
    }

    #[tokio::test]
    async fn test_reopen_same_day() {
        let (db, clock, service) = setup("2024-06-03T09:00:00Z").await;
        service.auto_open("c1").await.unwrap();
        clock.set(at("2024-06-03T13:00:00Z"));
        service.auto_close("c1").await.unwrap();

        clock.set(at("2024-06-03T16:00:00Z"));
        let outcome = service.auto_open("c1").await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::Reopened { .. }));
        let register = service.current_register("c1").await.unwrap().unwrap();
        assert!(register.is_open);
        assert_eq!(register.reopened_at, Some(at("2024-06-03T16:00:00Z")));
        assert_eq!(db.cash_registers().count_for_date("c1", june(3)).await.unwrap(), 1);

        // Closing again keeps the first report
        clock.set(at("2024-06-03T20:00:00Z"));
        service.auto_close("c1").await.unwrap();
        assert_eq!(db.reports().count_for_client("c1").await.unwrap(), 1);
        assert_eq!(
            db.operation_log().get_log("c1", 1).await.unwrap()[0].notes.as_deref(),
            Some("report already existed")
        );
    }

    #[tokio::test]
    async fn test_open_closes_stale_register_first() {
        let (db, clock, service) = setup("2024-06-03T09:00:00Z").await;
        service.auto_open("c1").await.unwrap();

        // Never closed; next morning opens
        clock.advance(Duration::days(1));
        let outcome = service.auto_open("c1").await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::Created { .. }));
        assert_eq!(db.cash_registers().count_open("c1").await.unwrap(), 1);
        assert!(db.reports().get_by_date("c1", june(3)).await.unwrap().is_some());
        assert!(!db
            .cash_registers()
            .get_for_date("c1", june(3))
            .await
            .unwrap()
            .unwrap()
            .is_open);
    }

    #[tokio::test]
    async fn test_timezone_change_backwards_keeps_one_open() {
        let (db, clock, service) = setup("2024-06-03T01:00:00Z").await;
        service.auto_open("c1").await.unwrap();

        // 01:10 UTC is still June 2 in Buenos Aires
        db.schedules()
            .update_client_config(
                "c1",
                &caja_core::ClientScheduleConfigUpdate {
                    timezone: Some("America/Argentina/Buenos_Aires".into()),
                    ..Default::default()
                },
                &utc_defaults(),
            )
            .await
            .unwrap();
        clock.advance(Duration::minutes(10));

        let outcome = service.auto_open("c1").await.unwrap();

        assert!(matches!(outcome, TransitionOutcome::Created { .. }));
        assert_eq!(db.cash_registers().count_open("c1").await.unwrap(), 1);
        let ahead = db
            .cash_registers()
            .get_for_date("c1", june(3))
            .await
            .unwrap()
            .unwrap();
        assert!(!ahead.is_open);
        assert!(db.reports().get_by_date("c1", june(3)).await.unwrap().is_some());
        assert!(db
            .cash_registers()
            .get_for_date("c1", june(2))
            .await
            .unwrap()
            .unwrap()
            .is_open);
    }

    #[tokio::test]
    async fn test_close_retry_generates_missing_report() {
        let (db, clock, service) = setup("2024-06-03T09:00:00Z").await;
        service.auto_open("c1").await.unwrap();

        sqlx::query(
            "CREATE TRIGGER block_report BEFORE INSERT ON daily_reports \
             BEGIN SELECT RAISE(ABORT, 'report storage full'); END;",
        )
        .execute(db.pool())
        .await
        .unwrap();

        clock.set(at("2024-06-03T18:00:00Z"));
        assert!(service.auto_close("c1").await.is_err());
        assert_eq!(db.reports().count_for_client("c1").await.unwrap(), 0);

        sqlx::query("DROP TRIGGER block_report")
            .execute(db.pool())
            .await
            .unwrap();

        clock.set(at("2024-06-03T18:05:00Z"));
        let retry = service.auto_close("c1").await.unwrap();

        let TransitionOutcome::Closed { report_id, .. } = retry else {
            panic!("expected Closed, got {:?}", retry);
        };
        let report = db.reports().get_by_date("c1", june(3)).await.unwrap().unwrap();
        assert_eq!(report.id, report_id);
        let log = db.operation_log().get_log("c1", 1).await.unwrap();
        assert_eq!(log[0].report_id.as_deref(), Some(report_id.as_str()));

        // With the report in place, a further close is a plain no-op
        let again = service.auto_close("c1").await.unwrap();
        assert!(matches!(again, TransitionOutcome::AlreadyClosed { .. }));
        assert_eq!(db.reports().count_for_client("c1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_at_most_one_open_register_over_a_week() {
        let (db, clock, service) = setup("2024-06-03T09:00:00Z").await;

        for day in 0..7 {
            service.auto_open("c1").await.unwrap();
            service.force_open("c1").await.unwrap();
            if day % 3 == 0 {
                service.auto_close("c1").await.unwrap();
                service.auto_open("c1").await.unwrap();
            }
            assert!(db.cash_registers().count_open("c1").await.unwrap() <= 1);
            clock.advance(Duration::days(1));
        }
    }

    #[tokio::test]
    async fn test_new_register_inherits_latest_rate() {
        let (db, _clock, service) = setup("2024-06-03T09:00:00Z").await;
        let previous = db
            .cash_registers()
            .create_open(
                "c1",
                june(1),
                ExchangeRate::from_ars_minor_per_usd(120_000).unwrap(),
                at("2024-06-01T09:00:00Z"),
            )
            .await
            .unwrap();
        db.cash_registers()
            .close(&previous.id, at("2024-06-01T18:00:00Z"))
            .await
            .unwrap();

        service.auto_open("c1").await.unwrap();

        let today = service.current_register("c1").await.unwrap().unwrap();
        assert_eq!(today.exchange_rate, 120_000);
    }

    #[tokio::test]
    async fn test_first_register_uses_default_rate() {
        let (_db, _clock, service) = setup("2024-06-03T09:00:00Z").await;
        service.auto_open("c1").await.unwrap();
        let register = service.current_register("c1").await.unwrap().unwrap();
        assert_eq!(register.exchange_rate, 100_000);
        assert_eq!(register.initial_usd_cents, 0);
        assert_eq!(register.initial_ars_cents, 0);
        assert_eq!(register.initial_usdt_cents, 0);
    }

    #[tokio::test]
    async fn test_manual_operations_are_marked() {
        let (db, _clock, service) = setup("2024-06-03T09:00:00Z").await;

        service.force_open("c1").await.unwrap();
        service.force_close("c1").await.unwrap();

        let log = db.operation_log().get_log("c1", 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.notes.as_deref().unwrap_or("").contains("manual")));
    }

    #[tokio::test]
    async fn test_storage_failure_is_logged_and_returned() {
        let (db, _clock, service) = setup("2024-06-03T09:00:00Z").await;
        sqlx::query(
            "CREATE TRIGGER block_insert BEFORE INSERT ON cash_registers \
             BEGIN SELECT RAISE(ABORT, 'disk unavailable'); END;",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let result = service.auto_open("c1").await;

        assert!(result.is_err());
        let log = db.operation_log().get_log("c1", 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, OperationStatus::Failed);
        assert!(log[0].error_message.as_deref().unwrap_or("").contains("disk unavailable"));
    }
}
