//! # Reconciliation Report Builder
//!
//! Produces the one immutable [`DailyReconciliationReport`] per (client, date).
//!
//! ## Build Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  build(register, tz)                                                   │
//! │                                                                         │
//! │  1. report for (client, date) exists? ──► return it (already_existed)  │
//! │  2. day_bounds(date, tz) → [start, end) in UTC                         │
//! │  3. ledger.day_snapshot(client, start, end)   one read transaction     │
//! │  4. reconciliation::compute(...)              pure                     │
//! │  5. reports.insert(...)    UNIQUE(client, date) conflict → re-read     │
//! │  6. exporter.export(...)   best effort, warn! on failure               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use caja_core::reconciliation::{
    compute, FixedMarginPolicy, ProfitEstimator, ReconciliationPayload, ReportMetadata,
};
use caja_core::schedule::day_bounds;
use caja_core::{CashRegister, DailyReconciliationReport};
use caja_db::{Database, DbError};

use crate::error::{SchedulerError, SchedulerResult};

// =============================================================================
// Exporters
// =============================================================================

/// Turns a stored report into something a human opens (file, sheet, mail).
///
/// Failures are logged by the builder and never fail the close.
pub trait ReportExporter: Send + Sync {
    fn export(
        &self,
        report: &DailyReconciliationReport,
        payload: &ReconciliationPayload,
    ) -> SchedulerResult<()>;
}

pub struct NoOpExporter;

impl ReportExporter for NoOpExporter {
    fn export(&self, _: &DailyReconciliationReport, _: &ReconciliationPayload) -> SchedulerResult<()> {
        Ok(())
    }
}

/// Writes `<client>_<date>.json` (pretty-printed payload) into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileExporter {
    directory: PathBuf,
}

impl JsonFileExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        JsonFileExporter {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, report: &DailyReconciliationReport) -> PathBuf {
        self.directory
            .join(format!("{}_{}.json", report.client_id, report.report_date))
    }
}

impl ReportExporter for JsonFileExporter {
    fn export(
        &self,
        report: &DailyReconciliationReport,
        payload: &ReconciliationPayload,
    ) -> SchedulerResult<()> {
        std::fs::create_dir_all(&self.directory)
            .map_err(|e| SchedulerError::ExportFailed(e.to_string()))?;

        let path = self.path_for(report);
        let contents = payload.to_json_pretty()?;
        std::fs::write(&path, contents).map_err(|e| SchedulerError::ExportFailed(e.to_string()))?;

        debug!(?path, report_id = %report.id, "Report exported");
        Ok(())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Outcome of [`ReportBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltReport {
    pub report: DailyReconciliationReport,

    /// True when the report for this date was already stored.
    pub already_existed: bool,
}

#[derive(Clone)]
pub struct ReportBuilder {
    db: Database,
    policy: Arc<dyn ProfitEstimator>,
    exporter: Arc<dyn ReportExporter>,
}

impl ReportBuilder {
    pub fn new(db: Database) -> Self {
        ReportBuilder {
            db,
            policy: Arc::new(FixedMarginPolicy::default()),
            exporter: Arc::new(NoOpExporter),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ProfitEstimator>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn ReportExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Builds and stores the report for `register`'s date, or returns the
    /// one already stored.
    pub async fn build(
        &self,
        register: &CashRegister,
        tz: Tz,
        now: DateTime<Utc>,
        is_auto_generated: bool,
    ) -> SchedulerResult<BuiltReport> {
        let reports = self.db.reports();

        if let Some(existing) = reports
            .get_by_date(&register.client_id, register.register_date)
            .await?
        {
            debug!(
                client_id = %register.client_id,
                date = %register.register_date,
                "Report already exists"
            );
            return Ok(BuiltReport {
                report: existing,
                already_existed: true,
            });
        }

        let (start, end) = day_bounds(register.register_date, tz);
        let snapshot = self
            .db
            .ledger()
            .day_snapshot(&register.client_id, start, end)
            .await?;
        let rate = register.exchange_rate()?;

        let metadata = ReportMetadata {
            client_id: register.client_id.clone(),
            report_date: register.register_date,
            cash_register_id: Some(register.id.clone()),
            timezone: tz.name().to_string(),
            period_start: start,
            period_end: end,
            generated_at: now,
            is_auto_generated,
            profit_policy: self.policy.name().to_string(),
        };
        let payload = compute(&snapshot, Some(register), rate, self.policy.as_ref(), metadata);
        let summary = &payload.summary;

        let report = DailyReconciliationReport {
            id: Uuid::new_v4().to_string(),
            client_id: register.client_id.clone(),
            cash_register_id: Some(register.id.clone()),
            report_date: register.register_date,
            total_income_cents: summary.total_income.cents(),
            total_expenses_cents: summary.total_expenses.cents(),
            total_debt_payments_cents: summary.total_debt_payments.cents(),
            net_profit_cents: summary.net_profit.cents(),
            total_commissions_cents: summary.total_commissions.cents(),
            exchange_rate: summary.exchange_rate,
            opening_balance_cents: summary.opening_balance.cents(),
            closing_balance_cents: summary.closing_balance.cents(),
            movement_count: payload.movement_count(),
            payload: payload.to_json()?,
            is_auto_generated,
            created_at: now,
        };

        match reports.insert(&report).await {
            Ok(()) => {}
            Err(DbError::UniqueViolation { .. }) => {
                // Another poller stored it between our read and insert
                let existing = reports
                    .get_by_date(&register.client_id, register.register_date)
                    .await?
                    .ok_or_else(|| SchedulerError::not_found("DailyReconciliationReport", &register.id))?;
                return Ok(BuiltReport {
                    report: existing,
                    already_existed: true,
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            client_id = %report.client_id,
            date = %report.report_date,
            income_cents = report.total_income_cents,
            net_profit_cents = report.net_profit_cents,
            vendors = payload.vendor_performance.len(),
            "Reconciliation report generated"
        );

        if let Err(e) = self.exporter.export(&report, &payload) {
            warn!(report_id = %report.id, error = %e, "Report export failed, continuing");
        }

        Ok(BuiltReport {
            report,
            already_existed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use caja_core::ledger::{DebtPayment, Expense, Order, OrderStatus, Payment, Vendor};
    use caja_core::reconciliation::ReconciliationPayload;
    use caja_core::{Currency, ExchangeRate};
    use chrono::NaiveDate;

    async fn open_register(db: &Database) -> CashRegister {
        db.cash_registers()
            .create_open(
                "c1",
                NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                ExchangeRate::from_ars_minor_per_usd(100_000).unwrap(),
                at("2024-06-03T09:00:00Z"),
            )
            .await
            .unwrap()
    }

    async fn seed_day(db: &Database) {
        let ledger = db.ledger();
        let when = at("2024-06-03T12:00:00Z");

        ledger
            .insert_vendor(&Vendor {
                id: "v1".into(),
                client_id: "c1".into(),
                name: "Lucía".into(),
                commission_rate_bps: 1500,
                is_active: true,
            })
            .await
            .unwrap();
        ledger
            .insert_vendor(&Vendor {
                id: "v2".into(),
                client_id: "c1".into(),
                name: "Idle".into(),
                commission_rate_bps: 1000,
                is_active: true,
            })
            .await
            .unwrap();
        ledger
            .insert_order(&Order {
                id: "o1".into(),
                client_id: "c1".into(),
                vendor_id: Some("v1".into()),
                customer_id: None,
                product_id: None,
                total_cents: 15_000,
                currency: Currency::Usd,
                status: OrderStatus::Completed,
                created_at: when,
            })
            .await
            .unwrap();
        for (id, cents) in [("p1", 10_000), ("p2", 5_000)] {
            ledger
                .insert_payment(&Payment {
                    id: id.into(),
                    client_id: "c1".into(),
                    order_id: Some("o1".into()),
                    amount_cents: cents,
                    currency: Currency::Usd,
                    method: "cash".into(),
                    created_at: when,
                })
                .await
                .unwrap();
        }
        ledger
            .insert_expense(&Expense {
                id: "e1".into(),
                client_id: "c1".into(),
                description: "Limpieza".into(),
                amount_cents: 3_000,
                currency: Currency::Usd,
                created_at: when,
            })
            .await
            .unwrap();
        ledger
            .insert_debt_payment(&DebtPayment {
                id: "d1".into(),
                client_id: "c1".into(),
                customer_id: None,
                amount_cents: 2_000,
                currency: Currency::Usd,
                created_at: when,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_totals_and_vendor_exclusion() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        seed_day(&db).await;
        let register = open_register(&db).await;

        let built = ReportBuilder::new(db.clone())
            .build(&register, Tz::UTC, at("2024-06-03T19:00:00Z"), true)
            .await
            .unwrap();

        assert!(!built.already_existed);
        let report = built.report;
        assert_eq!(report.total_income_cents, 15_000);
        assert_eq!(report.total_expenses_cents, 3_000);
        assert_eq!(report.net_profit_cents, 12_000);
        assert_eq!(report.total_debt_payments_cents, 2_000);

        let payload: ReconciliationPayload = serde_json::from_str(&report.payload).unwrap();
        assert_eq!(payload.vendor_performance.len(), 1);
        assert_eq!(payload.vendor_performance[0].vendor_id, "v1");
        assert_eq!(payload.metadata.profit_policy, "fixed_margin");
        assert_eq!(payload.metadata.cash_register_id.as_deref(), Some(register.id.as_str()));
    }

    #[tokio::test]
    async fn test_second_build_returns_stored_report() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        let register = open_register(&db).await;
        let builder = ReportBuilder::new(db.clone());

        let first = builder
            .build(&register, Tz::UTC, at("2024-06-03T19:00:00Z"), true)
            .await
            .unwrap();
        let second = builder
            .build(&register, Tz::UTC, at("2024-06-03T21:00:00Z"), false)
            .await
            .unwrap();

        assert!(second.already_existed);
        assert_eq!(first.report.id, second.report.id);
        assert_eq!(db.reports().count_for_client("c1").await.unwrap(), 1);
    }

    struct FailingExporter;

    impl ReportExporter for FailingExporter {
        fn export(&self, _: &DailyReconciliationReport, _: &ReconciliationPayload) -> SchedulerResult<()> {
            Err(SchedulerError::ExportFailed("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_export_failure_does_not_fail_build() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        let register = open_register(&db).await;

        let built = ReportBuilder::new(db.clone())
            .with_exporter(Arc::new(FailingExporter))
            .build(&register, Tz::UTC, at("2024-06-03T19:00:00Z"), true)
            .await
            .unwrap();

        assert!(db.reports().get(&built.report.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_json_file_exporter_writes_payload() {
        let db = test_db().await;
        add_client(&db, "c1").await;
        seed_day(&db).await;
        let register = open_register(&db).await;
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonFileExporter::new(dir.path().join("reports"));

        let built = ReportBuilder::new(db.clone())
            .with_exporter(Arc::new(exporter.clone()))
            .build(&register, Tz::UTC, at("2024-06-03T19:00:00Z"), true)
            .await
            .unwrap();

        let path = exporter.path_for(&built.report);
        assert!(path.ends_with("c1_2024-06-03.json"));
        let written: ReconciliationPayload =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.summary.net_profit.cents(), 12_000);
    }
}
