//! # Caja Service
//!
//! The administrative surface: everything an HTTP or CLI layer needs,
//! behind one handle. Owns the lifecycle service and one automation loop.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           CajaService                                   │
//! │                                                                         │
//! │   register state ─┐                                                     │
//! │   force open/close├──► CashRegisterService ──► ReportBuilder           │
//! │                   │                                                     │
//! │   periods/config ─┼──► ScheduleRepository                              │
//! │   upcoming ops    │                                                     │
//! │   operation log ──┼──► OperationLogRepository                          │
//! │                   │                                                     │
//! │   start/stop ─────┴──► AutomationLoop ◄── Watchdog                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::info;

use caja_core::schedule::upcoming_operations;
use caja_core::{
    AutoOperationLogEntry, CashRegister, ClientConfigDefaults, ClientScheduleConfig,
    ClientScheduleConfigUpdate, DailyReconciliationReport, NewSchedulePeriod, SchedulePeriod,
    SchedulePeriodUpdate, UpcomingOperation,
};
use caja_db::Database;

use crate::automation::{AutomationLoop, SchedulerStatus};
use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::emitter::{NoOpEmitter, SchedulerEventEmitter};
use crate::error::{SchedulerError, SchedulerResult};
use crate::evaluator::client_timezone;
use crate::lifecycle::{CashRegisterService, TransitionOutcome};
use crate::report::{JsonFileExporter, NoOpExporter, ReportBuilder, ReportExporter};
use crate::watchdog::Watchdog;

#[derive(Clone)]
pub struct CajaService {
    db: Database,
    config: SchedulerConfig,
    defaults: ClientConfigDefaults,
    registers: CashRegisterService,
    automation: AutomationLoop,
}

impl CajaService {
    pub fn builder(config: SchedulerConfig) -> CajaServiceBuilder {
        CajaServiceBuilder::new(config)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn automation(&self) -> &AutomationLoop {
        &self.automation
    }

    /// A watchdog bound to this service's loop, on the configured interval.
    pub fn watchdog(&self) -> Watchdog {
        Watchdog::new(self.automation.clone(), self.config.watchdog_interval())
    }

    // =========================================================================
    // Registers
    // =========================================================================

    pub async fn current_register(&self, client_id: &str) -> SchedulerResult<Option<CashRegister>> {
        self.require_client(client_id).await?;
        self.registers.current_register(client_id).await
    }

    pub async fn force_open(&self, client_id: &str) -> SchedulerResult<TransitionOutcome> {
        self.require_client(client_id).await?;
        self.registers.force_open(client_id).await
    }

    pub async fn force_close(&self, client_id: &str) -> SchedulerResult<TransitionOutcome> {
        self.require_client(client_id).await?;
        self.registers.force_close(client_id).await
    }

    /// Newest first.
    pub async fn reports(
        &self,
        client_id: &str,
        limit: u32,
    ) -> SchedulerResult<Vec<DailyReconciliationReport>> {
        Ok(self.db.reports().list_for_client(client_id, limit).await?)
    }

    // =========================================================================
    // Schedule
    // =========================================================================

    pub async fn client_config(&self, client_id: &str) -> SchedulerResult<ClientScheduleConfig> {
        self.require_client(client_id).await?;
        Ok(self
            .db
            .schedules()
            .get_client_config(client_id, &self.defaults)
            .await?)
    }

    pub async fn update_client_config(
        &self,
        client_id: &str,
        update: &ClientScheduleConfigUpdate,
    ) -> SchedulerResult<ClientScheduleConfig> {
        self.require_client(client_id).await?;
        Ok(self
            .db
            .schedules()
            .update_client_config(client_id, update, &self.defaults)
            .await?)
    }

    pub async fn list_periods(&self, client_id: &str) -> SchedulerResult<Vec<SchedulePeriod>> {
        Ok(self.db.schedules().list_periods(client_id).await?)
    }

    pub async fn periods_for_day(
        &self,
        client_id: &str,
        day_of_week: u8,
    ) -> SchedulerResult<Vec<SchedulePeriod>> {
        Ok(self
            .db
            .schedules()
            .get_periods_for_day(client_id, day_of_week)
            .await?)
    }

    /// One row per listed day.
    pub async fn create_periods(&self, input: &NewSchedulePeriod) -> SchedulerResult<Vec<SchedulePeriod>> {
        self.require_client(&input.client_id).await?;
        let created = self.db.schedules().create_schedule_periods(input).await?;
        info!(client_id = %input.client_id, count = created.len(), "Schedule periods created");
        Ok(created)
    }

    pub async fn update_period(
        &self,
        id: &str,
        update: &SchedulePeriodUpdate,
    ) -> SchedulerResult<SchedulePeriod> {
        Ok(self.db.schedules().update_schedule_period(id, update).await?)
    }

    pub async fn delete_period(&self, id: &str) -> SchedulerResult<()> {
        self.db.schedules().delete_schedule_period(id).await?;
        info!(period_id = %id, "Schedule period deleted");
        Ok(())
    }

    /// The next `limit` configured operations after now, within seven days.
    pub async fn upcoming_operations(
        &self,
        client_id: &str,
        limit: usize,
    ) -> SchedulerResult<Vec<UpcomingOperation>> {
        let config = self.client_config(client_id).await?;
        let tz = client_timezone(&config);
        let periods = self.db.schedules().list_periods(client_id).await?;
        Ok(upcoming_operations(
            &periods,
            tz,
            self.registers.clock().now(),
            limit,
        ))
    }

    // =========================================================================
    // Audit Log
    // =========================================================================

    pub async fn operation_log(
        &self,
        client_id: &str,
        limit: u32,
    ) -> SchedulerResult<Vec<AutoOperationLogEntry>> {
        Ok(self.db.operation_log().get_log(client_id, limit).await?)
    }

    // =========================================================================
    // Automation Control
    // =========================================================================

    pub async fn start_automation(&self) -> SchedulerResult<()> {
        self.automation.start().await
    }

    pub async fn stop_automation(&self) {
        self.automation.stop().await
    }

    pub async fn automation_status(&self) -> SchedulerStatus {
        self.automation.status().await
    }

    async fn require_client(&self, client_id: &str) -> SchedulerResult<()> {
        match self.db.clients().get(client_id).await? {
            Some(_) => Ok(()),
            None => Err(SchedulerError::not_found("Client", client_id)),
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

pub struct CajaServiceBuilder {
    config: SchedulerConfig,
    db: Option<Database>,
    clock: Option<Arc<dyn Clock>>,
    emitter: Option<Arc<dyn SchedulerEventEmitter>>,
    exporter: Option<Arc<dyn ReportExporter>>,
}

impl CajaServiceBuilder {
    pub fn new(config: SchedulerConfig) -> Self {
        CajaServiceBuilder {
            config,
            db: None,
            clock: None,
            emitter: None,
            exporter: None,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SchedulerEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Overrides the exporter chosen from the `[export]` section.
    pub fn with_exporter(mut self, exporter: Arc<dyn ReportExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn build(self) -> SchedulerResult<CajaService> {
        self.config.validate()?;

        let db = self
            .db
            .ok_or_else(|| SchedulerError::InvalidConfig("Database required".into()))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let exporter = match self.exporter {
            Some(exporter) => exporter,
            None => exporter_from_config(&self.config),
        };

        let reports = ReportBuilder::new(db.clone()).with_exporter(exporter);
        let registers = CashRegisterService::new(db.clone(), &self.config, clock)?
            .with_reports(reports)
            .with_emitter(emitter.clone());
        let automation =
            AutomationLoop::with_emitter(db.clone(), &self.config, registers.clone(), emitter);

        Ok(CajaService {
            defaults: self.config.client_defaults(),
            db,
            config: self.config,
            registers,
            automation,
        })
    }
}

fn exporter_from_config(config: &SchedulerConfig) -> Arc<dyn ReportExporter> {
    match &config.export.directory {
        Some(directory) if config.export.enabled => Arc::new(JsonFileExporter::new(directory.clone())),
        _ => Arc::new(NoOpExporter),
    }
}
