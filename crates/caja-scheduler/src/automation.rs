//! # Automation Loop
//!
//! The recurring driver. One timer task per loop instance; each tick walks
//! every cached active client, first for opens, then for closes.
//!
//! ## Tick Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  timer fires                                                            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  UTC minute % throttle == 0 ? ── no ──► done (throttled)               │
//! │     │ yes                                                               │
//! │     ▼                                                                   │
//! │  client cache empty? ── yes ──► reload from storage                    │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  PASS 1: for each client  evaluate(Open)  → auto_open on Execute       │
//! │  PASS 2: for each client  evaluate(Close) → auto_close on Execute      │
//! │                                                                         │
//! │  A failing client is logged and skipped; the pass continues.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Overlapping Ticks
//! Nothing here locks around a client's check. Two ticks (or two processes)
//! racing on the same client are resolved by storage: the operation log
//! lookback, the register's `is_open` flag and `UNIQUE(client, date)`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use caja_core::{Client, Decision, OperationKind};
use caja_db::Database;

use crate::config::SchedulerConfig;
use crate::emitter::{NoOpEmitter, SchedulerEventEmitter};
use crate::error::{SchedulerError, SchedulerResult};
use crate::evaluator::Evaluator;
use crate::lifecycle::{CashRegisterService, TransitionOutcome};

// =============================================================================
// Status & Reports
// =============================================================================

/// Snapshot of a loop instance for the administrative surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    /// The timer task exists and has not finished.
    pub running: bool,

    /// `start()` was called and `stop()` was not. The watchdog revives the
    /// timer when this is true and `running` is false.
    pub desired_running: bool,

    pub cached_clients: usize,
    pub ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub restarts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedOperation {
    pub client_id: String,
    pub kind: OperationKind,
    pub outcome: TransitionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientFailure {
    pub client_id: String,
    pub kind: OperationKind,
    pub message: String,
}

/// What one tick did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub throttled: bool,
    pub executed: Vec<ExecutedOperation>,
    pub skipped: usize,
    pub failures: Vec<ClientFailure>,
}

// =============================================================================
// Scheduler State
// =============================================================================

/// Everything mutable about one loop instance.
#[derive(Default)]
struct SchedulerState {
    clients: Vec<Client>,
    timer: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    desired_running: bool,
    ticks: u64,
    last_tick: Option<DateTime<Utc>>,
    last_error: Option<String>,
    restarts: u32,
}

impl SchedulerState {
    fn timer_alive(&self) -> bool {
        self.timer.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

// =============================================================================
// Automation Loop
// =============================================================================

struct LoopInner {
    db: Database,
    evaluator: Evaluator,
    registers: CashRegisterService,
    emitter: Arc<dyn SchedulerEventEmitter>,
    tick_interval: Duration,
    throttle_minutes: u32,
    state: Mutex<SchedulerState>,
}

/// Handle to one automation loop. Clones share the same state.
#[derive(Clone)]
pub struct AutomationLoop {
    inner: Arc<LoopInner>,
}

impl AutomationLoop {
    pub fn new(db: Database, config: &SchedulerConfig, registers: CashRegisterService) -> Self {
        Self::with_emitter(db, config, registers, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        db: Database,
        config: &SchedulerConfig,
        registers: CashRegisterService,
        emitter: Arc<dyn SchedulerEventEmitter>,
    ) -> Self {
        AutomationLoop {
            inner: Arc::new(LoopInner {
                evaluator: Evaluator::new(db.clone(), config),
                db,
                registers,
                emitter,
                tick_interval: config.tick_interval(),
                throttle_minutes: config.scheduler.throttle_minutes.max(1),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    // =========================================================================
    // Administrative Control
    // =========================================================================

    /// Loads the active clients and starts the timer.
    ///
    /// ## Errors
    /// * `SchedulerError::AlreadyRunning` - the timer task is alive
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.is_alive().await {
            return Err(SchedulerError::AlreadyRunning);
        }

        let count = self.reload_clients().await?;

        let mut state = self.inner.state.lock().await;
        if state.timer_alive() {
            return Err(SchedulerError::AlreadyRunning);
        }
        state.desired_running = true;
        self.spawn_timer(&mut state);

        info!(
            clients = count,
            interval_secs = self.inner.tick_interval.as_secs(),
            "Automation loop started"
        );
        Ok(())
    }

    /// Stops the timer. A tick in progress finishes first.
    pub async fn stop(&self) {
        let (cancel, timer) = {
            let mut state = self.inner.state.lock().await;
            state.desired_running = false;
            (state.cancel.take(), state.timer.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Automation timer ended abnormally");
                }
            }
        }

        info!("Automation loop stopped");
    }

    pub async fn restart(&self) -> SchedulerResult<()> {
        self.stop().await;
        self.start().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock().await;
        SchedulerStatus {
            running: state.timer_alive(),
            desired_running: state.desired_running,
            cached_clients: state.clients.len(),
            ticks: state.ticks,
            last_tick: state.last_tick,
            last_error: state.last_error.clone(),
            restarts: state.restarts,
        }
    }

    pub async fn is_alive(&self) -> bool {
        self.inner.state.lock().await.timer_alive()
    }

    /// Replaces the cached client list. Returns the new count.
    pub async fn reload_clients(&self) -> SchedulerResult<usize> {
        let clients = self.inner.db.clients().list_active().await?;
        let count = clients.len();
        self.inner.state.lock().await.clients = clients;
        debug!(count, "Client cache reloaded");
        Ok(count)
    }

    /// Respawns the timer if it should be running but is not.
    /// Returns whether a restart happened.
    pub(crate) async fn revive_if_dead(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if !state.desired_running || state.timer_alive() {
            return false;
        }

        state.restarts += 1;
        warn!(restarts = state.restarts, "Automation timer is dead, restarting");
        self.spawn_timer(&mut state);
        true
    }

    fn spawn_timer(&self, state: &mut SchedulerState) {
        if let Some(old) = state.cancel.take() {
            old.cancel();
        }
        let cancel = CancellationToken::new();
        state.cancel = Some(cancel.clone());
        state.timer = Some(tokio::spawn(self.clone().run_timer(cancel)));
    }

    async fn run_timer(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.inner.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Automation timer received shutdown");
                    break;
                }
                _ = interval.tick() => {
                    let now = self.inner.registers.clock().now();
                    if let Err(e) = self.tick(now).await {
                        error!(error = %e, "Automation tick failed");
                        self.inner.state.lock().await.last_error = Some(e.to_string());
                    }
                }
            }
        }
    }

    // =========================================================================
    // Ticks
    // =========================================================================

    /// One timer tick: throttle, then both passes.
    pub async fn tick(&self, now: DateTime<Utc>) -> SchedulerResult<TickReport> {
        {
            let mut state = self.inner.state.lock().await;
            state.ticks += 1;
            state.last_tick = Some(now);
        }

        if now.minute() % self.inner.throttle_minutes != 0 {
            return Ok(TickReport {
                throttled: true,
                ..Default::default()
            });
        }

        self.run_checks(now).await
    }

    /// Both passes over every cached client, without the throttle.
    pub async fn run_checks(&self, now: DateTime<Utc>) -> SchedulerResult<TickReport> {
        let cached_empty = self.inner.state.lock().await.clients.is_empty();
        if cached_empty {
            self.reload_clients().await?;
        }
        let clients = self.inner.state.lock().await.clients.clone();

        let mut report = TickReport::default();

        for kind in OperationKind::ALL {
            for client in &clients {
                match self.check(&client.id, kind, now).await {
                    Ok(Some(outcome)) => report.executed.push(ExecutedOperation {
                        client_id: client.id.clone(),
                        kind,
                        outcome,
                    }),
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        error!(client_id = %client.id, %kind, error = %e, "Client check failed");
                        let message = e.to_string();
                        self.inner.emitter.emit_error(&client.id, &message);
                        self.inner.state.lock().await.last_error = Some(message.clone());
                        report.failures.push(ClientFailure {
                            client_id: client.id.clone(),
                            kind,
                            message,
                        });
                    }
                }
            }
        }

        debug!(
            clients = clients.len(),
            executed = report.executed.len(),
            failures = report.failures.len(),
            "Checks complete"
        );
        Ok(report)
    }

    async fn check(
        &self,
        client_id: &str,
        kind: OperationKind,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Option<TransitionOutcome>> {
        match self.inner.evaluator.evaluate(client_id, kind, now).await? {
            Decision::Execute { period } => {
                debug!(client_id = %client_id, %kind, period = %period.label, "Executing");
                let outcome = match kind {
                    OperationKind::Open => self.inner.registers.auto_open(client_id).await?,
                    OperationKind::Close => self.inner.registers.auto_close(client_id).await?,
                };
                Ok(Some(outcome))
            }
            Decision::Skip(reason) => {
                debug!(client_id = %client_id, %kind, %reason, "Skipped");
                Ok(None)
            }
        }
    }

    /// Kills the timer task without clearing `desired_running`.
    #[cfg(test)]
    pub(crate) async fn kill_timer(&self) {
        let timer = self.inner.state.lock().await.timer.take();
        if let Some(timer) = timer {
            timer.abort();
            let _ = timer.await;
        }
    }
}
