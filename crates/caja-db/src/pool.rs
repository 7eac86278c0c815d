//! # Database Pool
//!
//! One SQLite pool per process, shared by the automation loop and admin
//! callers. A second daemon on the same file gets its own pool; the
//! conditional register updates keep the two consistent.
//!
//! Connections run in WAL mode with foreign keys on. Migrations run on
//! connect unless disabled.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cash_register::CashRegisterRepository;
use crate::repository::client::ClientRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::operation_log::OperationLogRepository;
use crate::repository::report::ReportRepository;
use crate::repository::schedule::ScheduleRepository;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// One loop plus a handful of admin callers.
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// The file is created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Private in-memory database. Single connection, so every repository
    /// sees the same schema.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Cheap to clone; every accessor hands out a repository over the same pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./caja.db")).await?;
/// let open = db.cash_registers().get_for_date("client-1", today).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = if config.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", config.database_path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL under WAL may drop the last commit on power loss, never corrupts
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Called by [`Database::new`] unless disabled.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the client repository.
    pub fn clients(&self) -> ClientRepository {
        ClientRepository::new(self.pool.clone())
    }

    /// Schedule periods and per-client config.
    pub fn schedules(&self) -> ScheduleRepository {
        ScheduleRepository::new(self.pool.clone())
    }

    /// Returns the append-only operation log.
    pub fn operation_log(&self) -> OperationLogRepository {
        OperationLogRepository::new(self.pool.clone())
    }

    /// Returns the cash register repository.
    pub fn cash_registers(&self) -> CashRegisterRepository {
        CashRegisterRepository::new(self.pool.clone())
    }

    /// Returns the daily report repository.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Returns the ledger read side.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Closes the pool on shutdown. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
