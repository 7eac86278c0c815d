//! # Scheduler Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Scheduler Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Storage       │  │     Domain              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Database       │  │  Core                   │ │
//! │  │  ConfigLoad     │  │  (DbError)      │  │  NotFound               │ │
//! │  │  ConfigSave     │  │                 │  │  Validation             │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │   Lifecycle     │   "Already open" / "already closed" are NOT       │
//! │  │                 │   errors. They come back as TransitionOutcome.    │
//! │  │  AlreadyRunning │                                                   │
//! │  │  Export         │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use caja_core::{CoreError, ValidationError};
use caja_db::DbError;

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage / Domain Errors
    // =========================================================================
    /// Repository call failed.
    ///
    /// ## When This Occurs
    /// - Connection lost or pool exhausted mid-tick
    /// - Constraint violation the lifecycle did not anticipate
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// `start()` called while the loop's timer task is alive.
    #[error("Automation loop is already running")]
    AlreadyRunning,

    /// Report export failed. The close that produced the report still succeeds.
    #[error("Report export failed: {0}")]
    ExportFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for SchedulerError {
    fn from(err: ValidationError) -> Self {
        SchedulerError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SchedulerError {
    fn from(err: toml::de::Error) -> Self {
        SchedulerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SchedulerError {
    fn from(err: toml::ser::Error) -> Self {
        SchedulerError::ConfigSaveFailed(err.to_string())
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Core(CoreError::from(err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SchedulerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SchedulerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            SchedulerError::NotFound { .. } => true,
            SchedulerError::Database(db) => db.is_not_found(),
            _ => false,
        }
    }

    /// True for rejected input: bad hour, day list, timezone, exchange rate.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(DbError::Validation(_))
                | SchedulerError::Core(CoreError::Validation(_))
                | SchedulerError::Core(CoreError::UnknownTimezone(_))
                | SchedulerError::Core(CoreError::InvalidExchangeRate(_))
        )
    }

    /// True if the next tick may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SchedulerError::Database(db) => db.is_transient(),
            SchedulerError::ExportFailed(_) => true,
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidConfig(_)
                | SchedulerError::ConfigLoadFailed(_)
                | SchedulerError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert!(SchedulerError::not_found("SchedulePeriod", "p1").is_not_found());
        assert!(SchedulerError::Database(DbError::not_found("SchedulePeriod", "p1")).is_not_found());

        let invalid = SchedulerError::from(ValidationError::OutOfRange {
            field: "open_hour".into(),
            min: 0,
            max: 23,
        });
        assert!(invalid.is_validation());
        assert!(!invalid.is_retryable());

        assert!(SchedulerError::Database(DbError::PoolExhausted).is_retryable());
        assert!(SchedulerError::InvalidConfig("x".into()).is_config_error());
        assert!(!SchedulerError::AlreadyRunning.is_config_error());
    }

    #[test]
    fn test_display_is_transparent_for_db() {
        let err = SchedulerError::Database(DbError::not_found("CashRegister", "r-9"));
        assert!(err.to_string().contains("r-9"));
    }
}
