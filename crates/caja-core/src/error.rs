//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caja-scheduler errors                                                 │
//! │  └── SchedulerError   - What the loop and admin surface see            │
//! │                                                                         │
//! │  Flow: ValidationError → DbError → SchedulerError → operator / log     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Exchange rate is zero or negative, so ARS amounts cannot be normalized.
    #[error("Invalid exchange rate: {0} ARS minor units per USD")]
    InvalidExchangeRate(i64),

    /// Timezone identifier is not a known IANA zone.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The structured report payload could not be serialized.
    #[error("Report serialization failed: {0}")]
    Serialization(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the Period Store boundary, before anything reaches the
/// evaluator or the automation loop.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed day list).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "client_id".to_string(),
        };
        assert_eq!(err.to_string(), "client_id is required");

        let err = ValidationError::OutOfRange {
            field: "open_hour".to_string(),
            min: 0,
            max: 23,
        };
        assert_eq!(err.to_string(), "open_hour must be between 0 and 23");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "label".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_exchange_rate_message() {
        let err = CoreError::InvalidExchangeRate(0);
        assert_eq!(
            err.to_string(),
            "Invalid exchange rate: 0 ARS minor units per USD"
        );
    }
}
