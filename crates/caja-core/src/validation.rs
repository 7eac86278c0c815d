//! # Validation Module
//!
//! Input validation for schedule configuration.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin surface (deserialization)                              │
//! │  ├── Type checks (u8 hours, bools)                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Period Store boundary                                        │
//! │  └── THIS MODULE: ranges, day lists, IANA zones                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on hour / minute / day                          │
//! │  └── UNIQUE (client_id, date) on registers and reports                 │
//! │                                                                         │
//! │  Nothing invalid ever reaches the evaluator or the automation loop.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::validation::{parse_day_list, validate_hour};
//!
//! assert_eq!(parse_day_list("1, 3,5").unwrap(), vec![1, 3, 5]);
//! assert!(validate_hour("open_hour", 24).is_err());
//! ```

use chrono_tz::Tz;

use crate::error::ValidationError;
use crate::types::{NewSchedulePeriod, SchedulePeriod};
use crate::MAX_NOTIFICATION_LEAD_MINUTES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_LABEL_LEN: usize = 100;
const MAX_ID_LEN: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a client identifier (non-empty, at most 64 chars).
pub fn validate_client_id(client_id: &str) -> ValidationResult<()> {
    let client_id = client_id.trim();

    if client_id.is_empty() {
        return Err(ValidationError::Required {
            field: "client_id".to_string(),
        });
    }

    if client_id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "client_id".to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a period label.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
pub fn validate_label(label: &str) -> ValidationResult<()> {
    let label = label.trim();

    if label.is_empty() {
        return Err(ValidationError::Required {
            field: "label".to_string(),
        });
    }

    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: "label".to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    Ok(())
}

/// Parses and validates an IANA timezone identifier.
///
/// ```rust
/// use caja_core::validation::validate_timezone;
///
/// assert!(validate_timezone("America/Argentina/Buenos_Aires").is_ok());
/// assert!(validate_timezone("Mars/Olympus_Mons").is_err());
/// ```
pub fn validate_timezone(timezone: &str) -> ValidationResult<Tz> {
    timezone
        .trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidFormat {
            field: "timezone".to_string(),
            reason: format!("'{}' is not an IANA timezone identifier", timezone),
        })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an hour of day (0-23).
pub fn validate_hour(field: &str, hour: u8) -> ValidationResult<()> {
    if hour > 23 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 23,
        });
    }
    Ok(())
}

/// Validates a minute of hour (0-59).
pub fn validate_minute(field: &str, minute: u8) -> ValidationResult<()> {
    if minute > 59 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 59,
        });
    }
    Ok(())
}

/// Validates an ISO day of week (1 = Monday .. 7 = Sunday).
pub fn validate_day_of_week(day: u8) -> ValidationResult<()> {
    if !(1..=7).contains(&day) {
        return Err(ValidationError::OutOfRange {
            field: "day_of_week".to_string(),
            min: 1,
            max: 7,
        });
    }
    Ok(())
}

pub fn validate_notification_lead(minutes: u32) -> ValidationResult<()> {
    if minutes > MAX_NOTIFICATION_LEAD_MINUTES {
        return Err(ValidationError::OutOfRange {
            field: "notification_lead_minutes".to_string(),
            min: 0,
            max: MAX_NOTIFICATION_LEAD_MINUTES as i64,
        });
    }
    Ok(())
}

/// Parses a comma-separated day list such as `"1,2,3,4,5"`.
///
/// ## Rules
/// - At least one day
/// - Every entry is an integer in 1..=7
/// - No day repeated
///
/// Order of first appearance is preserved.
pub fn parse_day_list(days: &str) -> ValidationResult<Vec<u8>> {
    let mut parsed = Vec::new();

    for raw in days.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let day: u8 = raw.parse().map_err(|_| ValidationError::InvalidFormat {
            field: "days".to_string(),
            reason: format!("'{}' is not a day number", raw),
        })?;
        validate_day_of_week(day)?;

        if parsed.contains(&day) {
            return Err(ValidationError::InvalidFormat {
                field: "days".to_string(),
                reason: format!("day {} listed more than once", day),
            });
        }
        parsed.push(day);
    }

    if parsed.is_empty() {
        return Err(ValidationError::Required {
            field: "days".to_string(),
        });
    }

    Ok(parsed)
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a create request and returns the expanded day list.
pub fn validate_new_period(input: &NewSchedulePeriod) -> ValidationResult<Vec<u8>> {
    validate_client_id(&input.client_id)?;
    validate_label(&input.label)?;
    validate_hour("open_hour", input.open_hour)?;
    validate_minute("open_minute", input.open_minute)?;
    validate_hour("close_hour", input.close_hour)?;
    validate_minute("close_minute", input.close_minute)?;
    parse_day_list(&input.days)
}

/// Validates a stored (or merged) period.
pub fn validate_period(period: &SchedulePeriod) -> ValidationResult<()> {
    validate_label(&period.label)?;
    validate_day_of_week(period.day_of_week)?;
    validate_hour("open_hour", period.open_hour)?;
    validate_minute("open_minute", period.open_minute)?;
    validate_hour("close_hour", period.close_hour)?;
    validate_minute("close_minute", period.close_minute)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn new_period(days: &str) -> NewSchedulePeriod {
        NewSchedulePeriod {
            client_id: "client-1".to_string(),
            days: days.to_string(),
            label: "Weekdays".to_string(),
            open_hour: 9,
            open_minute: 0,
            close_hour: 18,
            close_minute: 30,
            auto_open_enabled: true,
            auto_close_enabled: true,
            priority: 0,
        }
    }

    #[test]
    fn test_hour_and_minute_ranges() {
        assert!(validate_hour("open_hour", 0).is_ok());
        assert!(validate_hour("open_hour", 23).is_ok());
        assert!(validate_hour("open_hour", 24).is_err());
        assert!(validate_minute("open_minute", 59).is_ok());
        assert!(validate_minute("open_minute", 60).is_err());
    }

    #[test]
    fn test_day_list() {
        assert_eq!(parse_day_list("1,2,3,4,5").unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_day_list(" 7 ,1").unwrap(), vec![7, 1]);
        assert!(parse_day_list("").is_err());
        assert!(parse_day_list("0").is_err());
        assert!(parse_day_list("8").is_err());
        assert!(parse_day_list("1,x").is_err());
        assert!(parse_day_list("2,2").is_err());
    }

    #[test]
    fn test_new_period_validation() {
        assert_eq!(validate_new_period(&new_period("6,7")).unwrap(), vec![6, 7]);

        let mut bad = new_period("1");
        bad.close_minute = 75;
        let err = validate_new_period(&bad).unwrap_err();
        assert_eq!(err.to_string(), "close_minute must be between 0 and 59");

        let mut unnamed = new_period("1");
        unnamed.label = "  ".to_string();
        assert!(matches!(
            validate_new_period(&unnamed),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_timezone() {
        assert!(validate_timezone("UTC").is_ok());
        assert!(validate_timezone("Europe/Madrid").is_ok());
        assert!(validate_timezone("GMT-3 Buenos Aires").is_err());
    }

    #[test]
    fn test_label_length() {
        assert!(validate_label(&"a".repeat(100)).is_ok());
        assert!(validate_label(&"a".repeat(101)).is_err());
    }
}
