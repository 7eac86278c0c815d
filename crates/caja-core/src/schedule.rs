//! # Schedule Math
//!
//! Pure wall-clock calculations behind the eligibility evaluator.
//!
//! ## Execution Windows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The loop polls every few minutes, so an exact-minute match would miss │
//! │  the trigger whenever a tick is late. Each operation is eligible from  │
//! │  its target minute through a trailing window (both ends inclusive):    │
//! │                                                                         │
//! │   open 09:00, window 120                                               │
//! │   ──────┬───────────────────────────────────────┬──────────────►       │
//! │       09:00  ████████████████████████████████  11:00                    │
//! │        ✓ 09:00       ✓ 10:59                      ✗ 11:01               │
//! │                                                                         │
//! │   close 18:00, window 60                                               │
//! │   ──────┬──────────────────┬──────────────►                             │
//! │       18:00  ████████████ 19:00                                         │
//! │                                                                         │
//! │  Windows never wrap past midnight: 23:30 + 60 ends at 23:59.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Day of Week
//! Periods are stored with ISO numbering (1 = Monday .. 7 = Sunday).
//! Sunday-zero counting (`num_days_from_sunday`) is remapped so that
//! Sunday evaluates against `day_of_week = 7`.
//!
//! Nothing here reads a clock. Every function takes `now`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::{CashRegister, OperationType, SchedulePeriod};
use crate::{DEFAULT_CLOSE_WINDOW_MINUTES, DEFAULT_OPEN_WINDOW_MINUTES};

// =============================================================================
// Operation Kind
// =============================================================================

/// Open or close. One enum drives a single evaluate/execute path; the
/// per-kind differences live in the accessors below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Open,
    Close,
}

impl OperationKind {
    /// Evaluation order within a tick: every open before any close.
    pub const ALL: [OperationKind; 2] = [OperationKind::Open, OperationKind::Close];

    /// Length of the trailing execution window for this kind.
    pub fn window_minutes(&self, windows: &ExecutionWindows) -> u32 {
        match self {
            OperationKind::Open => windows.open_minutes,
            OperationKind::Close => windows.close_minutes,
        }
    }

    /// Whether `period` allows this kind to run automatically.
    pub fn is_enabled_for(&self, period: &SchedulePeriod) -> bool {
        match self {
            OperationKind::Open => period.auto_open_enabled,
            OperationKind::Close => period.auto_close_enabled,
        }
    }

    /// The minute of day this kind targets in `period`.
    pub fn target_minute(&self, period: &SchedulePeriod) -> u32 {
        match self {
            OperationKind::Open => period.open_minute_of_day(),
            OperationKind::Close => period.close_minute_of_day(),
        }
    }

    /// Log type recorded for this kind.
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationKind::Open => OperationType::AutoOpen,
            OperationKind::Close => OperationType::AutoClose,
        }
    }

    /// True when `register` is already in the state this kind drives to.
    pub fn is_target_state(&self, register: &CashRegister) -> bool {
        match self {
            OperationKind::Open => register.is_open,
            OperationKind::Close => !register.is_open,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Open => f.write_str("open"),
            OperationKind::Close => f.write_str("close"),
        }
    }
}

/// Trailing window lengths, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionWindows {
    pub open_minutes: u32,
    pub close_minutes: u32,
}

impl Default for ExecutionWindows {
    fn default() -> Self {
        ExecutionWindows {
            open_minutes: DEFAULT_OPEN_WINDOW_MINUTES,
            close_minutes: DEFAULT_CLOSE_WINDOW_MINUTES,
        }
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Why an operation will not run right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AutomationDisabled,
    NoPeriodsForDay,
    NoMatchingWindow,
    RecentlyExecuted,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::AutomationDisabled => "automation disabled",
            SkipReason::NoPeriodsForDay => "no periods configured for this day",
            SkipReason::NoMatchingWindow => "no matching window right now",
            SkipReason::RecentlyExecuted => "already executed recently",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Result of evaluating one (client, kind) pair at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Execute { period: SchedulePeriod },
    Skip(SkipReason),
}

impl Decision {
    pub fn is_execute(&self) -> bool {
        matches!(self, Decision::Execute { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Decision::Skip(reason) => Some(*reason),
            Decision::Execute { .. } => None,
        }
    }
}

// =============================================================================
// Wall-Clock Helpers
// =============================================================================

/// Maps Sunday-zero numbering (0 = Sunday .. 6 = Saturday) to ISO (7 = Sunday).
///
/// ```rust
/// use caja_core::schedule::iso_day_of_week;
///
/// assert_eq!(iso_day_of_week(0), 7);
/// assert_eq!(iso_day_of_week(1), 1);
/// assert_eq!(iso_day_of_week(6), 6);
/// ```
#[inline]
pub fn iso_day_of_week(days_from_sunday: u32) -> u8 {
    if days_from_sunday == 0 {
        7
    } else {
        days_from_sunday as u8
    }
}

/// `now` converted to the client's zone.
#[inline]
pub fn local_time(now: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    now.with_timezone(&tz)
}

/// ISO day of week of `now` in `tz`.
pub fn local_day_of_week(now: DateTime<Utc>, tz: Tz) -> u8 {
    iso_day_of_week(local_time(now, tz).weekday().num_days_from_sunday())
}

/// Calendar date of `now` in `tz`. Registers and reports are keyed by it.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    local_time(now, tz).date_naive()
}

/// Minute of day (0..1440) of `now` in `tz`.
pub fn local_minute_of_day(now: DateTime<Utc>, tz: Tz) -> u32 {
    let local = local_time(now, tz);
    local.hour() * 60 + local.minute()
}

/// Inclusive window test. No wrap past midnight.
#[inline]
pub fn in_window(current_minute: u32, target_minute: u32, window_minutes: u32) -> bool {
    current_minute >= target_minute && current_minute <= target_minute + window_minutes
}

/// Local wall time to UTC.
///
/// Ambiguous times (DST fall-back) resolve to the later instant; times in a
/// DST gap fall back to reading the wall time as UTC.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&naive)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// `[start, end)` of `date` in `tz`, as UTC instants.
///
/// `end` is the start of the following day, so callers compare with `< end`.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (
        local_to_utc(date.and_time(chrono::NaiveTime::MIN), tz),
        local_to_utc(next.and_time(chrono::NaiveTime::MIN), tz),
    )
}

// =============================================================================
// Period Selection
// =============================================================================

/// Sorts periods by priority, then by opening time.
pub fn sort_periods(periods: &mut [SchedulePeriod]) {
    periods.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.open_minute_of_day().cmp(&b.open_minute_of_day()))
    });
}

/// Periods whose `kind` window contains `current_minute`, in input order.
///
/// Inactive periods and periods with the kind's flag disabled are skipped.
pub fn matching_periods<'a>(
    periods: &'a [SchedulePeriod],
    kind: OperationKind,
    current_minute: u32,
    windows: &ExecutionWindows,
) -> Vec<&'a SchedulePeriod> {
    periods
        .iter()
        .filter(|p| p.is_active && kind.is_enabled_for(p))
        .filter(|p| in_window(current_minute, kind.target_minute(p), kind.window_minutes(windows)))
        .collect()
}

// =============================================================================
// Upcoming Operations
// =============================================================================

/// A future automatic operation projected from the configured periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpcomingOperation {
    pub period_id: String,
    pub label: String,
    pub kind: OperationKind,
    pub day_of_week: u8,
    #[ts(as = "String")]
    pub scheduled_at: DateTime<Utc>,

    /// Wall time in the client's zone, `YYYY-MM-DD HH:MM`.
    pub local_time: String,
}

/// Projects `periods` across the next 7 local days and returns the first
/// `limit` operations strictly after `now`, earliest first.
pub fn upcoming_operations(
    periods: &[SchedulePeriod],
    tz: Tz,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<UpcomingOperation> {
    let today = local_date(now, tz);
    let mut upcoming = Vec::new();

    for offset in 0..7 {
        let date = today + Duration::days(offset);
        let dow = iso_day_of_week(date.weekday().num_days_from_sunday());

        for period in periods.iter().filter(|p| p.is_active && p.day_of_week == dow) {
            for kind in OperationKind::ALL {
                if !kind.is_enabled_for(period) {
                    continue;
                }

                let minute = kind.target_minute(period);
                let Some(naive) = date.and_hms_opt(minute / 60, minute % 60, 0) else {
                    continue;
                };
                let scheduled_at = local_to_utc(naive, tz);
                if scheduled_at <= now {
                    continue;
                }

                upcoming.push(UpcomingOperation {
                    period_id: period.id.clone(),
                    label: period.label.clone(),
                    kind,
                    day_of_week: dow,
                    scheduled_at,
                    local_time: naive.format("%Y-%m-%d %H:%M").to_string(),
                });
            }
        }
    }

    upcoming.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
    upcoming.truncate(limit);
    upcoming
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Argentina::Buenos_Aires;

    fn period(day: u8, open: (u8, u8), close: (u8, u8)) -> SchedulePeriod {
        let now = Utc::now();
        SchedulePeriod {
            id: format!("p-{}-{}", day, open.0),
            client_id: "c1".to_string(),
            day_of_week: day,
            label: "Shift".to_string(),
            open_hour: open.0,
            open_minute: open.1,
            close_hour: close.0,
            close_minute: close.1,
            auto_open_enabled: true,
            auto_close_enabled: true,
            is_active: true,
            priority: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_open_window_edges() {
        let windows = ExecutionWindows::default();
        let periods = vec![period(1, (9, 0), (18, 0))];

        // 09:00, 10:59 inside; 11:01 outside
        for (minute, expected) in [(540, true), (659, true), (660, true), (661, false), (539, false)] {
            let hits = matching_periods(&periods, OperationKind::Open, minute, &windows);
            assert_eq!(!hits.is_empty(), expected, "minute {}", minute);
        }
    }

    #[test]
    fn test_close_window_is_sixty_minutes() {
        let windows = ExecutionWindows::default();
        let periods = vec![period(1, (9, 0), (18, 0))];

        assert_eq!(matching_periods(&periods, OperationKind::Close, 1140, &windows).len(), 1);
        assert!(matching_periods(&periods, OperationKind::Close, 1141, &windows).is_empty());
    }

    #[test]
    fn test_window_does_not_wrap_midnight() {
        assert!(in_window(1439, 1410, 60));
        assert!(!in_window(10, 1410, 60));
    }

    #[test]
    fn test_disabled_and_inactive_periods_never_match() {
        let windows = ExecutionWindows::default();
        let mut no_open = period(1, (9, 0), (18, 0));
        no_open.auto_open_enabled = false;
        let mut inactive = period(1, (9, 0), (18, 0));
        inactive.is_active = false;

        let periods = vec![no_open, inactive];
        assert!(matching_periods(&periods, OperationKind::Open, 540, &windows).is_empty());
        assert_eq!(matching_periods(&periods, OperationKind::Close, 1080, &windows).len(), 1);
    }

    #[test]
    fn test_sunday_is_seven() {
        // 2024-06-09 is a Sunday; 15:00 UTC is 12:00 in Buenos Aires
        let sunday = utc(2024, 6, 9, 15, 0);
        assert_eq!(local_day_of_week(sunday, Buenos_Aires), 7);
        assert_eq!(local_day_of_week(utc(2024, 6, 10, 15, 0), Buenos_Aires), 1);
    }

    #[test]
    fn test_local_date_crosses_utc_midnight() {
        // 01:30 UTC Monday is still Sunday 22:30 in Buenos Aires (UTC-3)
        let now = utc(2024, 6, 10, 1, 30);
        assert_eq!(local_date(now, Buenos_Aires), NaiveDate::from_ymd_opt(2024, 6, 9).unwrap());
        assert_eq!(local_day_of_week(now, Buenos_Aires), 7);
        assert_eq!(local_minute_of_day(now, Buenos_Aires), 22 * 60 + 30);
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let (start, end) = day_bounds(date, Buenos_Aires);
        assert_eq!(start, utc(2024, 6, 3, 3, 0));
        assert_eq!(end, utc(2024, 6, 4, 3, 0));
    }

    #[test]
    fn test_sort_by_priority_then_open_time() {
        let mut late = period(1, (14, 0), (18, 0));
        late.priority = 0;
        let mut early = period(1, (8, 0), (12, 0));
        early.priority = 0;
        let mut preferred = period(1, (20, 0), (22, 0));
        preferred.priority = -1;

        let mut periods = vec![late, early, preferred];
        sort_periods(&mut periods);
        let opens: Vec<u8> = periods.iter().map(|p| p.open_hour).collect();
        assert_eq!(opens, vec![20, 8, 14]);
    }

    #[test]
    fn test_upcoming_operations_are_future_and_sorted() {
        // Monday 2024-06-03 10:00 local (13:00 UTC)
        let now = utc(2024, 6, 3, 13, 0);
        let periods = vec![period(1, (9, 0), (18, 0)), period(2, (9, 0), (18, 0))];

        let upcoming = upcoming_operations(&periods, Buenos_Aires, now, 10);

        // Monday open already passed; Monday close, Tuesday open, Tuesday close remain
        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].kind, OperationKind::Close);
        assert_eq!(upcoming[0].local_time, "2024-06-03 18:00");
        assert_eq!(upcoming[1].kind, OperationKind::Open);
        assert_eq!(upcoming[1].day_of_week, 2);
        assert!(upcoming.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));

        assert_eq!(upcoming_operations(&periods, Buenos_Aires, now, 1).len(), 1);
    }
}
