//! # Money Module
//!
//! Integer money, rates and the three register currencies.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    USD / USDT → cents         ARS → centavos                           │
//! │    Conversion ARS → USD happens once, with explicit rounding            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::money::{Currency, ExchangeRate, Money, Rate};
//!
//! let rate = ExchangeRate::from_ars_minor_per_usd(100_000).unwrap(); // 1000.00 ARS = 1 USD
//! let usd = rate.to_usd(Money::from_cents(250_000), Currency::Ars);   // 2500.00 ARS
//! assert_eq!(usd.cents(), 250);                                      // $2.50
//!
//! let commission = Money::from_cents(3000).apply_rate(Rate::from_bps(1000));
//! assert_eq!(commission.cents(), 300);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (cents for USD/USDT, centavos for ARS).
///
/// Money carries no currency of its own; callers pair it with a [`Currency`]
/// and normalize through [`ExchangeRate::to_usd`] before aggregating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts, only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a rate in basis points, rounding half away from zero.
    ///
    /// Used for commissions and margin estimates:
    /// `(amount * bps ± 5000) / 10000`.
    ///
    /// ```rust
    /// use caja_core::money::{Money, Rate};
    ///
    /// let sales = Money::from_cents(1000);
    /// assert_eq!(sales.apply_rate(Rate::from_bps(825)).cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money::from_cents(rounded as i64)
    }

    /// Returns `part / self` as a percentage (0.0 when self is zero).
    ///
    /// Display-only ratio; never fed back into money math.
    pub fn percentage_of(&self, part: Money) -> f64 {
        if self.0 == 0 {
            return 0.0;
        }
        (part.0 as f64 / self.0 as f64) * 100.0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage expressed in basis points (1 bp = 0.01%).
///
/// 3000 bps = 30% (the default margin heuristic), 1000 bps = 10% commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a whole-number percentage (10 → 10%).
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        Rate(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Currency
// =============================================================================

/// The three currencies a register tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Ars,
    Usdt,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Ars, Currency::Usdt];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Ars => "ARS",
            Currency::Usdt => "USDT",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Daily blended exchange rate: ARS minor units per 1 USD.
///
/// 125_050 means 1 USD = 1250.50 ARS. USDT is treated 1:1 with USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Creates a rate, rejecting zero and negative values.
    pub fn from_ars_minor_per_usd(value: i64) -> CoreResult<Self> {
        if value <= 0 {
            return Err(CoreError::InvalidExchangeRate(value));
        }
        Ok(ExchangeRate(value))
    }

    #[inline]
    pub const fn ars_minor_per_usd(&self) -> i64 {
        self.0
    }

    /// Normalizes an amount in `currency` to USD cents.
    ///
    /// ARS → USD: `ars_minor * 100 / rate`, rounded half away from zero.
    pub fn to_usd(&self, amount: Money, currency: Currency) -> Money {
        match currency {
            Currency::Usd | Currency::Usdt => amount,
            Currency::Ars => {
                let numerator = amount.cents() as i128 * 100;
                let rate = self.0 as i128;
                let half = rate / 2;
                let cents = if numerator >= 0 {
                    (numerator + half) / rate
                } else {
                    (numerator - half) / rate
                };
                Money::from_cents(cents as i64)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::zero()), "$0.00");
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, -50]
            .into_iter()
            .map(Money::from_cents)
            .sum();
        assert_eq!(total.cents(), 300);
    }

    #[test]
    fn test_apply_rate_rounding() {
        assert_eq!(Money::from_cents(1000).apply_rate(Rate::from_bps(825)).cents(), 83);
        assert_eq!(Money::from_cents(-1000).apply_rate(Rate::from_bps(825)).cents(), -83);
        assert_eq!(Money::from_cents(15_000).apply_rate(Rate::from_percent(30)).cents(), 4500);
    }

    #[test]
    fn test_percentage_of() {
        let total = Money::from_cents(200);
        assert!((total.percentage_of(Money::from_cents(50)) - 25.0).abs() < f64::EPSILON);
        assert_eq!(Money::zero().percentage_of(Money::from_cents(10)), 0.0);
    }

    #[test]
    fn test_exchange_rate_rejects_non_positive() {
        assert!(ExchangeRate::from_ars_minor_per_usd(0).is_err());
        assert!(ExchangeRate::from_ars_minor_per_usd(-5).is_err());
        assert!(ExchangeRate::from_ars_minor_per_usd(1).is_ok());
    }

    #[test]
    fn test_to_usd() {
        let rate = ExchangeRate::from_ars_minor_per_usd(100_000).unwrap();
        assert_eq!(rate.to_usd(Money::from_cents(5000), Currency::Usd).cents(), 5000);
        assert_eq!(rate.to_usd(Money::from_cents(5000), Currency::Usdt).cents(), 5000);
        // 1500.00 ARS at 1000 ARS/USD = $1.50
        assert_eq!(rate.to_usd(Money::from_cents(150_000), Currency::Ars).cents(), 150);
        // 0.005 USD rounds away from zero
        assert_eq!(rate.to_usd(Money::from_cents(500), Currency::Ars).cents(), 1);
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::Usdt.to_string(), "USDT");
        assert_eq!(serde_json::to_string(&Currency::Ars).unwrap(), "\"ars\"");
    }
}
