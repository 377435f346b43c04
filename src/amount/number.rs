//! A base-10 floating mantissa/exponent decimal, shared by issued amounts
//! and by [`super::quality::Quality`].
//!
//! The representation and its normalization loop follow the teacher
//! crate's `_serialize_issued_currency_value` (`core/types/amount.rs`):
//! a normalized mantissa lives in `[MIN_MANTISSA, MAX_MANTISSA]` and the
//! exponent is clamped to `[MIN_EXPONENT, MAX_EXPONENT]`, with zero
//! represented by a dedicated sentinel rather than a degenerate
//! mantissa/exponent pair.

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Lower bound (inclusive) of a normalized non-zero mantissa.
pub const MIN_MANTISSA: i128 = 1_000_000_000_000_000;
/// Upper bound (inclusive) of a normalized non-zero mantissa.
pub const MAX_MANTISSA: i128 = 9_999_999_999_999_999;
/// Lower bound (inclusive) of a representable exponent.
pub const MIN_EXPONENT: i32 = -96;
/// Upper bound (inclusive) of a representable exponent.
pub const MAX_EXPONENT: i32 = 80;

/// A signed decimal value `mantissa * 10^exponent`, normalized so that a
/// non-zero mantissa always has exactly 16 significant digits.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Number {
    /// Zero if and only if the value is zero; otherwise
    /// `MIN_MANTISSA <= |mantissa| <= MAX_MANTISSA`, carrying the value's
    /// sign.
    mantissa: i128,
    exponent: i32,
}

impl Number {
    /// The additive identity.
    pub const ZERO: Number = Number {
        mantissa: 0,
        exponent: 0,
    };

    /// Construct directly from a mantissa/exponent pair, normalizing it.
    pub fn from_parts(mantissa: i128, exponent: i32) -> EngineResult<Number> {
        Number { mantissa, exponent }.normalized()
    }

    /// Parse a decimal string (e.g. `"100.50"`, `"-0.0001"`) into a
    /// `Number`, via `rust_decimal` the same way the teacher crate parses
    /// issued-currency values in `core/types/amount.rs`.
    pub fn from_decimal_str(s: &str) -> EngineResult<Number> {
        let decimal = Decimal::from_str(s)
            .map_err(|_| EngineError::Invariant("malformed decimal amount literal"))?;
        Number::from_rust_decimal(decimal)
    }

    fn from_rust_decimal(decimal: Decimal) -> EngineResult<Number> {
        if decimal.is_zero() {
            return Ok(Number::ZERO);
        }
        let sign = if decimal.is_sign_negative() { -1i128 } else { 1i128 };
        let mantissa = decimal.mantissa().unsigned_abs() as i128;
        let exponent = -(decimal.scale() as i32);
        Number {
            mantissa: sign * mantissa,
            exponent,
        }
        .normalized()
    }

    /// True iff the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// -1, 0, or 1.
    pub fn signum(&self) -> i8 {
        if self.mantissa > 0 {
            1
        } else if self.mantissa < 0 {
            -1
        } else {
            0
        }
    }

    pub fn negate(&self) -> Number {
        Number {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }

    fn to_bigdecimal(self) -> BigDecimal {
        if self.is_zero() {
            return BigDecimal::zero();
        }
        BigDecimal::new(BigInt::from(self.mantissa), -self.exponent as i64)
    }

    fn from_bigdecimal(value: BigDecimal) -> EngineResult<Number> {
        if value.is_zero() {
            return Ok(Number::ZERO);
        }
        let (big_int, scale) = value.as_bigint_and_exponent();
        let sign = if big_int < BigInt::from(0) { -1i128 } else { 1i128 };
        let digits = big_int.magnitude().to_string();
        let mantissa_abs: i128 = digits
            .parse()
            .map_err(|_| EngineError::AmountOverflow("bigdecimal mantissa exceeds i128"))?;
        Number {
            mantissa: sign * mantissa_abs,
            exponent: -scale as i32,
        }
        .normalized()
    }

    /// Bring `mantissa`/`exponent` into normalized form, rounding to zero
    /// (per the teacher's algorithm) when the magnitude underflows the
    /// representable exponent range, and erroring on overflow.
    fn normalized(mut self) -> EngineResult<Number> {
        if self.mantissa == 0 {
            return Ok(Number::ZERO);
        }
        let sign = if self.mantissa < 0 { -1i128 } else { 1i128 };
        let mut mag = self.mantissa.abs();
        let mut exp = self.exponent;

        while mag < MIN_MANTISSA && exp > MIN_EXPONENT {
            mag *= 10;
            exp -= 1;
        }
        while mag > MAX_MANTISSA {
            if exp >= MAX_EXPONENT {
                return Err(EngineError::AmountOutOfRange {
                    mantissa: self.mantissa,
                    exponent: self.exponent,
                });
            }
            mag /= 10;
            exp += 1;
        }
        if exp < MIN_EXPONENT || mag < MIN_MANTISSA {
            return Ok(Number::ZERO);
        }
        if exp > MAX_EXPONENT {
            return Err(EngineError::AmountOutOfRange {
                mantissa: self.mantissa,
                exponent: self.exponent,
            });
        }
        self.mantissa = sign * mag;
        self.exponent = exp;
        Ok(self)
    }

    pub fn add(&self, other: &Number) -> EngineResult<Number> {
        Number::from_bigdecimal(self.to_bigdecimal() + other.to_bigdecimal())
    }

    pub fn sub(&self, other: &Number) -> EngineResult<Number> {
        Number::from_bigdecimal(self.to_bigdecimal() - other.to_bigdecimal())
    }

    /// Exact product via `BigDecimal` multiplication, no `f64` involved.
    pub(crate) fn mul_exact(&self, other: &Number) -> EngineResult<Number> {
        Number::from_bigdecimal(self.to_bigdecimal() * other.to_bigdecimal())
    }

    /// Exact quotient via `BigDecimal` division, the way
    /// `order_book_parser.rs::get_quality` divides two `BigDecimal`s
    /// directly. `other` must be non-zero.
    pub(crate) fn div_exact(&self, other: &Number) -> EngineResult<Number> {
        if other.is_zero() {
            return Err(EngineError::Invariant("div_exact with zero divisor"));
        }
        Number::from_bigdecimal(self.to_bigdecimal() / other.to_bigdecimal())
    }

    /// `self * num / den`, rounding the magnitude of the exact quotient
    /// toward (`round_up = true`) or away from (`round_up = false`)
    /// infinity, preserving `self`'s sign.
    ///
    /// This is the one contractual rounding primitive the rest of the
    /// engine relies on: §9's open question about transfer-fee rounding at
    /// issued/native boundaries is resolved by always routing through this
    /// function with an explicit `round_up` rather than ad hoc rounding at
    /// call sites.
    pub fn mul_ratio(&self, num: u64, den: u64, round_up: bool) -> EngineResult<Number> {
        if den == 0 {
            return Err(EngineError::Invariant("mul_ratio with zero denominator"));
        }
        if self.is_zero() || num == 0 {
            return Ok(Number::ZERO);
        }
        // Exact integer division at the mantissa's own exponent: the
        // quotient's magnitude is the exact result truncated toward zero
        // (Rust/num-bigint integer division already does this), and a
        // nonzero remainder is exactly the "not exactly representable"
        // condition `mul_ratio`'s contract rounds on.
        let numerator = BigInt::from(self.mantissa) * BigInt::from(num);
        let denominator = BigInt::from(den);
        let quotient = &numerator / &denominator;
        let remainder = &numerator % &denominator;

        let mantissa_bigint = if round_up && !remainder.is_zero() {
            let bump = if self.mantissa >= 0 { 1 } else { -1 };
            quotient + BigInt::from(bump)
        } else {
            quotient
        };

        let mantissa: i128 = mantissa_bigint
            .to_string()
            .parse()
            .map_err(|_| EngineError::AmountOverflow("mul_ratio result exceeds i128"))?;
        Number::from_parts(mantissa, self.exponent)
    }

    /// Exact conversion to an `i64`, for bridging into native-drops
    /// arithmetic. Errors if the value carries a fractional component at
    /// i64 scale or if its magnitude overflows `i64`.
    pub(crate) fn to_i64(&self) -> EngineResult<i64> {
        if self.is_zero() {
            return Ok(0);
        }
        let mut mantissa = self.mantissa;
        let mut exponent = self.exponent;
        while exponent < 0 {
            if mantissa % 10 != 0 {
                return Err(EngineError::Invariant("value is not an integral number of drops"));
            }
            mantissa /= 10;
            exponent += 1;
        }
        while exponent > 0 {
            mantissa = mantissa
                .checked_mul(10)
                .ok_or(EngineError::AmountOverflow("to_i64 overflow"))?;
            exponent -= 1;
        }
        i64::try_from(mantissa).map_err(|_| EngineError::AmountOverflow("to_i64 exceeds i64"))
    }

    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        (self.mantissa as f64) * 10f64.powi(self.exponent)
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bigdecimal().cmp(&other.to_bigdecimal())
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_bigdecimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_and_round_trips_through_display() {
        let n = Number::from_decimal_str("100.50").unwrap();
        assert_eq!(n.to_bigdecimal(), BigDecimal::from_str("100.50").unwrap());
    }

    #[test]
    fn zero_is_the_dedicated_sentinel() {
        let n = Number::from_decimal_str("0").unwrap();
        assert!(n.is_zero());
        assert_eq!(n.mantissa(), 0);
    }

    #[test]
    fn add_then_sub_round_trips() {
        let a = Number::from_decimal_str("37.125").unwrap();
        let b = Number::from_decimal_str("12.875").unwrap();
        let sum = a.add(&b).unwrap();
        let back = sum.sub(&b).unwrap();
        assert_eq!(back.to_bigdecimal(), a.to_bigdecimal());
    }

    #[test]
    fn mul_ratio_round_up_never_smaller_than_exact() {
        let a = Number::from_decimal_str("10").unwrap();
        let down = a.mul_ratio(1, 3, false).unwrap();
        let up = a.mul_ratio(1, 3, true).unwrap();
        assert!(up.to_bigdecimal() >= down.to_bigdecimal());
    }

    #[test]
    fn ordering_matches_bigdecimal_ordering() {
        let a = Number::from_decimal_str("1.5").unwrap();
        let b = Number::from_decimal_str("1.50000001").unwrap();
        assert!(a < b);
    }

    proptest! {
        /// `mul_ratio`'s round-up variant never produces a value smaller
        /// than its round-down variant, for any mantissa/denominator pair
        /// that normalizes cleanly.
        #[test]
        fn mul_ratio_round_up_never_below_round_down(
            mantissa in 1_000_000_000_000_000i128..=9_999_999_999_999_999i128,
            num in 1u64..=1_000_000u64,
            den in 1u64..=1_000_000u64,
        ) {
            let n = Number::from_parts(mantissa, -10).unwrap();
            let down = n.mul_ratio(num, den, false).unwrap();
            let up = n.mul_ratio(num, den, true).unwrap();
            prop_assert!(up.to_bigdecimal() >= down.to_bigdecimal());
        }

        /// Adding a value and subtracting it back is the identity, for any
        /// pair of normalized mantissas sharing a fixed exponent.
        #[test]
        fn add_then_sub_is_identity(
            a_mantissa in -9_999_999_999_999_999i128..=9_999_999_999_999_999i128,
            b_mantissa in -9_999_999_999_999_999i128..=9_999_999_999_999_999i128,
        ) {
            prop_assume!(a_mantissa != 0 && b_mantissa != 0);
            let a = Number::from_parts(a_mantissa, -6).unwrap();
            let b = Number::from_parts(b_mantissa, -6).unwrap();
            let sum = a.add(&b).unwrap();
            let back = sum.sub(&b).unwrap();
            prop_assert_eq!(back.to_bigdecimal(), a.to_bigdecimal());
        }
    }
}
