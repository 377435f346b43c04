//! The amount model: native integer drops and issued (currency, issuer,
//! mantissa, exponent) amounts, per `spec.md` §3–§4.1.

pub mod number;
pub mod quality;

pub use number::Number;
pub use quality::Quality;

use serde::{Deserialize, Serialize};

use crate::account::Issue;
use crate::error::{EngineError, EngineResult};

/// A tagged-union amount: either a signed count of indivisible native
/// units (drops) or a signed issued amount tied to one [`Issue`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Amount {
    /// A signed count of drops.
    Native(i64),
    /// An issued amount: a signed [`Number`] paired with its issue.
    Issued { issue: Issue, value: Number },
}

impl Amount {
    /// The native zero amount.
    pub fn zero_native() -> Amount {
        Amount::Native(0)
    }

    /// The issued zero amount for the given issue.
    pub fn zero_issued(issue: Issue) -> Amount {
        Amount::Issued {
            issue,
            value: Number::ZERO,
        }
    }

    /// The issue this amount is denominated in.
    pub fn issue(&self) -> Issue {
        match self {
            Amount::Native(_) => Issue::native(),
            Amount::Issued { issue, .. } => *issue,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Amount::Native(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Amount::Native(drops) => *drops == 0,
            Amount::Issued { value, .. } => value.is_zero(),
        }
    }

    /// -1, 0, or 1.
    pub fn signum(&self) -> i8 {
        match self {
            Amount::Native(drops) => drops.signum() as i8,
            Amount::Issued { value, .. } => value.signum(),
        }
    }

    pub fn negate(&self) -> Amount {
        match self {
            Amount::Native(drops) => Amount::Native(-drops),
            Amount::Issued { issue, value } => Amount::Issued {
                issue: *issue,
                value: value.negate(),
            },
        }
    }

    fn check_same_issue(&self, other: &Amount) -> EngineResult<()> {
        if self.issue() == other.issue() {
            Ok(())
        } else {
            Err(EngineError::MismatchedIssue)
        }
    }

    /// Native arithmetic is plain integer arithmetic (overflow is an
    /// error, per `spec.md` §4.1). Issued arithmetic on mismatched issues
    /// is rejected rather than left undefined — the spec requires the
    /// *caller* to prevent it, and this is the engine's one enforcement
    /// point.
    pub fn add(&self, other: &Amount) -> EngineResult<Amount> {
        self.check_same_issue(other)?;
        match (self, other) {
            (Amount::Native(a), Amount::Native(b)) => a
                .checked_add(*b)
                .map(Amount::Native)
                .ok_or(EngineError::AmountOverflow("native add overflow")),
            (Amount::Issued { issue, value: a }, Amount::Issued { value: b, .. }) => {
                Ok(Amount::Issued {
                    issue: *issue,
                    value: a.add(b)?,
                })
            }
            _ => unreachable!("check_same_issue rules out mixed native/issued"),
        }
    }

    pub fn sub(&self, other: &Amount) -> EngineResult<Amount> {
        self.check_same_issue(other)?;
        match (self, other) {
            (Amount::Native(a), Amount::Native(b)) => a
                .checked_sub(*b)
                .map(Amount::Native)
                .ok_or(EngineError::AmountOverflow("native sub overflow")),
            (Amount::Issued { issue, value: a }, Amount::Issued { value: b, .. }) => {
                Ok(Amount::Issued {
                    issue: *issue,
                    value: a.sub(b)?,
                })
            }
            _ => unreachable!("check_same_issue rules out mixed native/issued"),
        }
    }

    /// `self * num / den`, with the sign of the result equal to the sign
    /// of `self`. See [`Number::mul_ratio`] for the rounding contract;
    /// native amounts floor/ceil to the nearest whole drop.
    pub fn mul_ratio(&self, num: u64, den: u64, round_up: bool) -> EngineResult<Amount> {
        match self {
            Amount::Native(drops) => {
                if den == 0 {
                    return Err(EngineError::Invariant("mul_ratio with zero denominator"));
                }
                let sign = drops.signum() as i128;
                let numerator = (*drops as i128).unsigned_abs() as i128 * num as i128;
                let mut quotient = numerator / den as i128;
                if round_up && numerator % (den as i128) != 0 {
                    quotient += 1;
                }
                let signed = sign * quotient;
                i64::try_from(signed)
                    .map(Amount::Native)
                    .map_err(|_| EngineError::AmountOverflow("native mul_ratio overflow"))
            }
            Amount::Issued { issue, value } => Ok(Amount::Issued {
                issue: *issue,
                value: value.mul_ratio(num, den, round_up)?,
            }),
        }
    }

    /// Magnitude as a [`Number`], for quality computation (same issue or
    /// native, always non-negative).
    pub fn magnitude(&self) -> Number {
        match self {
            Amount::Native(drops) => {
                Number::from_decimal_str(&drops.unsigned_abs().to_string()).unwrap_or(Number::ZERO)
            }
            Amount::Issued { value, .. } => {
                if value.signum() < 0 {
                    value.negate()
                } else {
                    *value
                }
            }
        }
    }

    /// Float conversion for ordering heuristics only — never use this for
    /// settlement arithmetic (`spec.md` §9).
    pub fn to_f64(&self) -> f64 {
        match self {
            Amount::Native(drops) => *drops as f64,
            Amount::Issued { value, .. } => value.to_f64(),
        }
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.issue() != other.issue() {
            return None;
        }
        match (self, other) {
            (Amount::Native(a), Amount::Native(b)) => a.partial_cmp(b),
            (Amount::Issued { value: a, .. }, Amount::Issued { value: b, .. }) => {
                a.partial_cmp(b)
            }
            _ => None,
        }
    }
}
