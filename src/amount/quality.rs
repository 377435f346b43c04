//! Quality: the input-per-output exchange rate of a step or strand,
//! encoded as an ordered scalar where *lower is better for the taker*.
//!
//! Composition of two qualities approximates the product of their
//! underlying ratios (`spec.md` §3, §4.1). The computation mirrors
//! `other_examples/utils/txn_parser/utils/order_book_parser.rs::get_quality`,
//! which derives a book offer's quality as `taker_pays / taker_gets` via
//! `BigDecimal` division — here generalized to `in / out` (equivalently,
//! the ratio a taker pays in input per unit of output received), which is
//! monotonically increasing in `in/out` as the spec's §4.1 invariant
//! requires. Both the ratio and its composition are exact `BigDecimal`
//! arithmetic (`Number::div_exact`/`mul_exact`): this value drives strand
//! selection and `quality_limit` gating, not just display, so it never
//! touches `f64`.

use super::number::Number;
use crate::error::EngineResult;

/// An exchange-rate scalar: `in` units of input consumed per `out` unit of
/// output produced. Lower is better for the taker. The identity quality is
/// "one unit in per one unit out".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Quality(QualityValue);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum QualityValue {
    /// A finite, strictly positive ratio.
    Ratio(Number),
    /// Either `in` or `out` was zero: the worst possible quality, ordered
    /// above every finite ratio.
    Worst,
}

impl Quality {
    /// The identity quality: one unit in per one unit out.
    pub fn identity() -> Quality {
        Quality(QualityValue::Ratio(
            Number::from_decimal_str("1").expect("identity quality is representable"),
        ))
    }

    /// The worst possible quality — always sorts as worse than any finite
    /// ratio, per `spec.md` §4.1: "when either is zero the quality is
    /// worst possible".
    pub fn worst() -> Quality {
        Quality(QualityValue::Worst)
    }

    /// Construct the quality of moving `in_amount` to produce
    /// `out_amount`, both taken as unsigned magnitudes (callers pass the
    /// absolute value of signed amounts).
    pub fn from_amounts(in_value: Number, out_value: Number) -> Quality {
        if in_value.is_zero() || out_value.is_zero() {
            return Quality::worst();
        }
        // Exact rational ratio in/out via BigDecimal division, the way the
        // teacher pack's order-book parser computes an offer's quality.
        match in_value.div_exact(&out_value) {
            Ok(n) if !n.is_zero() => Quality(QualityValue::Ratio(n)),
            _ => Quality::worst(),
        }
    }

    /// Compose two qualities end-to-end (the quality of a strand whose
    /// steps individually have `self` and `other`), the exact product of
    /// the underlying ratios.
    pub fn compose(&self, other: &Quality) -> EngineResult<Quality> {
        match (self.0, other.0) {
            (QualityValue::Ratio(a), QualityValue::Ratio(b)) => {
                let n = a.mul_exact(&b)?;
                if n.is_zero() {
                    Ok(Quality::worst())
                } else {
                    Ok(Quality(QualityValue::Ratio(n)))
                }
            }
            _ => Ok(Quality::worst()),
        }
    }

    /// True if this quality is strictly better than `limit` — i.e. the
    /// taker pays less input per unit output than the limit allows.
    pub fn better_than_or_equal(&self, limit: &Quality) -> bool {
        self <= limit
    }

    pub fn is_worst(&self) -> bool {
        matches!(self.0, QualityValue::Worst)
    }
}
