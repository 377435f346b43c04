//! Error types and the terminal result-code taxonomy.
//!
//! [`EngineError`] is the engine's internal, typed error channel: it covers
//! programming errors and `LedgerView` I/O failures, categories that §7 of
//! the spec calls "internal invariants violated" — they are always fatal
//! and must never be coerced into [`ResultCode::Success`].
//!
//! [`ResultCode`] is the taxonomy a payment actually finishes with. It is
//! the primary channel a caller should inspect; `EngineError` only surfaces
//! when something the engine assumed unreachable actually happened, and at
//! that point it collapses to [`ResultCode::Internal`].

use strum_macros::{AsRefStr, Display, EnumIter};
use thiserror::Error;

/// Internal engine error. Never represents a normal payment outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Native or issued arithmetic overflowed its representable range.
    #[error("amount overflow: {0}")]
    AmountOverflow(&'static str),
    /// An issued amount's mantissa/exponent fell outside the representable
    /// range after normalization.
    #[error("amount out of range: mantissa={mantissa} exponent={exponent}")]
    AmountOutOfRange { mantissa: i128, exponent: i32 },
    /// Arithmetic was attempted between issued amounts of different issues.
    #[error("mismatched issue in arithmetic")]
    MismatchedIssue,
    /// The consumer's `LedgerView` returned bytes that failed to decode as
    /// the expected ledger entry.
    #[error("ledger entry decode failed at key {0}")]
    MalformedEntry(String),
    /// A sandbox frame was applied to a frame that was not its immediate
    /// parent.
    #[error("sandbox frame applied to the wrong parent")]
    WrongParentFrame,
    /// An invariant the strand executor or flow driver assumed always
    /// holds did not.
    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),
}

/// Convenience alias for fallible engine-internal operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Terminal result code for a payment attempt.
///
/// This is the taxonomy shared with the enclosing transaction framework
/// (`spec.md` §6). Lower-level step/strand failures are folded into one of
/// these by the strand builder or the flow driver; no other code escapes
/// the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
pub enum ResultCode {
    /// The full requested amount was delivered.
    Success,
    /// Partial-payment was permitted and some, but not all, of the
    /// requested amount was delivered.
    PathPartial,
    /// No strand delivered anything.
    PathDry,
    /// A required trust line does not exist.
    NoLine,
    /// The issuer requires authorization and the holder is not authorized.
    NoAuth,
    /// The destination account does not exist.
    NoDst,
    /// The destination does not exist and the payment is too small to
    /// fund its reserve.
    NoDstInsufNative,
    /// The source cannot fund the payment at all.
    UnfundedPayment,
    /// The requested or supplied path is structurally invalid.
    BadPath,
    /// The requested or supplied path contains a loop.
    BadPathLoop,
    /// An amount field is malformed (wrong sign, wrong issue, etc).
    BadAmount,
    /// The destination requires a destination tag and none was supplied.
    DstTagNeeded,
    /// The payment is blocked by deposit authorization.
    NoPermission,
    /// An internal invariant was violated; never a normal outcome.
    Internal,
    /// The transaction's `LastLedgerSequence` has passed.
    Expired,
}

impl ResultCode {
    /// True for codes under which the sandbox produced by the engine should
    /// be discarded rather than applied to the enclosing ledger view.
    ///
    /// Per `spec.md` §7: structural/malformed and precondition-on-ledger-
    /// state codes, plus complete dryness and internal-invariant failures,
    /// are all fatal — none retain mutations. Only `Success` and
    /// `PathPartial` retain them.
    pub fn discards_sandbox(self) -> bool {
        !matches!(self, ResultCode::Success | ResultCode::PathPartial)
    }

    /// True if this code represents some value having actually moved.
    pub fn delivered_something(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::PathPartial)
    }
}

impl From<EngineError> for ResultCode {
    fn from(_: EngineError) -> Self {
        ResultCode::Internal
    }
}
