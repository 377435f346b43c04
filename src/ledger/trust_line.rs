//! The trust line (`RippleState`) entry: a bilateral credit relationship
//! between two accounts in one currency (`spec.md` §3).
//!
//! Field shape and flag set are grounded on the sibling `xrpl-rust` forks'
//! `RippleState` ledger object
//! (`examples/other_examples/..._LimpidCrypto-xrpl-rust__src-models-ledger-objects-ripple_state.rs.rs`),
//! generalized from XRPL wire fields to the plain values the flow engine
//! needs: a signed balance from the low account's perspective, per-side
//! limits, per-side quality-in/out, and the freeze/no-ripple/auth/reserve
//! flag quartet for each side.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::account::{AccountId, Currency};
use crate::amount::Number;
use crate::ledger::canonical_order;

/// Which side of a trust line an account occupies, after canonical
/// ordering (`spec.md` §3: "the lexicographically smaller account is
/// low").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Low,
    High,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Low => Side::High,
            Side::High => Side::Low,
        }
    }
}

/// Per-side flags and limit on one trust line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustLineSide {
    /// The credit limit this side has extended to the other, owned by
    /// this side.
    pub limit: Number,
    pub quality_in: u32,
    pub quality_out: u32,
    pub no_ripple: bool,
    pub freeze: bool,
    pub authorized: bool,
    /// True if this trust line currently counts against this side's owner
    /// reserve.
    pub reserve: bool,
}

impl TrustLineSide {
    pub fn is_default(&self) -> bool {
        !self.no_ripple
            && !self.freeze
            && self.limit.is_zero()
            && self.quality_in == 0
            && self.quality_out == 0
    }
}

/// A trust line between two accounts in one currency.
///
/// `balance` follows `spec.md` §3's sign convention: positive means the
/// high account owes the low account.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustLine {
    pub low: AccountId,
    pub high: AccountId,
    pub currency: Currency,
    pub balance: Number,
    pub low_side: TrustLineSide,
    pub high_side: TrustLineSide,
    #[serde(default)]
    pub previous_txn_id: Option<[u8; 32]>,
    #[serde(default)]
    pub previous_txn_lgr_seq: u32,
}

impl TrustLine {
    /// Which side `account` occupies, or `None` if it is neither endpoint.
    pub fn side_of(&self, account: AccountId) -> Option<Side> {
        if account == self.low {
            Some(Side::Low)
        } else if account == self.high {
            Some(Side::High)
        } else {
            None
        }
    }

    pub fn side(&self, side: Side) -> &TrustLineSide {
        match side {
            Side::Low => &self.low_side,
            Side::High => &self.high_side,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut TrustLineSide {
        match side {
            Side::Low => &mut self.low_side,
            Side::High => &mut self.high_side,
        }
    }

    pub fn account(&self, side: Side) -> AccountId {
        match side {
            Side::Low => self.low,
            Side::High => self.high,
        }
    }

    /// The balance of this line as observed by `account`: positive means
    /// `account` is owed, negative means `account` owes.
    pub fn balance_from(&self, account: AccountId) -> Option<Number> {
        match self.side_of(account)? {
            Side::Low => Some(self.balance),
            Side::High => Some(self.balance.negate()),
        }
    }

    /// True once both sides have reverted to their default configuration
    /// and the balance is zero, at which point `spec.md` §4.3.2 requires
    /// the engine to delete the line.
    pub fn is_default_state(&self) -> bool {
        self.balance.is_zero() && self.low_side.is_default() && self.high_side.is_default()
    }

    /// Construct a new zero-balance, default-configuration trust line
    /// between `a` and `b`, used when the strand builder needs to reason
    /// about a line's canonical key without one necessarily existing yet.
    pub fn canonical_accounts(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
        canonical_order(a, b)
    }
}
