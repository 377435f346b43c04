//! The account root entry, restricted to the fields the flow engine
//! consumes (`spec.md` §3). Field naming and the `skip_serializing_none`-
//! style optionality follow the teacher pack's ledger-object models (e.g.
//! `models/ledger/objects/offer.rs`), generalized from XRPL wire field
//! names to plain Rust identifiers since wire serialization itself is out
//! of scope (`spec.md` §1).

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::skip_serializing_none;
use strum_macros::{AsRefStr, Display, EnumIter};

use crate::account::AccountId;

/// Boolean account-root flags the engine inspects while routing a
/// payment, at the same bit positions as the ledger's `AccountRoot`
/// flags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Display, AsRefStr, EnumIter,
)]
#[repr(u32)]
pub enum AccountRootFlag {
    /// The password-spent one-time-free-transaction allowance has been
    /// consumed.
    PasswordSpent = 0x00010000,
    /// Require a destination tag on incoming payments.
    RequireDestTag = 0x00020000,
    /// Disallow receiving the native currency.
    DisallowNative = 0x00080000,
    /// Require counterparties to be authorized to hold this account's
    /// issued currency.
    RequireAuth = 0x00040000,
    /// Don't allow freezing this account's trust lines.
    NoFreeze = 0x00200000,
    /// Freeze every trust line this account issues.
    GlobalFreeze = 0x00400000,
    /// New trust lines default to rippling enabled.
    DefaultRipple = 0x00800000,
    /// Require deposit pre-authorization for incoming payments.
    DepositAuth = 0x01000000,
    /// This account root is a pseudo-account (e.g. an AMM account),
    /// ineligible to be a payment source or destination.
    PseudoAccount = 0x02000000,
}

/// The account root ledger entry, as consumed by the payment engine.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRoot {
    pub account: AccountId,
    /// Native-currency balance, in drops.
    pub balance: i64,
    pub sequence: u32,
    pub flags: Vec<AccountRootFlag>,
    /// Number of ledger objects this account owns, used for the owner
    /// reserve computation.
    pub owner_count: u32,
    /// Transfer rate this account charges as an issuer, in the fixed-point
    /// representation where `10^9` is the identity (no fee).
    pub transfer_rate: u32,
    #[serde(default)]
    pub previous_txn_id: Option<[u8; 32]>,
    #[serde(default)]
    pub previous_txn_lgr_seq: u32,
}

impl AccountRoot {
    pub const TRANSFER_RATE_IDENTITY: u32 = 1_000_000_000;

    pub fn has_flag(&self, flag: AccountRootFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// True if this account charges a non-identity transfer rate.
    pub fn charges_transfer_fee(&self) -> bool {
        self.transfer_rate != Self::TRANSFER_RATE_IDENTITY
    }

    /// The owner reserve this account must maintain, per `spec.md`
    /// §4.3.1: `ReserveBase + OwnerCount * ReserveIncrement`.
    pub fn reserve(&self, reserve_base: i64, reserve_increment: i64) -> i64 {
        reserve_base + self.owner_count as i64 * reserve_increment
    }

    /// Spendable native balance for use as a payment source, per
    /// `spec.md` §4.3.1: `balance - max(reserve, base_fee)`.
    pub fn spendable_native(&self, reserve_base: i64, reserve_increment: i64, base_fee: i64) -> i64 {
        let reserve = self.reserve(reserve_base, reserve_increment);
        let floor = reserve.max(base_fee);
        (self.balance - floor).max(0)
    }
}
