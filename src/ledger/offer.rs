//! The offer ledger entry: a standing order in one currency pair's order
//! book (`spec.md` §3, §4.3.3).
//!
//! Field shape is grounded on the teacher crate's `Offer` ledger object
//! (`models/ledger/objects/offer.rs`), generalized from wire strings/hex
//! hints to the engine's own [`Amount`]/[`crate::ledger::LedgerKey`] types,
//! with the passive/sell flag pair kept as-is.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::skip_serializing_none;
use strum_macros::{AsRefStr, Display, EnumIter};

use crate::account::AccountId;
use crate::amount::{Amount, Quality};
use crate::ledger::LedgerKey;

/// Boolean offer flags, mirroring the teacher's `OfferFlag` bit layout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Display, AsRefStr, EnumIter,
)]
#[repr(u32)]
pub enum OfferFlag {
    /// Never crosses another offer at creation time; only rests in the book.
    Passive = 0x00010000,
    /// Allowed to bridge exactly the requested `taker_gets`, even if that
    /// means exceeding `taker_pays`'s quality-implied limit.
    Sell = 0x00020000,
}

/// A standing offer: `account` offers `taker_gets` in exchange for
/// `taker_pays`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub account: AccountId,
    pub sequence: u32,
    pub flags: Vec<OfferFlag>,
    /// What the offer creator is giving up.
    pub taker_gets: Amount,
    /// What the offer creator wants in return.
    pub taker_pays: Amount,
    /// The directory this offer is filed under, for removal bookkeeping.
    pub book_directory: LedgerKey,
    pub owner_node: u64,
    pub book_node: u64,
    /// Unix-style expiration time, after which the offer is unfunded.
    #[serde(default)]
    pub expiration: Option<u32>,
    #[serde(default)]
    pub previous_txn_id: Option<[u8; 32]>,
    #[serde(default)]
    pub previous_txn_lgr_seq: u32,
}

impl Offer {
    pub fn has_flag(&self, flag: OfferFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_sell(&self) -> bool {
        self.has_flag(OfferFlag::Sell)
    }

    pub fn is_passive(&self) -> bool {
        self.has_flag(OfferFlag::Passive)
    }

    pub fn is_expired(&self, now: u32) -> bool {
        matches!(self.expiration, Some(e) if now >= e)
    }

    /// This offer's exchange rate: `taker_pays / taker_gets`, lower is
    /// better for the taker (`spec.md` §4.1).
    pub fn quality(&self) -> Quality {
        Quality::from_amounts(self.taker_pays.magnitude(), self.taker_gets.magnitude())
    }

    /// True once either side has been consumed down to nothing, at which
    /// point `spec.md` §4.3.3 requires the engine to remove it from its
    /// book directory.
    pub fn is_fully_consumed(&self) -> bool {
        self.taker_gets.is_zero() || self.taker_pays.is_zero()
    }
}
