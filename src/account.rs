//! Account, currency, and issue identity types.
//!
//! See `spec.md` §3: the 20-byte account identifier, the 3-character or
//! 160-bit currency code, and the (currency, issuer) issue pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 20-byte opaque account identity.
///
/// The all-zero identifier is the native pseudo-account: it is never a real
/// account and is used only as the issuer sentinel for the native currency.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// The sentinel issuer of the native currency. Never a real account.
    pub const NATIVE_ISSUER: AccountId = AccountId([0u8; 20]);

    /// True if this is the native-currency sentinel issuer.
    pub fn is_native_issuer(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", hex::encode_upper(self.0))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// A currency identity: either the native currency or a 160-bit currency
/// code (3-character ISO-style codes are stored left-padded into the same
/// 20-byte representation the ledger uses).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// The native currency (conventionally displayed as `XRP`).
    Native,
    /// A 160-bit issued currency code.
    Code([u8; 20]),
}

impl Currency {
    /// Construct an issued-currency code from a 3-character ASCII code,
    /// left-padding it the way the ledger's standard currency-code layout
    /// does.
    pub fn from_code(code: &str) -> Self {
        if code.is_empty() || code.eq_ignore_ascii_case("xrp") {
            return Currency::Native;
        }
        let mut bytes = [0u8; 20];
        let code_bytes = code.as_bytes();
        let len = code_bytes.len().min(20);
        bytes[12..12 + len.min(3)].copy_from_slice(&code_bytes[..len.min(3)]);
        Currency::Code(bytes)
    }

    /// True if this is the native currency.
    pub fn is_native(&self) -> bool {
        matches!(self, Currency::Native)
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Native => write!(f, "XRP"),
            Currency::Code(c) => write!(f, "Currency({})", hex::encode_upper(c)),
        }
    }
}

/// The identity of a currency: a (currency, issuer) pair.
///
/// `is_native()` holds iff the currency is native, in which case the
/// issuer must be [`AccountId::NATIVE_ISSUER`]. Only a native currency may
/// pair with the native pseudo-account issuer, and vice versa; constructing
/// any other combination is a caller error, checked by [`Issue::new`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub currency: Currency,
    pub issuer: AccountId,
}

impl Issue {
    /// The native-currency issue.
    pub const fn native() -> Self {
        Issue {
            currency: Currency::Native,
            issuer: AccountId::NATIVE_ISSUER,
        }
    }

    /// Construct an issue, enforcing that native currency only ever pairs
    /// with the native pseudo-account and vice versa.
    pub fn new(currency: Currency, issuer: AccountId) -> Option<Self> {
        match (currency.is_native(), issuer.is_native_issuer()) {
            (true, true) | (false, false) => Some(Issue { currency, issuer }),
            _ => None,
        }
    }

    /// True iff this issue is the native currency.
    pub fn is_native(&self) -> bool {
        self.currency.is_native()
    }
}

impl fmt::Debug for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "Issue(XRP)")
        } else {
            write!(f, "Issue({:?}/{})", self.currency, self.issuer)
        }
    }
}
