//! The ledger view abstraction and the ledger-entry key derivation scheme.
//!
//! `spec.md` §6 specifies `LedgerView` as a consumer-supplied interface
//! over opaque 32-byte keys; §3 describes the entries this engine reads
//! and writes. This module owns both: the [`LedgerView`] trait the engine
//! is generic over, the [`LedgerKey`] derivation (SHA-512Half over a
//! domain-separated preimage, the same scheme the teacher crate uses for
//! transaction hashes in `models/transactions/mod.rs::get_hash`), and the
//! typed entry shapes ([`account_root::AccountRoot`],
//! [`trust_line::TrustLine`], [`offer::Offer`],
//! [`directory::DirectoryNode`]).

pub mod account_root;
pub mod directory;
pub mod offer;
pub mod trust_line;

pub use account_root::AccountRoot;
pub use directory::DirectoryNode;
pub use offer::Offer;
pub use trust_line::TrustLine;

use sha2::{Digest, Sha512};
use std::fmt;

use crate::account::{AccountId, Currency};

/// A 32-byte opaque ledger-entry key. The engine never inspects a key's
/// bytes beyond equality and the canonical ordering used for deterministic
/// iteration; it only ever constructs keys through the derivation
/// functions below.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerKey(pub [u8; 32]);

impl fmt::Debug for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerKey({})", hex::encode_upper(self.0))
    }
}

/// Ledger-entry type prefixes, mirroring the space prefixes rippled-style
/// ledgers use to separate key namespaces before hashing.
#[repr(u16)]
enum KeySpace {
    AccountRoot = 0x0061,
    RippleState = 0x0072,
    Offer = 0x006f,
    OwnerDirectory = 0x004f,
    DirectoryNode = 0x0064,
    DepositPreauth = 0x0070,
}

fn sha512_half(preimage: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512::new();
    hasher.update(preimage);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

impl LedgerKey {
    pub fn account_root(account: AccountId) -> LedgerKey {
        let mut preimage = Vec::with_capacity(22);
        preimage.extend_from_slice(&(KeySpace::AccountRoot as u16).to_be_bytes());
        preimage.extend_from_slice(&account.0);
        LedgerKey(sha512_half(&preimage))
    }

    /// Trust lines are keyed by the *unordered* account pair and currency:
    /// the preimage sorts the two accounts canonically first (`spec.md`
    /// §3's "low"/"high" ordering) so `trust_line(a, b, c) ==
    /// trust_line(b, a, c)`.
    pub fn trust_line(a: AccountId, b: AccountId, currency: Currency) -> LedgerKey {
        let (low, high) = canonical_order(a, b);
        let mut preimage = Vec::with_capacity(62);
        preimage.extend_from_slice(&(KeySpace::RippleState as u16).to_be_bytes());
        preimage.extend_from_slice(&low.0);
        preimage.extend_from_slice(&high.0);
        preimage.extend_from_slice(&currency_bytes(currency));
        LedgerKey(sha512_half(&preimage))
    }

    pub fn offer(owner: AccountId, sequence: u32) -> LedgerKey {
        let mut preimage = Vec::with_capacity(26);
        preimage.extend_from_slice(&(KeySpace::Offer as u16).to_be_bytes());
        preimage.extend_from_slice(&owner.0);
        preimage.extend_from_slice(&sequence.to_be_bytes());
        LedgerKey(sha512_half(&preimage))
    }

    pub fn owner_directory(owner: AccountId) -> LedgerKey {
        let mut preimage = Vec::with_capacity(22);
        preimage.extend_from_slice(&(KeySpace::OwnerDirectory as u16).to_be_bytes());
        preimage.extend_from_slice(&owner.0);
        LedgerKey(sha512_half(&preimage))
    }

    /// The book-identifying prefix shared by every directory page of one
    /// (pays-issue, gets-issue) order book: the first 24 bytes of a
    /// directory node key. Unlike other entry keys, a book's quality
    /// buckets are *not* hashed into this prefix — see
    /// [`LedgerKey::directory_node`].
    pub fn book_base(
        pays_currency: Currency,
        pays_issuer: AccountId,
        gets_currency: Currency,
        gets_issuer: AccountId,
    ) -> [u8; 24] {
        let mut preimage = Vec::with_capacity(82);
        preimage.extend_from_slice(&(KeySpace::DirectoryNode as u16).to_be_bytes());
        preimage.extend_from_slice(&currency_bytes(pays_currency));
        preimage.extend_from_slice(&pays_issuer.0);
        preimage.extend_from_slice(&currency_bytes(gets_currency));
        preimage.extend_from_slice(&gets_issuer.0);
        let digest = sha512_half(&preimage);
        let mut base = [0u8; 24];
        base.copy_from_slice(&digest[..24]);
        base
    }

    /// Offer-book directories are keyed by their book's hashed base (see
    /// [`LedgerKey::book_base`]) followed by an *unhashed* big-endian
    /// quality bucket, so that lexicographic key order within one book's
    /// prefix corresponds exactly to best-quality-first traversal
    /// (`spec.md` §4.3.3) — lower quality scalars sort first and are
    /// better for the taker. `LedgerView::for_each` is assumed to visit
    /// matching entries in key order.
    pub fn directory_node(
        pays_currency: Currency,
        pays_issuer: AccountId,
        gets_currency: Currency,
        gets_issuer: AccountId,
        quality_bucket: u64,
    ) -> LedgerKey {
        let base = Self::book_base(pays_currency, pays_issuer, gets_currency, gets_issuer);
        let mut key = [0u8; 32];
        key[..24].copy_from_slice(&base);
        key[24..].copy_from_slice(&quality_bucket.to_be_bytes());
        LedgerKey(key)
    }

    pub fn deposit_preauth(owner: AccountId, authorized: AccountId) -> LedgerKey {
        let mut preimage = Vec::with_capacity(42);
        preimage.extend_from_slice(&(KeySpace::DepositPreauth as u16).to_be_bytes());
        preimage.extend_from_slice(&owner.0);
        preimage.extend_from_slice(&authorized.0);
        LedgerKey(sha512_half(&preimage))
    }
}

fn currency_bytes(currency: Currency) -> [u8; 20] {
    match currency {
        Currency::Native => [0u8; 20],
        Currency::Code(bytes) => bytes,
    }
}

/// The canonical low/high ordering for an unordered account pair: the
/// lexicographically smaller account is "low".
pub fn canonical_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

/// A typed ledger entry, as read from or written to a [`LedgerView`].
///
/// `spec.md` §6 asks for a length-prefixed, fixed-field-order byte
/// encoding with an exact `parse(serialize(x)) == x` round trip; full wire
/// compatibility with the ledger's on-disk format is explicitly out of
/// scope (§1), so this crate realizes that contract with a canonical
/// `serde`-derived encoding (`LedgerEntry::to_bytes`/`from_bytes`) rather
/// than reproducing the production binary codec.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LedgerEntry {
    AccountRoot(AccountRoot),
    TrustLine(TrustLine),
    Offer(Offer),
    DirectoryNode(DirectoryNode),
}

impl LedgerEntry {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("ledger entries always serialize")
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<LedgerEntry> {
        serde_json::from_slice(bytes).ok()
    }

    pub fn as_account_root(&self) -> Option<&AccountRoot> {
        match self {
            LedgerEntry::AccountRoot(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_trust_line(&self) -> Option<&TrustLine> {
        match self {
            LedgerEntry::TrustLine(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_offer(&self) -> Option<&Offer> {
        match self {
            LedgerEntry::Offer(o) => Some(o),
            _ => None,
        }
    }
}

/// The consumer-supplied view over raw ledger entries, read and written by
/// 32-byte key (`spec.md` §6). The engine only ever reads trust lines,
/// offers, and accounts, and writes back changed copies through this
/// trait; it never owns persistent storage.
pub trait LedgerView {
    fn read(&self, key: &LedgerKey) -> Option<Vec<u8>>;
    fn exists(&self, key: &LedgerKey) -> bool {
        self.read(key).is_some()
    }
    fn insert(&mut self, key: LedgerKey, bytes: Vec<u8>);
    fn update(&mut self, key: LedgerKey, bytes: Vec<u8>);
    fn erase(&mut self, key: &LedgerKey);
    /// Visits every entry under a given key prefix; used by the strand
    /// builder and book step to enumerate owner/offer directories.
    fn for_each(&self, prefix: &[u8], callback: &mut dyn FnMut(&LedgerKey, &[u8]));
    fn adjust_native_burned(&mut self, drops: i64);

    fn read_entry(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        self.read(key).and_then(|bytes| LedgerEntry::from_bytes(&bytes))
    }

    fn insert_entry(&mut self, key: LedgerKey, entry: &LedgerEntry) {
        self.insert(key, entry.to_bytes());
    }

    fn update_entry(&mut self, key: LedgerKey, entry: &LedgerEntry) {
        self.update(key, entry.to_bytes());
    }
}
