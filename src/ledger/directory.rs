//! Owner and offer book directories: ordered lists of entry keys, linked in
//! pages (`spec.md` §11, supplementing the distilled spec).
//!
//! Field shape is grounded on the sibling `xrpl-rust` fork's `DirectoryNode`
//! ledger object
//! (`examples/other_examples/..._sephynox-xrpl-rust__src-models-ledger-objects-directory_node.rs.rs`),
//! generalized from wire hex indexes to typed [`LedgerKey`]s and narrowed to
//! the two kinds this engine actually walks: an account's owner directory
//! (trust lines and offers it owns) and an offer book's per-quality bucket.

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::ledger::LedgerKey;

/// One page of a directory's doubly-linked chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// The entries filed on this page, in insertion order.
    pub entries: Vec<LedgerKey>,
    /// The next page in the chain, wrapping at the end.
    #[serde(default)]
    pub index_next: Option<LedgerKey>,
    /// The previous page in the chain, wrapping at the beginning.
    #[serde(default)]
    pub index_previous: Option<LedgerKey>,
    /// The owning account, for an owner directory; `None` for an offer
    /// book directory.
    #[serde(default)]
    pub owner: Option<AccountId>,
}

impl DirectoryNode {
    pub fn empty() -> DirectoryNode {
        DirectoryNode {
            entries: Vec::new(),
            index_next: None,
            index_previous: None,
            owner: None,
        }
    }

    pub fn owner_directory(owner: AccountId) -> DirectoryNode {
        DirectoryNode {
            owner: Some(owner),
            ..DirectoryNode::empty()
        }
    }

    /// Maximum entries per page before the engine must allocate a new page,
    /// mirroring the ledger's real directory page size.
    pub const PAGE_CAPACITY: usize = 32;

    pub fn is_full(&self) -> bool {
        self.entries.len() >= Self::PAGE_CAPACITY
    }

    pub fn insert(&mut self, key: LedgerKey) {
        if !self.entries.contains(&key) {
            self.entries.push(key);
        }
    }

    /// Removes `key`, returning `true` once the page has emptied — the
    /// caller must then unlink the page if it is not the directory's root.
    pub fn remove(&mut self, key: &LedgerKey) -> bool {
        self.entries.retain(|entry| entry != key);
        self.entries.is_empty()
    }
}
