//! A single sandbox frame: one level of the reversible overlay stack
//! (`spec.md` §4.2).

use std::collections::HashMap;

use crate::account::AccountId;
use crate::error::EngineResult;
use crate::ledger::LedgerKey;
use crate::sandbox::deferred_credit::DeferredCreditTable;

/// What a frame has recorded for one key: present with bytes, or deleted.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Touch {
    Present(Vec<u8>),
    Deleted,
}

/// One level of the sandbox stack. Tracks its own inserted/modified/deleted
/// keys, a deferred-credit table, a native-burn accumulator, and a
/// high-water mark of owner counts so reserve checks stay monotone across
/// the stack (`spec.md` §4.2).
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub(super) current: HashMap<LedgerKey, Touch>,
    pub(super) inserted_keys: std::collections::HashSet<LedgerKey>,
    pub(super) pre_images: HashMap<LedgerKey, Vec<u8>>,
    pub(super) deletion_finals: HashMap<LedgerKey, Vec<u8>>,
    pub(super) native_burn: i64,
    pub(super) deferred_credits: DeferredCreditTable,
    pub(super) owner_count_high_water: HashMap<AccountId, u32>,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
            && self.native_burn == 0
            && self.deferred_credits.is_empty()
            && self.owner_count_high_water.is_empty()
    }

    pub(super) fn note_owner_count(&mut self, account: AccountId, count: u32) {
        self.owner_count_high_water
            .entry(account)
            .and_modify(|existing| *existing = (*existing).max(count))
            .or_insert(count);
    }

    /// Merges `child` into `self` (i.e. `self` is child's parent), per the
    /// apply contract in `spec.md` §4.2: deletions, then insertions, then
    /// modifications are all order-independent within a frame, so merging
    /// key-by-key in any order is sound.
    pub(super) fn merge_child(&mut self, child: Frame) -> EngineResult<()> {
        for (key, touch) in child.current {
            match touch {
                Touch::Present(bytes) => {
                    if child.inserted_keys.contains(&key) {
                        self.current.insert(key.clone(), Touch::Present(bytes));
                        self.inserted_keys.insert(key);
                    } else {
                        self.current.insert(key.clone(), Touch::Present(bytes));
                        if !self.pre_images.contains_key(&key) {
                            if let Some(pre) = child.pre_images.get(&key) {
                                self.pre_images.insert(key, pre.clone());
                            }
                        }
                    }
                }
                Touch::Deleted => {
                    if self.inserted_keys.remove(&key) {
                        self.current.remove(&key);
                    } else {
                        if let Some(final_bytes) = child.deletion_finals.get(&key) {
                            self.deletion_finals
                                .insert(key.clone(), final_bytes.clone());
                        } else if let Some(Touch::Present(bytes)) = self.current.get(&key) {
                            self.deletion_finals.insert(key.clone(), bytes.clone());
                        }
                        self.current.insert(key, Touch::Deleted);
                    }
                }
            }
        }
        self.native_burn += child.native_burn;
        self.deferred_credits.merge_from(&child.deferred_credits)?;
        for (account, count) in child.owner_count_high_water {
            self.note_owner_count(account, count);
        }
        Ok(())
    }
}
