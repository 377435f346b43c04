//! The payment sandbox: a stackable, reversible overlay over a
//! [`LedgerView`], with a deferred-credit table that prevents a later
//! strand from re-spending liquidity a prior strand already committed
//! within one payment (`spec.md` §4.2).
//!
//! No direct teacher analogue exists (the teacher is a client library with
//! no server-side mutation layer); the frame/stack shape is grounded
//! directly on `spec.md` §4.2's operation table, structured the way the
//! teacher structures its other owned, method-returns-`Result` wrappers
//! (e.g. `core/binarycodec`'s serializer buffer).

pub mod deferred_credit;
pub mod frame;

pub use deferred_credit::DeferredCreditTable;
pub use frame::Frame;

use frame::Touch;

use crate::account::{AccountId, Currency};
use crate::amount::Number;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerKey, LedgerView};

/// A stack of [`Frame`]s over a base [`LedgerView`]. The engine owns one of
/// these per payment; child frames are pushed for speculative work (e.g. a
/// strand's reverse pass) and either applied into their parent or dropped.
pub struct PaymentSandbox<'v> {
    base: &'v mut dyn LedgerView,
    frames: Vec<Frame>,
}

impl<'v> PaymentSandbox<'v> {
    pub fn new(base: &'v mut dyn LedgerView) -> PaymentSandbox<'v> {
        PaymentSandbox {
            base,
            frames: vec![Frame::new()],
        }
    }

    /// Pushes a fresh child frame onto the stack.
    pub fn push_frame(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Drops the topmost frame's mutations entirely, as if they never
    /// happened. Used when a speculative reverse pass must be discarded
    /// before a replay (`spec.md` §4.5 step 3).
    pub fn discard_frame(&mut self) -> EngineResult<()> {
        if self.frames.len() <= 1 {
            return Err(EngineError::Invariant("cannot discard the root frame"));
        }
        self.frames.pop();
        Ok(())
    }

    /// Merges the topmost frame into its immediate parent, idempotently,
    /// per `spec.md` §4.2's `apply(to_parent)` contract.
    pub fn apply(&mut self) -> EngineResult<()> {
        if self.frames.len() <= 1 {
            return Err(EngineError::Invariant("cannot apply the root frame into itself"));
        }
        let child = self.frames.pop().expect("checked len > 1 above");
        let parent = self.frames.last_mut().expect("checked len > 1 above");
        parent.merge_child(child)
    }

    /// Applies the root frame into the base view. Only legal when this
    /// sandbox has exactly one frame left (`spec.md` §4.2).
    pub fn apply_to_view(&mut self) -> EngineResult<()> {
        if self.frames.len() != 1 {
            return Err(EngineError::Invariant(
                "apply_to_view is only legal on a root frame",
            ));
        }
        let root = self.frames.pop().expect("checked len == 1 above");
        for (key, bytes) in root.deletion_finals {
            self.base.update(key.clone(), bytes);
            self.base.erase(&key);
        }
        for (key, touch) in root.current {
            match touch {
                Touch::Present(bytes) => {
                    if root.inserted_keys.contains(&key) {
                        self.base.insert(key, bytes);
                    } else {
                        self.base.update(key, bytes);
                    }
                }
                Touch::Deleted => {
                    // Already handled via deletion_finals above when the
                    // frame had observed a prior value; a delete with no
                    // recorded final state means the key never existed in
                    // this frame's own current map as Present, so there is
                    // nothing left to erase on the base view beyond what
                    // the deletion_finals loop already covered. Erase
                    // defensively in case the key predates this frame.
                    self.base.erase(&key);
                }
            }
        }
        self.base.adjust_native_burned(root.native_burn);
        self.frames.push(Frame::new());
        Ok(())
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Reads straight from the base view, bypassing every frame. Steps use
    /// this for checks that must see the ledger's state as of this
    /// transaction's start (e.g. a freeze flag), independent of any
    /// mutation the same payment has already staged — the role `spec.md`
    /// §4.3 calls `afView`.
    pub fn read_base(&self, key: &LedgerKey) -> Option<Vec<u8>> {
        self.base.read(key)
    }

    /// Enumerates entries under `prefix` from the base view. Offer
    /// directories are populated before the engine runs (`spec.md` §1's
    /// "offer creation... out of scope"), so the set of candidate offer
    /// keys for a book is always present in the base view; their *current*
    /// remaining amounts, which a prior step in this same payment may have
    /// already reduced, must still be read back through [`Self::read`].
    pub fn for_each_base(&self, prefix: &[u8], callback: &mut dyn FnMut(&LedgerKey, &[u8])) {
        self.base.for_each(prefix, callback);
    }

    pub fn read(&self, key: &LedgerKey) -> Option<Vec<u8>> {
        for frame in self.frames.iter().rev() {
            match frame.current.get(key) {
                Some(Touch::Present(bytes)) => return Some(bytes.clone()),
                Some(Touch::Deleted) => return None,
                None => continue,
            }
        }
        self.base.read(key)
    }

    pub fn exists(&self, key: &LedgerKey) -> bool {
        self.read(key).is_some()
    }

    pub fn read_entry(&self, key: &LedgerKey) -> Option<crate::ledger::LedgerEntry> {
        self.read(key).and_then(|bytes| crate::ledger::LedgerEntry::from_bytes(&bytes))
    }

    pub fn insert_entry(&mut self, key: LedgerKey, entry: &crate::ledger::LedgerEntry) {
        self.insert(key, entry.to_bytes());
    }

    pub fn update_entry(&mut self, key: LedgerKey, entry: &crate::ledger::LedgerEntry) {
        self.update(key, entry.to_bytes());
    }

    pub fn insert(&mut self, key: LedgerKey, bytes: Vec<u8>) {
        let frame = self.frames.last_mut().expect("sandbox always has a frame");
        frame.current.insert(key.clone(), Touch::Present(bytes));
        frame.inserted_keys.insert(key);
    }

    pub fn update(&mut self, key: LedgerKey, bytes: Vec<u8>) {
        let pre_image = self.read(&key);
        let frame = self.frames.last_mut().expect("sandbox always has a frame");
        if !frame.pre_images.contains_key(&key) {
            if let Some(pre) = pre_image {
                frame.pre_images.insert(key.clone(), pre);
            }
        }
        frame.current.insert(key, Touch::Present(bytes));
    }

    pub fn erase(&mut self, key: &LedgerKey) {
        let frame = self.frames.last_mut().expect("sandbox always has a frame");
        if frame.inserted_keys.remove(key) {
            frame.current.remove(key);
            return;
        }
        if let Some(Touch::Present(bytes)) = frame.current.get(key) {
            frame.deletion_finals.insert(key.clone(), bytes.clone());
        }
        frame.current.insert(key.clone(), Touch::Deleted);
    }

    pub fn adjust_native_burned(&mut self, drops: i64) {
        self.frames.last_mut().expect("sandbox always has a frame").native_burn += drops;
    }

    pub fn note_owner_count(&mut self, account: AccountId, count: u32) {
        self.frames
            .last_mut()
            .expect("sandbox always has a frame")
            .note_owner_count(account, count);
    }

    /// Records a deferred credit of `amount` from `sender` to `receiver`
    /// against the topmost frame's table (`spec.md` §4.2).
    pub fn credit(
        &mut self,
        sender: AccountId,
        receiver: AccountId,
        currency: Currency,
        amount: Number,
        sender_pre_balance: Number,
    ) -> EngineResult<()> {
        self.frames
            .last_mut()
            .expect("sandbox always has a frame")
            .deferred_credits
            .credit(sender, receiver, currency, amount, sender_pre_balance)
    }

    /// The spendable balance `account` may still draw against
    /// `counterparty` in `currency`, folding every frame's deferred credits
    /// (`spec.md` §4.2's `min(observed, origBalance − debits, ...)` rule).
    /// `observed_balance` is the raw balance read from the ledger/sandbox
    /// before this adjustment. Native-currency results are clamped to
    /// nonnegative, matching "native issuer with a negative result clamps
    /// to zero".
    pub fn spendable_balance(
        &self,
        account: AccountId,
        counterparty: AccountId,
        currency: Currency,
        observed_balance: Number,
    ) -> EngineResult<Number> {
        let mut cap: Option<Number> = None;
        for frame in &self.frames {
            if let Some(adjustment) = frame.deferred_credits.adjustment(account, counterparty, currency)? {
                cap = Some(match cap {
                    None => adjustment,
                    Some(existing) => existing.min(adjustment),
                });
            }
        }
        let mut result = match cap {
            None => observed_balance,
            Some(cap) => observed_balance.min(cap),
        };
        if currency.is_native() && result.signum() < 0 {
            result = Number::ZERO;
        }
        Ok(result)
    }
}
