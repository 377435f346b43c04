//! The deferred-credit table: within-transaction accounting that prevents a
//! later strand from re-spending liquidity a prior strand already committed
//! (`spec.md` §4.2).
//!
//! Keyed by the unordered account pair, canonicalized exactly once at
//! insertion, per `spec.md` §9's note that the table must expose only
//! `credit`/`adjustment`-shaped operations so nothing can bypass that
//! canonicalization.

use std::collections::HashMap;

use crate::account::{AccountId, Currency};
use crate::amount::Number;
use crate::error::EngineResult;
use crate::ledger::canonical_order;

/// Accumulated credits recorded this transaction for one (account pair,
/// currency) key, plus the low account's original raw balance (in the
/// trust line's own "positive means high owes low" sign convention),
/// captured once on the first credit against this key.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCredit {
    low_orig_balance: Number,
    credits_to_low: Number,
    credits_to_high: Number,
}

impl DeferredCredit {
    fn merge(&mut self, other: &DeferredCredit) -> EngineResult<()> {
        self.credits_to_low = self.credits_to_low.add(&other.credits_to_low)?;
        self.credits_to_high = self.credits_to_high.add(&other.credits_to_high)?;
        Ok(())
    }
}

/// The deferred-credit table for one sandbox frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeferredCreditTable {
    entries: HashMap<(AccountId, AccountId, Currency), DeferredCredit>,
}

impl DeferredCreditTable {
    pub fn new() -> DeferredCreditTable {
        DeferredCreditTable::default()
    }

    /// Records a credit of `amount` currency `currency` from `sender` to
    /// `receiver`, given `sender_pre_balance` — the amount `sender` was
    /// owed by `receiver` immediately before this credit, in `sender`'s own
    /// perspective (positive means sender is owed).
    pub fn credit(
        &mut self,
        sender: AccountId,
        receiver: AccountId,
        currency: Currency,
        amount: Number,
        sender_pre_balance: Number,
    ) -> EngineResult<()> {
        let (low, high) = canonical_order(sender, receiver);
        let sender_is_low = sender == low;
        let low_orig_balance = if sender_is_low {
            sender_pre_balance
        } else {
            sender_pre_balance.negate()
        };
        let key = (low, high, currency);
        let entry = self.entries.entry(key).or_insert_with(|| DeferredCredit {
            low_orig_balance,
            credits_to_low: Number::ZERO,
            credits_to_high: Number::ZERO,
        });
        if receiver == low {
            entry.credits_to_low = entry.credits_to_low.add(&amount)?;
        } else {
            entry.credits_to_high = entry.credits_to_high.add(&amount)?;
        }
        Ok(())
    }

    /// The cap this table imposes on `account`'s spendable balance against
    /// `counterparty` in `currency`, or `None` if nothing has been recorded
    /// for this pair (no adjustment needed).
    pub fn adjustment(
        &self,
        account: AccountId,
        counterparty: AccountId,
        currency: Currency,
    ) -> EngineResult<Option<Number>> {
        let (low, high) = canonical_order(account, counterparty);
        let account_is_low = account == low;
        let Some(entry) = self.entries.get(&(low, high, currency)) else {
            return Ok(None);
        };
        let orig_from_account = if account_is_low {
            entry.low_orig_balance
        } else {
            entry.low_orig_balance.negate()
        };
        let debits_against_account = if account_is_low {
            entry.credits_to_high
        } else {
            entry.credits_to_low
        };
        Ok(Some(orig_from_account.sub(&debits_against_account)?))
    }

    /// Folds `other` into `self`, keeping `self`'s original balance (it was
    /// recorded earlier) and summing credit totals — the merge step used
    /// when a child frame's table is applied into its parent.
    pub fn merge_from(&mut self, other: &DeferredCreditTable) -> EngineResult<()> {
        for (key, entry) in &other.entries {
            match self.entries.get_mut(key) {
                Some(existing) => existing.merge(entry)?,
                None => {
                    self.entries.insert(key.clone(), entry.clone());
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Currency;

    fn usd() -> Currency {
        Currency::from_code("USD")
    }

    #[test]
    fn credit_reduces_the_senders_spendable_adjustment() {
        let mut table = DeferredCreditTable::new();
        let s = AccountId([1u8; 20]);
        let r = AccountId([2u8; 20]);
        let pre_balance = Number::from_decimal_str("100").unwrap();
        table
            .credit(s, r, usd(), Number::from_decimal_str("40").unwrap(), pre_balance)
            .unwrap();
        let adjustment = table.adjustment(s, r, usd()).unwrap().unwrap();
        assert_eq!(adjustment, Number::from_decimal_str("60").unwrap());
    }

    #[test]
    fn crediting_the_opposite_direction_accumulates_independently() {
        let mut table = DeferredCreditTable::new();
        let a = AccountId([1u8; 20]);
        let b = AccountId([2u8; 20]);
        table
            .credit(
                a,
                b,
                usd(),
                Number::from_decimal_str("40").unwrap(),
                Number::from_decimal_str("100").unwrap(),
            )
            .unwrap();
        table
            .credit(
                b,
                a,
                usd(),
                Number::from_decimal_str("10").unwrap(),
                Number::from_decimal_str("5").unwrap(),
            )
            .unwrap();
        let a_adjustment = table.adjustment(a, b, usd()).unwrap().unwrap();
        let b_adjustment = table.adjustment(b, a, usd()).unwrap().unwrap();
        assert_eq!(a_adjustment, Number::from_decimal_str("60").unwrap());
        assert_eq!(b_adjustment, Number::from_decimal_str("15").unwrap());
    }

    #[test]
    fn merge_keeps_the_earlier_original_balance_and_sums_credits() {
        let mut parent = DeferredCreditTable::new();
        let mut child = DeferredCreditTable::new();
        let a = AccountId([1u8; 20]);
        let b = AccountId([2u8; 20]);
        parent
            .credit(
                a,
                b,
                usd(),
                Number::from_decimal_str("10").unwrap(),
                Number::from_decimal_str("100").unwrap(),
            )
            .unwrap();
        child
            .credit(
                a,
                b,
                usd(),
                Number::from_decimal_str("5").unwrap(),
                Number::from_decimal_str("999").unwrap(),
            )
            .unwrap();
        parent.merge_from(&child).unwrap();
        let adjustment = parent.adjustment(a, b, usd()).unwrap().unwrap();
        // 100 (parent's original, not child's 999) - (10 + 5)
        assert_eq!(adjustment, Number::from_decimal_str("85").unwrap());
    }
}
