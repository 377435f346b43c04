//! The native-currency endpoint step (`spec.md` §4.3.1).

use crate::account::{AccountId, Currency};
use crate::amount::{Amount, Number};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ResultCode};
use crate::ledger::{AccountRoot, LedgerEntry, LedgerKey};
use crate::sandbox::PaymentSandbox;

/// A native-currency leg endpoint: either the payment's source (debits) or
/// its destination (credits).
#[derive(Debug, Clone)]
pub struct NativeStep {
    pub account: AccountId,
    /// The other account of this native hop (the step on the opposite side
    /// of the same transfer), used to key the sandbox's deferred-credit
    /// bookkeeping the same way `DirectStep` does for a trust line.
    pub counterparty: AccountId,
    /// True when this is the strand's final step (the destination side).
    pub is_last: bool,
    pub cached_in: Option<Amount>,
    pub cached_out: Option<Amount>,
    pub inactive: bool,
    pub terminal_code: Option<ResultCode>,
}

impl NativeStep {
    pub fn new(account: AccountId, counterparty: AccountId, is_last: bool) -> NativeStep {
        NativeStep {
            account,
            counterparty,
            is_last,
            cached_in: None,
            cached_out: None,
            inactive: false,
            terminal_code: None,
        }
    }

    fn read_account_root(&self, sandbox: &PaymentSandbox) -> Option<AccountRoot> {
        let key = LedgerKey::account_root(self.account);
        sandbox.read_entry(&key).and_then(|entry| match entry {
            LedgerEntry::AccountRoot(root) => Some(root),
            _ => None,
        })
    }

    pub fn rev(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        out_wanted: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        let drops_wanted = native_drops(&out_wanted)?;

        if self.is_last {
            self.cached_in = Some(out_wanted);
            self.cached_out = Some(out_wanted);
            return Ok((out_wanted, out_wanted));
        }

        let Some(root) = self.read_account_root(sandbox) else {
            self.inactive = true;
            self.terminal_code = Some(ResultCode::UnfundedPayment);
            return Ok((Amount::zero_native(), Amount::zero_native()));
        };
        let reserve_spendable = root.spendable_native(config.reserve_base, config.reserve_increment, config.base_fee_drops);
        let observed = Number::from_decimal_str(&reserve_spendable.to_string())?;
        let capped = sandbox.spendable_balance(self.account, self.counterparty, Currency::Native, observed)?;
        let spendable = capped.to_i64()?;
        let out_actual = drops_wanted.min(spendable).max(0);
        let result = Amount::Native(out_actual);
        self.cached_in = Some(result);
        self.cached_out = Some(result);
        if out_actual == 0 {
            self.inactive = true;
        }
        Ok((result, result))
    }

    pub fn fwd(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        in_available: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        let drops = native_drops(&in_available)?;

        if self.is_last {
            let key = LedgerKey::account_root(self.account);
            match self.read_account_root(sandbox) {
                Some(mut root) => {
                    root.balance = root
                        .balance
                        .checked_add(drops)
                        .ok_or(EngineError::AmountOverflow("native credit overflow"))?;
                    sandbox.update_entry(key, &LedgerEntry::AccountRoot(root));
                }
                None => {
                    if drops < config.reserve_base {
                        self.inactive = true;
                        self.terminal_code = Some(ResultCode::NoDstInsufNative);
                        self.cached_in = Some(Amount::zero_native());
                        self.cached_out = Some(Amount::zero_native());
                        return Ok((Amount::zero_native(), Amount::zero_native()));
                    }
                    let root = AccountRoot {
                        account: self.account,
                        balance: drops,
                        sequence: 1,
                        flags: Vec::new(),
                        owner_count: 0,
                        transfer_rate: AccountRoot::TRANSFER_RATE_IDENTITY,
                        previous_txn_id: None,
                        previous_txn_lgr_seq: 0,
                    };
                    sandbox.insert_entry(key, &LedgerEntry::AccountRoot(root));
                }
            }
            self.cached_in = Some(in_available);
            self.cached_out = Some(in_available);
            return Ok((in_available, in_available));
        }

        let key = LedgerKey::account_root(self.account);
        let Some(mut root) = self.read_account_root(sandbox) else {
            self.inactive = true;
            return Ok((Amount::zero_native(), Amount::zero_native()));
        };
        let reserve_spendable = root.spendable_native(config.reserve_base, config.reserve_increment, config.base_fee_drops);
        let pre_balance = Number::from_decimal_str(&root.balance.to_string())?;
        let observed = Number::from_decimal_str(&reserve_spendable.to_string())?;
        let capped = sandbox.spendable_balance(self.account, self.counterparty, Currency::Native, observed)?;
        let spendable = capped.to_i64()?;
        let debited = drops.min(spendable).max(0);
        root.balance -= debited;
        sandbox.update_entry(key, &LedgerEntry::AccountRoot(root));
        sandbox.credit(
            self.account,
            self.counterparty,
            Currency::Native,
            Number::from_decimal_str(&debited.to_string())?,
            pre_balance,
        )?;
        let result = Amount::Native(debited);
        self.cached_in = Some(result);
        self.cached_out = Some(result);
        if debited < drops {
            self.inactive = true;
        }
        Ok((result, result))
    }

    pub fn valid_fwd(&self, sandbox: &PaymentSandbox, in_amount: Amount) -> EngineResult<bool> {
        if self.is_last {
            return Ok(true);
        }
        let drops = native_drops(&in_amount)?;
        let Some(root) = self.read_account_root(sandbox) else {
            return Ok(false);
        };
        Ok(drops <= root.balance)
    }
}

fn native_drops(amount: &Amount) -> EngineResult<i64> {
    match amount {
        Amount::Native(drops) => Ok(*drops),
        Amount::Issued { .. } => Err(EngineError::Invariant("native step received an issued amount")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerView;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeView {
        entries: HashMap<LedgerKey, Vec<u8>>,
    }

    impl LedgerView for FakeView {
        fn read(&self, key: &LedgerKey) -> Option<Vec<u8>> {
            self.entries.get(key).cloned()
        }
        fn insert(&mut self, key: LedgerKey, bytes: Vec<u8>) {
            self.entries.insert(key, bytes);
        }
        fn update(&mut self, key: LedgerKey, bytes: Vec<u8>) {
            self.entries.insert(key, bytes);
        }
        fn erase(&mut self, key: &LedgerKey) {
            self.entries.remove(key);
        }
        fn for_each(&self, _prefix: &[u8], _callback: &mut dyn FnMut(&LedgerKey, &[u8])) {}
        fn adjust_native_burned(&mut self, _drops: i64) {}
    }

    fn seed(view: &mut FakeView, account: AccountId, balance: i64) {
        let root = AccountRoot {
            account,
            balance,
            sequence: 1,
            flags: Vec::new(),
            owner_count: 0,
            transfer_rate: AccountRoot::TRANSFER_RATE_IDENTITY,
            previous_txn_id: None,
            previous_txn_lgr_seq: 0,
        };
        view.insert(LedgerKey::account_root(account), LedgerEntry::AccountRoot(root).to_bytes());
    }

    #[test]
    fn source_rev_clamps_to_spendable_balance() {
        let mut view = FakeView::default();
        let account = AccountId([1u8; 20]);
        seed(&mut view, account, 100_000_000);
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let other = AccountId([9u8; 20]);
        let mut step = NativeStep::new(account, other, false);
        let (in_needed, out_actual) = step.rev(&mut sandbox, &config, Amount::Native(1_000_000_000)).unwrap();
        // spendable = 100_000_000 - reserve(10_000_000) = 90_000_000
        assert_eq!(in_needed, Amount::Native(90_000_000));
        assert_eq!(out_actual, Amount::Native(90_000_000));
    }

    #[test]
    fn destination_rev_always_accepts_full_amount() {
        let mut view = FakeView::default();
        let account = AccountId([2u8; 20]);
        seed(&mut view, account, 0);
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let other = AccountId([9u8; 20]);
        let mut step = NativeStep::new(account, other, true);
        let (in_needed, out_actual) = step.rev(&mut sandbox, &config, Amount::Native(5_000_000)).unwrap();
        assert_eq!(in_needed, Amount::Native(5_000_000));
        assert_eq!(out_actual, Amount::Native(5_000_000));
    }

    #[test]
    fn new_destination_account_requires_at_least_the_base_reserve() {
        let mut view = FakeView::default();
        let account = AccountId([3u8; 20]);
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let other = AccountId([9u8; 20]);
        let mut step = NativeStep::new(account, other, true);
        let (_, out_produced) = step.fwd(&mut sandbox, &config, Amount::Native(1_000_000)).unwrap();
        assert_eq!(out_produced, Amount::Native(0));
        assert_eq!(step.terminal_code, Some(ResultCode::NoDstInsufNative));
    }
}
