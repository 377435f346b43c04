//! The strand executor: the two-pass reverse/forward solver (`spec.md`
//! §4.5).
//!
//! The reverse pass walks the steps back to front, asking each "what input
//! do you need to produce this much output", arriving at the amount the
//! true source would need to send. That amount is then capped by `max_in`
//! (the payment's `send_max`, if any) and replayed forward, step by step,
//! each one handed the real output of the step before it — this is the
//! pass that actually commits ledger mutations ([`Step::fwd`]; `rev` is
//! speculative bookkeeping only). Running forward unconditionally, rather
//! than only when the reverse pass under-delivered, keeps this consistent
//! for book steps, whose `rev` does touch offers speculatively: that
//! frame is discarded wholesale before the commit pass runs.

use crate::amount::Amount;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerKey;
use crate::sandbox::PaymentSandbox;
use crate::step::Step;

/// The result of executing one strand.
#[derive(Debug, Clone)]
pub struct StrandExecution {
    pub actual_in: Amount,
    pub actual_out: Amount,
    pub offers_to_remove: Vec<LedgerKey>,
    /// Index of the step whose reverse pass first reported less output
    /// than was asked of it — the step actually constraining this
    /// strand's delivery, per `spec.md` §4.5. `None` if every step could
    /// fully satisfy what the step after it asked for.
    pub limiting_index: Option<usize>,
}

/// Executes `strand` to deliver as close to `requested_out` as its steps
/// allow, subject to an optional `max_in` spending cap. Pushes exactly one
/// sandbox frame and applies it into its parent before returning; callers
/// decide whether to keep that application (`spec.md` §4.6 applies a
/// strand's frame only when it delivered something).
///
/// The reverse pass's frame is always discarded and the forward pass
/// always re-runs every step from scratch, rather than skipping `fwd()`
/// for steps at or before `limiting_index`: `BookStep` only commits its
/// offer mutations in `fwd()`, so skipping a step's forward call would
/// silently skip a required ledger mutation for any step that touches the
/// order book.
pub fn execute_strand(
    strand: &mut [Step],
    sandbox: &mut PaymentSandbox,
    config: &EngineConfig,
    requested_out: Amount,
    max_in: Option<Amount>,
) -> EngineResult<StrandExecution> {
    if strand.is_empty() {
        return Err(EngineError::Invariant("cannot execute an empty strand"));
    }

    sandbox.push_frame();
    let mut offers_to_remove = Vec::new();
    let mut out_wanted = requested_out;
    let mut limiting_index: Option<usize> = None;
    for i in (0..strand.len()).rev() {
        let (in_needed, out_actual) = strand[i].rev(sandbox, config, &mut offers_to_remove, out_wanted)?;
        if matches!(out_actual.partial_cmp(&out_wanted), Some(std::cmp::Ordering::Less)) {
            limiting_index = Some(i);
        }
        out_wanted = in_needed;
    }
    let in_needed = out_wanted;

    sandbox.discard_frame()?;
    sandbox.push_frame();
    offers_to_remove.clear();

    let in_to_send = match max_in {
        Some(cap) if matches!(cap.partial_cmp(&in_needed), Some(std::cmp::Ordering::Less)) => cap,
        _ => in_needed,
    };

    let mut in_available = in_to_send;
    for step in strand.iter_mut() {
        if !step.valid_fwd(sandbox, in_available)? {
            break;
        }
        let (_, out_produced) = step.fwd(sandbox, config, &mut offers_to_remove, in_available)?;
        in_available = out_produced;
    }

    let actual_in = strand
        .first()
        .and_then(|s| s.cached_in())
        .unwrap_or(Amount::zero_native());
    let actual_out = strand
        .last()
        .and_then(|s| s.cached_out())
        .unwrap_or(Amount::zero_native());

    sandbox.apply()?;
    Ok(StrandExecution {
        actual_in,
        actual_out,
        offers_to_remove,
        limiting_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountId, Currency, Issue};
    use crate::ledger::{AccountRoot, LedgerEntry, LedgerView};
    use crate::step::NativeStep;
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
    fn unconstrained_native_strand_delivers_the_full_request() {
        let src = AccountId([1u8; 20]);
        let dst = AccountId([2u8; 20]);
        let mut view = FakeView::default();
        seed(&mut view, src, 100_000_000);
        seed(&mut view, dst, 20_000_000);
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let mut strand = vec![Step::Native(NativeStep::new(src, dst, false)), Step::Native(NativeStep::new(dst, src, true))];
        let result = execute_strand(&mut strand, &mut sandbox, &config, Amount::Native(10_000_000), None).unwrap();
        assert_eq!(result.actual_out, Amount::Native(10_000_000));
        assert_eq!(result.actual_in, Amount::Native(10_000_000));
    }

    #[test]
    fn source_reserve_limits_delivery_below_the_request() {
        let src = AccountId([3u8; 20]);
        let dst = AccountId([4u8; 20]);
        let mut view = FakeView::default();
        // Spendable = 15_000_000 - 10_000_000 reserve = 5_000_000.
        seed(&mut view, src, 15_000_000);
        seed(&mut view, dst, 20_000_000);
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let mut strand = vec![Step::Native(NativeStep::new(src, dst, false)), Step::Native(NativeStep::new(dst, src, true))];
        let result = execute_strand(&mut strand, &mut sandbox, &config, Amount::Native(10_000_000), None).unwrap();
        assert_eq!(result.actual_out, Amount::Native(5_000_000));
    }

    #[test]
    fn send_max_cap_below_request_limits_the_forward_pass() {
        let src = AccountId([5u8; 20]);
        let dst = AccountId([6u8; 20]);
        let mut view = FakeView::default();
        seed(&mut view, src, 100_000_000);
        seed(&mut view, dst, 20_000_000);
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let mut strand = vec![Step::Native(NativeStep::new(src, dst, false)), Step::Native(NativeStep::new(dst, src, true))];
        let result = execute_strand(
            &mut strand,
            &mut sandbox,
            &config,
            Amount::Native(10_000_000),
            Some(Amount::Native(3_000_000)),
        )
        .unwrap();
        assert_eq!(result.actual_in, Amount::Native(3_000_000));
        assert_eq!(result.actual_out, Amount::Native(3_000_000));
    }

    #[test]
    fn expect_issue_rejects_mismatched_issue() {
        let amount = Amount::Issued {
            issue: Issue::new(Currency::from_code("USD"), AccountId([1u8; 20])).unwrap(),
            value: crate::amount::Number::ZERO,
        };
        let wrong = Issue::new(Currency::from_code("EUR"), AccountId([1u8; 20])).unwrap();
        assert!(crate::step::expect_issue(&amount, wrong).is_err());
    }
}
