//! End-to-end payment scenarios run against the public flow driver, one per
//! worked example the specification walks through: a plain native payment,
//! a reserve-bounded source, a `send_max` cap, an issued-currency transfer
//! through its issuer, a transfer fee charged on a middle hop, and a
//! two-strand aggregation.

use std::collections::HashMap;

use xrpl_flow_engine::ledger::trust_line::TrustLineSide;
use xrpl_flow_engine::ledger::{AccountRoot, LedgerEntry, LedgerKey, LedgerView, TrustLine};
use xrpl_flow_engine::sandbox::PaymentSandbox;
use xrpl_flow_engine::step::direct::violates_no_ripple;
use xrpl_flow_engine::step::{DirectStep, NativeStep, Step};
use xrpl_flow_engine::{flow, Amount, Currency, EngineConfig, Issue, Number, ResultCode};

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

fn acct(n: u8) -> xrpl_flow_engine::AccountId {
    xrpl_flow_engine::AccountId([n; 20])
}

/// Installs a `tracing` subscriber for the current test, once per process.
/// Run with `RUST_LOG=trace` to see the engine's `debug!`/`trace!` output
/// for a failing scenario.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

fn seed_account(view: &mut FakeView, account: xrpl_flow_engine::AccountId, balance: i64, transfer_rate: u32) {
    let root = AccountRoot {
        account,
        balance,
        sequence: 1,
        flags: Vec::new(),
        owner_count: 0,
        transfer_rate,
        previous_txn_id: None,
        previous_txn_lgr_seq: 0,
    };
    view.insert(LedgerKey::account_root(account), LedgerEntry::AccountRoot(root).to_bytes());
}

fn trust_side(limit: &str) -> TrustLineSide {
    TrustLineSide {
        limit: Number::from_decimal_str(limit).unwrap(),
        quality_in: 0,
        quality_out: 0,
        no_ripple: false,
        freeze: false,
        authorized: false,
        reserve: true,
    }
}

fn seed_line(
    view: &mut FakeView,
    a: xrpl_flow_engine::AccountId,
    b: xrpl_flow_engine::AccountId,
    currency: Currency,
    low_limit: &str,
    high_limit: &str,
) {
    let (low, high) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    let line = TrustLine {
        low,
        high,
        currency,
        balance: Number::ZERO,
        low_side: trust_side(low_limit),
        high_side: trust_side(high_limit),
        previous_txn_id: None,
        previous_txn_lgr_seq: 0,
    };
    view.insert(LedgerKey::trust_line(low, high, currency), LedgerEntry::TrustLine(line).to_bytes());
}

#[test]
fn native_payment_to_an_existing_destination_delivers_in_full() {
    init_tracing();
    let src = acct(1);
    let dst = acct(2);
    let mut view = FakeView::default();
    seed_account(&mut view, src, 100_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    seed_account(&mut view, dst, 20_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    let config = EngineConfig::mainnet_defaults();
    let strand = vec![Step::Native(NativeStep::new(src, dst, false)), Step::Native(NativeStep::new(dst, src, true))];
    let result = flow(&mut view, &config, vec![strand], Amount::Native(10_000_000), false, None, None).unwrap();
    assert_eq!(result.result_code, ResultCode::Success);
    assert_eq!(result.actual_out, Amount::Native(10_000_000));
    assert_eq!(result.actual_in, Amount::Native(10_000_000));
}

#[test]
fn reserve_bounded_source_delivers_only_its_spendable_balance() {
    init_tracing();
    let src = acct(3);
    let dst = acct(4);
    let mut view = FakeView::default();
    // spendable = 15_000_000 - reserve(10_000_000) = 5_000_000
    seed_account(&mut view, src, 15_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    seed_account(&mut view, dst, 20_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    let config = EngineConfig::mainnet_defaults();
    let strand = vec![Step::Native(NativeStep::new(src, dst, false)), Step::Native(NativeStep::new(dst, src, true))];
    let result = flow(&mut view, &config, vec![strand], Amount::Native(50_000_000), true, None, None).unwrap();
    assert_eq!(result.result_code, ResultCode::PathPartial);
    assert_eq!(result.actual_out, Amount::Native(5_000_000));
}

#[test]
fn send_max_cap_limits_delivery_below_the_request() {
    init_tracing();
    let src = acct(5);
    let dst = acct(6);
    let mut view = FakeView::default();
    seed_account(&mut view, src, 100_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    seed_account(&mut view, dst, 20_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    let config = EngineConfig::mainnet_defaults();
    let strand = vec![Step::Native(NativeStep::new(src, dst, false)), Step::Native(NativeStep::new(dst, src, true))];
    let result = flow(
        &mut view,
        &config,
        vec![strand],
        Amount::Native(10_000_000),
        true,
        None,
        Some(Amount::Native(3_000_000)),
    )
    .unwrap();
    assert_eq!(result.result_code, ResultCode::PathPartial);
    assert_eq!(result.actual_in, Amount::Native(3_000_000));
    assert_eq!(result.actual_out, Amount::Native(3_000_000));
}

#[test]
fn issued_currency_payment_ripples_through_the_issuer() {
    init_tracing();
    let issuer = acct(10);
    let a = acct(11);
    let b = acct(12);
    let usd = Currency::from_code("USD");
    let mut view = FakeView::default();
    seed_line(&mut view, issuer, a, usd, "0", "1000");
    seed_line(&mut view, issuer, b, usd, "0", "1000");
    let config = EngineConfig::mainnet_defaults();
    let strand = vec![
        Step::Direct(DirectStep::new(a, issuer, usd, true, false)),
        Step::Direct(DirectStep::new(issuer, b, usd, false, true)),
    ];
    let requested = Amount::Issued {
        issue: Issue::new(usd, issuer).unwrap(),
        value: Number::from_decimal_str("50").unwrap(),
    };
    let result = flow(&mut view, &config, vec![strand], requested, false, None, None).unwrap();
    assert_eq!(result.result_code, ResultCode::Success);
    assert_eq!(result.actual_out.magnitude(), Number::from_decimal_str("50").unwrap());
}

#[test]
fn transfer_fee_is_charged_on_the_middle_hop_only() {
    init_tracing();
    let a = acct(20);
    let m = acct(21);
    let c = acct(22);
    let d = acct(23);
    let usd = Currency::from_code("USD");
    let mut view = FakeView::default();
    seed_line(&mut view, a, m, usd, "0", "1000");
    seed_line(&mut view, m, c, usd, "0", "1000");
    seed_line(&mut view, c, d, usd, "0", "1000");
    // `c` charges a 5% transfer fee; it is the destination of the one
    // middle step (neither the strand's first nor last).
    seed_account(&mut view, c, 0, 1_050_000_000);
    let config = EngineConfig::mainnet_defaults();
    let strand = vec![
        Step::Direct(DirectStep::new(a, m, usd, true, false)),
        Step::Direct(DirectStep::new(m, c, usd, false, false)),
        Step::Direct(DirectStep::new(c, d, usd, false, true)),
    ];
    let requested = Amount::Issued {
        issue: Issue::new(usd, d).unwrap(),
        value: Number::from_decimal_str("100").unwrap(),
    };
    let result = flow(&mut view, &config, vec![strand], requested, false, None, None).unwrap();
    assert_eq!(result.result_code, ResultCode::Success);
    assert_eq!(result.actual_out.magnitude(), Number::from_decimal_str("100").unwrap());
    assert_eq!(result.actual_in.magnitude(), Number::from_decimal_str("105").unwrap());
}

#[test]
fn two_strands_aggregate_to_satisfy_one_request() {
    init_tracing();
    let src_1 = acct(30);
    let src_2 = acct(31);
    let dst = acct(32);
    let mut view = FakeView::default();
    // each source's spendable balance is 10_000_000, half of the request.
    seed_account(&mut view, src_1, 20_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    seed_account(&mut view, src_2, 20_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    seed_account(&mut view, dst, 20_000_000, AccountRoot::TRANSFER_RATE_IDENTITY);
    let config = EngineConfig::mainnet_defaults();
    let strand_1 = vec![Step::Native(NativeStep::new(src_1, dst, false)), Step::Native(NativeStep::new(dst, src_1, true))];
    let strand_2 = vec![Step::Native(NativeStep::new(src_2, dst, false)), Step::Native(NativeStep::new(dst, src_2, true))];
    let result = flow(&mut view, &config, vec![strand_1, strand_2], Amount::Native(15_000_000), false, None, None).unwrap();
    assert_eq!(result.result_code, ResultCode::Success);
    assert_eq!(result.actual_out, Amount::Native(15_000_000));
    assert_eq!(result.actual_in, Amount::Native(15_000_000));
}

#[test]
fn required_authorization_without_a_trust_line_blocks_the_payment() {
    init_tracing();
    let issuer = acct(40);
    let holder = acct(41);
    let dst = acct(42);
    let usd = Currency::from_code("USD");
    let mut view = FakeView::default();
    seed_line(&mut view, issuer, dst, usd, "0", "1000");
    // no line between holder and issuer: the first hop has nothing to read.
    let config = EngineConfig::mainnet_defaults();
    let strand = vec![
        Step::Direct(DirectStep::new(holder, issuer, usd, true, false)),
        Step::Direct(DirectStep::new(issuer, dst, usd, false, true)),
    ];
    let requested = Amount::Issued {
        issue: Issue::new(usd, issuer).unwrap(),
        value: Number::from_decimal_str("10").unwrap(),
    };
    let result = flow(&mut view, &config, vec![strand], requested, false, None, None).unwrap();
    assert_eq!(result.result_code, ResultCode::NoLine);
    assert!(result.actual_out.is_zero());
}

fn seed_line_no_ripple_at_middle(
    view: &mut FakeView,
    a: xrpl_flow_engine::AccountId,
    b: xrpl_flow_engine::AccountId,
    middle: xrpl_flow_engine::AccountId,
    currency: Currency,
) {
    let (low, high) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    let mut low_side = trust_side("1000");
    let mut high_side = trust_side("1000");
    if middle == low {
        low_side.no_ripple = true;
    } else {
        high_side.no_ripple = true;
    }
    let line = TrustLine {
        low,
        high,
        currency,
        balance: Number::ZERO,
        low_side,
        high_side,
        previous_txn_id: None,
        previous_txn_lgr_seq: 0,
    };
    view.insert(LedgerKey::trust_line(low, high, currency), LedgerEntry::TrustLine(line).to_bytes());
}

#[test]
fn no_ripple_set_on_both_adjoining_lines_is_detected() {
    init_tracing();
    let payment_src = acct(50);
    let middle = acct(51);
    let payment_dst = acct(52);
    let usd = Currency::from_code("USD");
    let mut view = FakeView::default();
    seed_line_no_ripple_at_middle(&mut view, payment_src, middle, middle, usd);
    seed_line_no_ripple_at_middle(&mut view, middle, payment_dst, middle, usd);
    let sandbox = PaymentSandbox::new(&mut view);
    let prev = DirectStep::new(payment_src, middle, usd, true, false);
    let next = DirectStep::new(middle, payment_dst, usd, false, true);
    assert!(violates_no_ripple(&prev, &next, payment_src, payment_dst, &sandbox));
}

#[test]
fn no_ripple_on_only_one_adjoining_line_does_not_violate() {
    init_tracing();
    let payment_src = acct(53);
    let middle = acct(54);
    let payment_dst = acct(55);
    let usd = Currency::from_code("USD");
    let mut view = FakeView::default();
    seed_line_no_ripple_at_middle(&mut view, payment_src, middle, middle, usd);
    seed_line(&mut view, middle, payment_dst, usd, "0", "1000");
    let sandbox = PaymentSandbox::new(&mut view);
    let prev = DirectStep::new(payment_src, middle, usd, true, false);
    let next = DirectStep::new(middle, payment_dst, usd, false, true);
    assert!(!violates_no_ripple(&prev, &next, payment_src, payment_dst, &sandbox));
}
