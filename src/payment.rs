//! `ripple_calculate`: the payment-transaction integration shell around the
//! flow engine (`spec.md` §4.7, §6).
//!
//! This is where path construction, the deposit-authorization precondition,
//! and the flow driver meet. The flow engine itself ([`crate::flow::flow`])
//! never reads [`EngineConfig::deposit_auth_wedge_exempt`] — only this
//! shell does, per `DESIGN.md`'s Open Question decision 1.

use std::collections::HashSet;

use crate::account::{AccountId, Currency, Issue};
use crate::amount::{Amount, Number, Quality};
use crate::config::EngineConfig;
use crate::error::{EngineResult, ResultCode};
use crate::ledger::{AccountRootFlag, LedgerEntry, LedgerKey, LedgerView};
use crate::sandbox::PaymentSandbox;
use crate::step::Step;
use crate::strand::{build_strand, PathElement, StrandSpec};

/// Inputs to one `ripple_calculate` invocation, mirroring the enclosing
/// transaction framework's `Payment` fields (`spec.md` §6).
pub struct RippleCalculateParams<'a> {
    pub source: AccountId,
    pub destination: AccountId,
    pub destination_amount: Amount,
    pub send_max: Option<Amount>,
    /// Explicit paths, each a sequence of path elements (`spec.md` §4.4).
    pub paths: &'a [Vec<PathElement>],
    /// Whether the implicit direct path (no explicit hops) should also be
    /// tried alongside `paths`.
    pub add_default_path: bool,
    pub partial_payment: bool,
    pub limit_quality: Option<Quality>,
    /// The enclosing transaction's hash and the ledger sequence it applies
    /// in. The flow computation itself is independent of both; they are
    /// accepted here only so this shell matches the integration contract
    /// the enclosing transaction framework expects.
    pub tx_hash: [u8; 32],
    pub ledger_sequence: u32,
    /// The transaction's `LastLedgerSequence`, if set: the ledger this
    /// payment is no longer eligible to apply in (`spec.md` §4.3.3's
    /// `ResultCode::Expired`, at the transaction level rather than an
    /// individual offer's).
    pub last_ledger_sequence: Option<u32>,
}

/// The outcome of one `ripple_calculate` invocation.
pub struct RippleCalculateResult<'v> {
    pub actual_in: Amount,
    pub actual_out: Amount,
    pub offers_to_remove: Vec<LedgerKey>,
    pub sandbox: PaymentSandbox<'v>,
    pub result_code: ResultCode,
}

pub fn ripple_calculate<'v>(
    view: &'v mut dyn LedgerView,
    config: &EngineConfig,
    params: &RippleCalculateParams,
) -> EngineResult<RippleCalculateResult<'v>> {
    if let Some(limit) = params.last_ledger_sequence {
        if params.ledger_sequence > limit {
            tracing::debug!(limit, sequence = params.ledger_sequence, "payment expired before this ledger");
            return Ok(RippleCalculateResult {
                actual_in: Amount::zero_native(),
                actual_out: zero_like(params.destination_amount),
                offers_to_remove: Vec::new(),
                sandbox: PaymentSandbox::new(view),
                result_code: ResultCode::Expired,
            });
        }
    }

    if let Some(code) = deposit_auth_blocks(&*view, config, params) {
        tracing::debug!(?code, destination = ?params.destination, "deposit auth blocked the payment");
        return Ok(RippleCalculateResult {
            actual_in: Amount::zero_native(),
            actual_out: zero_like(params.destination_amount),
            offers_to_remove: Vec::new(),
            sandbox: PaymentSandbox::new(view),
            result_code: code,
        });
    }

    let destination_issue = params.destination_amount.issue();
    let source_issue = params.send_max.map(|m| m.issue()).unwrap_or(destination_issue);

    let mut path_lists: Vec<&[PathElement]> = params.paths.iter().map(|p| p.as_slice()).collect();
    if params.add_default_path || path_lists.is_empty() {
        path_lists.push(&[]);
    }

    let mut strands = Vec::new();
    let mut seen_signatures: HashSet<Vec<StepSignature>> = HashSet::new();
    for path in path_lists {
        let spec = StrandSpec {
            source: params.source,
            destination: params.destination,
            source_issue,
            destination_issue,
            path,
        };
        if let Ok(steps) = build_strand(&spec) {
            // Two explicit paths can normalize to the same hop sequence
            // (e.g. one naming an issuer the other leaves implicit);
            // `spec.md` §4.4 treats those as one strand, not two.
            if seen_signatures.insert(strand_signature(&steps)) {
                strands.push(steps);
            } else {
                tracing::trace!("skipping structurally duplicate strand");
            }
        }
    }

    if strands.is_empty() {
        return Ok(RippleCalculateResult {
            actual_in: Amount::zero_native(),
            actual_out: zero_like(params.destination_amount),
            offers_to_remove: Vec::new(),
            sandbox: PaymentSandbox::new(view),
            result_code: ResultCode::BadPath,
        });
    }

    let result = crate::flow::flow(
        view,
        config,
        strands,
        params.destination_amount,
        params.partial_payment,
        params.limit_quality,
        params.send_max,
    )?;

    Ok(RippleCalculateResult {
        actual_in: result.actual_in,
        actual_out: result.actual_out,
        offers_to_remove: result.offers_to_remove,
        sandbox: result.sandbox,
        result_code: result.result_code,
    })
}

/// `spec.md` §9's small-native-payment exemption: a destination with
/// `DepositAuth` set still blocks an incoming payment unless the source is
/// pre-authorized, *except* when the payment is a native payment below the
/// base reserve and both accounts are themselves below the base reserve —
/// large enough lines of credit make the wedge attack this guards against
/// moot, small enough ones can't fund a spam account in the first place.
fn deposit_auth_blocks(view: &dyn LedgerView, config: &EngineConfig, params: &RippleCalculateParams) -> Option<ResultCode> {
    let dest_key = LedgerKey::account_root(params.destination);
    let Some(LedgerEntry::AccountRoot(dest_root)) = view.read_entry(&dest_key) else {
        return Some(ResultCode::NoDst);
    };
    if !dest_root.has_flag(AccountRootFlag::DepositAuth) {
        return None;
    }
    let preauth_key = LedgerKey::deposit_preauth(params.destination, params.source);
    if view.exists(&preauth_key) {
        return None;
    }
    if config.deposit_auth_wedge_exempt && is_small_wedge_exempt(view, config, params) {
        return None;
    }
    Some(ResultCode::NoPermission)
}

fn is_small_wedge_exempt(view: &dyn LedgerView, config: &EngineConfig, params: &RippleCalculateParams) -> bool {
    if !params.destination_amount.is_native() {
        return false;
    }
    let reserve = match Number::from_decimal_str(&config.reserve_base.to_string()) {
        Ok(n) => n,
        Err(_) => return false,
    };
    if params.destination_amount.magnitude() >= reserve {
        return false;
    }
    account_native_balance(view, params.source) < config.reserve_base
        && account_native_balance(view, params.destination) < config.reserve_base
}

fn account_native_balance(view: &dyn LedgerView, account: AccountId) -> i64 {
    match view.read_entry(&LedgerKey::account_root(account)) {
        Some(LedgerEntry::AccountRoot(root)) => root.balance,
        _ => 0,
    }
}

/// A strand's hop structure, ignoring per-execution state
/// (`cached_in`/`cached_out`/`inactive`/etc.), so two strands that would
/// walk the identical sequence of accounts, lines, and books can be
/// recognized as duplicates regardless of which explicit path produced
/// them (`spec.md` §4.4).
#[derive(Clone, PartialEq, Eq, Hash)]
enum StepSignature {
    Native(AccountId, AccountId, bool),
    Direct(AccountId, AccountId, Currency, bool, bool),
    Book(Issue, Issue),
}

fn strand_signature(steps: &[Step]) -> Vec<StepSignature> {
    steps
        .iter()
        .map(|step| match step {
            Step::Native(s) => StepSignature::Native(s.account, s.counterparty, s.is_last),
            Step::Direct(s) => StepSignature::Direct(s.src, s.dst, s.currency, s.is_first, s.is_last),
            Step::Book(s) => StepSignature::Book(s.in_issue, s.out_issue),
        })
        .collect()
}

fn zero_like(amount: Amount) -> Amount {
    if amount.is_native() {
        Amount::zero_native()
    } else {
        Amount::zero_issued(amount.issue())
    }
}

/// A trivial single-hop explicit path: just the destination's issuer, for
/// callers building a path list from a bare account.
pub fn account_path(account: AccountId) -> Vec<PathElement> {
    vec![PathElement::Account(account)]
}

/// An explicit currency/issuer hop, for building cross-currency paths.
pub fn issue_path(currency: Currency, issuer: AccountId) -> Option<Vec<PathElement>> {
    Issue::new(currency, issuer).map(|issue| vec![PathElement::Issue(issue)])
}
