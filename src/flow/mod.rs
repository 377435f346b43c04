//! The flow driver: the outer loop that picks a best-quality active
//! strand, executes it, and accumulates delivery across as many strands as
//! it takes to satisfy the request (`spec.md` §4.6).

use crate::amount::{Amount, Quality};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ResultCode};
use crate::ledger::{LedgerKey, LedgerView};
use crate::sandbox::PaymentSandbox;
use crate::step::Step;
use crate::strand::{composed_quality, execute_strand, is_inactive};

/// The outcome of a `flow` call: how much moved, what offers were fully
/// consumed and should be removed from their books, the terminal sandbox
/// (ready for the caller to `apply_to_view`), and the result code.
pub struct FlowResult<'v> {
    pub actual_in: Amount,
    pub actual_out: Amount,
    pub sandbox: PaymentSandbox<'v>,
    pub offers_to_remove: Vec<LedgerKey>,
    pub result_code: ResultCode,
}

/// Runs the flow algorithm over an already-built set of strands.
///
/// `strands` is consumed: each strand's steps carry mutable per-execution
/// state (`cached_in`/`cached_out`/`inactive`), so this function owns them
/// for the duration of the payment. Strand construction (`spec.md` §4.4)
/// happens before this is called; a strand that failed to build never
/// reaches here.
pub fn flow<'v>(
    view: &'v mut dyn LedgerView,
    config: &EngineConfig,
    mut strands: Vec<Vec<Step>>,
    requested_out: Amount,
    partial_payment: bool,
    quality_limit: Option<Quality>,
    send_max: Option<Amount>,
) -> EngineResult<FlowResult<'v>> {
    let mut sandbox = PaymentSandbox::new(view);
    let mut active: Vec<bool> = vec![true; strands.len()];
    let mut offers_to_remove: Vec<LedgerKey> = Vec::new();
    let mut out_so_far = zero_like(requested_out);
    let mut in_so_far: Option<Amount> = None;
    let mut last_step_code: Option<ResultCode> = None;

    if strands.is_empty() {
        return Ok(FlowResult {
            actual_in: Amount::zero_native(),
            actual_out: out_so_far,
            sandbox,
            offers_to_remove,
            result_code: ResultCode::PathDry,
        });
    }

    loop {
        if out_so_far.magnitude() >= requested_out.magnitude() {
            break;
        }
        if let (Some(cap), Some(sent)) = (send_max, in_so_far) {
            if sent.magnitude() >= cap.magnitude() {
                break;
            }
        }

        let mut best: Option<(usize, Quality)> = None;
        for (idx, strand) in strands.iter().enumerate() {
            if !active[idx] {
                continue;
            }
            let quality = composed_quality(strand, &sandbox)?;
            if let Some(limit) = quality_limit {
                if !quality.better_than_or_equal(&limit) {
                    active[idx] = false;
                    continue;
                }
            }
            match &best {
                None => best = Some((idx, quality)),
                Some((_, best_quality)) if quality < *best_quality => best = Some((idx, quality)),
                _ => {}
            }
        }

        let Some((idx, quality)) = best else {
            tracing::debug!("no active strand left to try");
            break;
        };
        tracing::trace!(idx, ?quality, "selected best-quality active strand");

        let remaining_out = requested_out.sub(&out_so_far)?;
        let remaining_in = match (send_max, in_so_far) {
            (Some(cap), Some(sent)) => Some(cap.sub(&sent)?),
            (Some(cap), None) => Some(cap),
            (None, _) => None,
        };

        let execution = execute_strand(&mut strands[idx], &mut sandbox, config, remaining_out, remaining_in)?;

        offers_to_remove.extend(execution.offers_to_remove.iter().copied());

        if execution.actual_out.is_zero() {
            active[idx] = false;
            if let Some(code) = strands[idx].iter().find_map(Step::terminal_code) {
                tracing::debug!(idx, ?code, "strand delivered nothing, deactivating");
                last_step_code = Some(code);
            }
            continue;
        }

        out_so_far = out_so_far.add(&execution.actual_out)?;
        in_so_far = Some(match in_so_far {
            None => execution.actual_in,
            Some(sent) => sent.add(&execution.actual_in)?,
        });

        if is_inactive(&strands[idx]) {
            active[idx] = false;
        }
        if !active.iter().any(|a| *a) {
            break;
        }
    }

    let result_code = terminal_code(requested_out, out_so_far, partial_payment, last_step_code);
    let actual_in = in_so_far.unwrap_or_else(|| zero_in_amount(send_max));

    Ok(FlowResult {
        actual_in,
        actual_out: out_so_far,
        sandbox,
        offers_to_remove,
        result_code,
    })
}

fn zero_in_amount(send_max: Option<Amount>) -> Amount {
    match send_max {
        Some(cap) => zero_like(cap),
        None => Amount::zero_native(),
    }
}

/// The zero amount of the same issue as `amount`, preserving whether it is
/// the native variant (an issued-native amount is a different, incompatible
/// representation that [`Amount::add`]/`sub` reject).
fn zero_like(amount: Amount) -> Amount {
    if amount.is_native() {
        Amount::zero_native()
    } else {
        Amount::zero_issued(amount.issue())
    }
}

/// `spec.md` §4.6/§7: `Success` on full delivery, `PathPartial` on partial
/// delivery when permitted, otherwise the last deactivated strand's own
/// fatal step code (e.g. `NoLine`, `NoAuth`) when nothing moved at all and
/// some step reported one, falling back to `PathDry`.
fn terminal_code(
    requested_out: Amount,
    out_so_far: Amount,
    partial_payment: bool,
    last_step_code: Option<ResultCode>,
) -> ResultCode {
    if out_so_far.magnitude() >= requested_out.magnitude() {
        ResultCode::Success
    } else if out_so_far.is_zero() {
        last_step_code.unwrap_or(ResultCode::PathDry)
    } else if partial_payment {
        ResultCode::PathPartial
    } else {
        ResultCode::PathDry
    }
}
