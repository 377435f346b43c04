//! The step contract: the atomic unit of a payment strand (`spec.md` §4.3).
//!
//! `spec.md` §9 flags the source's polymorphic (interface, runtime-dispatch)
//! step type for re-architecture. This module follows that note: [`Step`]
//! is a sum type of the three concrete variants, each carrying its own
//! state, with a single dispatch `impl` rather than a trait object. A
//! strand holds its steps in an indexed `Vec<Step>`; the no-ripple check in
//! [`direct::DirectStep`] receives its predecessor's kind by index rather
//! than holding a back-reference, per §9's second note.

pub mod book;
pub mod direct;
pub mod native;

pub use book::BookStep;
pub use direct::DirectStep;
pub use native::NativeStep;

use crate::account::{AccountId, Issue};
use crate::amount::{Amount, Quality};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerKey;
use crate::sandbox::PaymentSandbox;

/// Whether a step is creating new debt (issuing) or retiring existing debt
/// (redeeming), from the taker's perspective (`spec.md` §4.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtDirection {
    Issues,
    Redeems,
}

/// A single step in a strand: a native endpoint, a direct (trust-line)
/// transfer, or a book (offer) crossing.
#[derive(Debug, Clone)]
pub enum Step {
    Native(NativeStep),
    Direct(DirectStep),
    Book(BookStep),
}

impl Step {
    /// Compute the input this step needs to produce `out_wanted`,
    /// threading the result into the step's own cache for the forward pass
    /// (`spec.md` §4.3, §4.5).
    pub fn rev(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        offers_to_remove: &mut Vec<LedgerKey>,
        out_wanted: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        match self {
            Step::Native(s) => s.rev(sandbox, config, out_wanted),
            Step::Direct(s) => s.rev(sandbox, config, out_wanted),
            Step::Book(s) => s.rev(sandbox, config, offers_to_remove, out_wanted),
        }
    }

    /// Execute with real, available input, applying mutations.
    pub fn fwd(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        offers_to_remove: &mut Vec<LedgerKey>,
        in_available: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        match self {
            Step::Native(s) => s.fwd(sandbox, config, in_available),
            Step::Direct(s) => s.fwd(sandbox, config, in_available),
            Step::Book(s) => s.fwd(sandbox, config, offers_to_remove, in_available),
        }
    }

    pub fn cached_in(&self) -> Option<Amount> {
        match self {
            Step::Native(s) => s.cached_in,
            Step::Direct(s) => s.cached_in,
            Step::Book(s) => s.cached_in,
        }
    }

    pub fn cached_out(&self) -> Option<Amount> {
        match self {
            Step::Native(s) => s.cached_out,
            Step::Direct(s) => s.cached_out,
            Step::Book(s) => s.cached_out,
        }
    }

    /// An upper bound on this step's achievable quality, given the debt
    /// direction flowing in from the previous step. Used only to order
    /// strands (`spec.md` §4.3, §9's float-comparator note).
    pub fn quality_upper_bound(
        &self,
        sandbox: &PaymentSandbox,
        prev_dir: DebtDirection,
    ) -> EngineResult<(Quality, DebtDirection)> {
        match self {
            Step::Native(_) => Ok((Quality::identity(), prev_dir)),
            Step::Direct(s) => s.quality_upper_bound(sandbox, prev_dir),
            Step::Book(s) => s.quality_upper_bound(sandbox),
        }
    }

    pub fn inactive(&self) -> bool {
        match self {
            Step::Native(s) => s.inactive,
            Step::Direct(s) => s.inactive,
            Step::Book(s) => s.inactive,
        }
    }

    /// Terminal result code this step wants to end the payment with, if
    /// any (e.g. `no_line`, `no_auth`). `None` means the step has nothing
    /// fatal to report.
    pub fn terminal_code(&self) -> Option<crate::error::ResultCode> {
        match self {
            Step::Native(s) => s.terminal_code,
            Step::Direct(s) => s.terminal_code,
            Step::Book(_) => None,
        }
    }

    pub fn offers_used(&self) -> &[LedgerKey] {
        match self {
            Step::Book(s) => &s.offers_used,
            _ => &[],
        }
    }

    pub fn direct_step_accts(&self) -> Option<(AccountId, AccountId)> {
        match self {
            Step::Direct(s) => Some((s.src, s.dst)),
            _ => None,
        }
    }

    pub fn book_step_book(&self) -> Option<(Issue, Issue)> {
        match self {
            Step::Book(s) => Some((s.in_issue, s.out_issue)),
            _ => None,
        }
    }

    /// Re-validates a cached reverse-pass input before the forward pass
    /// runs, catching the case where intervening state makes it no longer
    /// realizable (`spec.md` §4.3's `valid_fwd`).
    pub fn valid_fwd(&self, sandbox: &PaymentSandbox, in_amount: Amount) -> EngineResult<bool> {
        match self {
            Step::Native(s) => s.valid_fwd(sandbox, in_amount),
            Step::Direct(s) => s.valid_fwd(sandbox, in_amount),
            Step::Book(_) => Ok(true),
        }
    }
}

/// Shared helper: fails with [`EngineError::Invariant`] if an amount's
/// issue doesn't match what a step expects at that position — a
/// programming error in the strand builder, never a user-facing outcome.
pub(crate) fn expect_issue(amount: &Amount, issue: Issue) -> EngineResult<()> {
    if amount.issue() == issue {
        Ok(())
    } else {
        Err(EngineError::Invariant("amount issue does not match step's expected issue"))
    }
}
