//! The direct step: a trust-line transfer of issued currency between two
//! accounts, possibly at the issuer's transfer rate (`spec.md` §4.3.2).

use crate::account::{AccountId, Currency, Issue};
use crate::amount::{Amount, Number, Quality};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ResultCode};
use crate::ledger::trust_line::Side;
use crate::ledger::{AccountRoot, AccountRootFlag, LedgerEntry, LedgerKey, LedgerView, TrustLine};
use crate::sandbox::PaymentSandbox;
use crate::step::DebtDirection;

/// A trust-line transfer from `src` to `dst` in `currency`.
#[derive(Debug, Clone)]
pub struct DirectStep {
    pub src: AccountId,
    pub dst: AccountId,
    pub currency: Currency,
    /// True when this step is the strand's last step (its output is the
    /// payment destination's receipt).
    pub is_last: bool,
    /// True when this step is the strand's first step (its input is the
    /// payment source's send).
    pub is_first: bool,
    pub cached_in: Option<Amount>,
    pub cached_out: Option<Amount>,
    pub inactive: bool,
    pub terminal_code: Option<ResultCode>,
}

impl DirectStep {
    pub fn new(src: AccountId, dst: AccountId, currency: Currency, is_first: bool, is_last: bool) -> DirectStep {
        DirectStep {
            src,
            dst,
            currency,
            is_last,
            is_first,
            cached_in: None,
            cached_out: None,
            inactive: false,
            terminal_code: None,
        }
    }

    fn issue(&self, issuer: AccountId) -> Issue {
        Issue::new(self.currency, issuer).expect("caller guarantees a valid (currency, issuer) pair")
    }

    fn read_line(&self, sandbox: &PaymentSandbox) -> Option<TrustLine> {
        let key = LedgerKey::trust_line(self.src, self.dst, self.currency);
        sandbox.read_entry(&key).and_then(|e| match e {
            LedgerEntry::TrustLine(t) => Some(t),
            _ => None,
        })
    }

    fn read_account(&self, sandbox: &PaymentSandbox, account: AccountId) -> Option<AccountRoot> {
        sandbox.read_entry(&LedgerKey::account_root(account)).and_then(|e| match e {
            LedgerEntry::AccountRoot(a) => Some(a),
            _ => None,
        })
    }

    /// Releases the owner reserve `account` held for this line and unfiles
    /// it from `account`'s owner directory, once the line has reverted to
    /// its default state and this side counted against the reserve
    /// (`spec.md` §11).
    fn release_reserve(&self, sandbox: &mut PaymentSandbox, account: AccountId, line_key: &LedgerKey) {
        if let Some(mut root) = self.read_account(sandbox, account) {
            root.owner_count = root.owner_count.saturating_sub(1);
            sandbox.note_owner_count(account, root.owner_count);
            sandbox.update_entry(LedgerKey::account_root(account), &LedgerEntry::AccountRoot(root));
        }
        let dir_key = LedgerKey::owner_directory(account);
        if let Some(LedgerEntry::DirectoryNode(mut node)) = sandbox.read_entry(&dir_key) {
            if node.remove(line_key) {
                sandbox.erase(&dir_key);
            } else {
                sandbox.update_entry(dir_key, &LedgerEntry::DirectoryNode(node));
            }
        }
    }

    /// Determines whether this movement issues new debt or redeems
    /// existing debt, from `src`'s perspective (`spec.md` §4.3.2).
    fn debt_direction(&self, line: &TrustLine) -> DebtDirection {
        let Some(side) = line.side_of(self.src) else {
            return DebtDirection::Issues;
        };
        let balance_from_src = line.balance_from(self.src).unwrap_or(Number::ZERO);
        // src holds a positive balance (is owed) iff it has previously
        // redeemed tokens back toward the issuer side; paying further from
        // a nonnegative balance reduces what src is owed, i.e. redeems.
        if balance_from_src.signum() > 0 {
            DebtDirection::Redeems
        } else {
            let _ = side;
            DebtDirection::Issues
        }
    }

    /// Runs the preconditions `spec.md` §4.3.2 requires at construction or
    /// first reverse call, returning the fatal code if any fails.
    fn check(&self, sandbox: &PaymentSandbox, line: &TrustLine) -> Option<ResultCode> {
        let Some(src_side) = line.side_of(self.src) else {
            return Some(ResultCode::NoLine);
        };
        let dst_side = src_side.other();

        let issuer_requires_auth = {
            let issuer = if self.currency.is_native() {
                return None;
            } else {
                // The issuer of a trust line in this model is whichever
                // side the holder is authorized against; callers construct
                // lines only between a holder and the currency's issuer or
                // between two holders, so both ends are checked uniformly.
                self.dst
            };
            self.read_account(sandbox, issuer)
                .map(|root| root.has_flag(AccountRootFlag::RequireAuth))
                .unwrap_or(false)
        };
        if issuer_requires_auth && line.balance.is_zero() && !line.side(src_side).authorized {
            return Some(ResultCode::NoAuth);
        }

        // Freeze is asymmetric: only the side with freeze authority can
        // block flow out of the *other* side.
        if line.side(dst_side).freeze {
            return Some(ResultCode::NoLine);
        }

        if let Some(issuer_root) = self.read_account(sandbox, self.dst) {
            if issuer_root.has_flag(AccountRootFlag::GlobalFreeze) {
                return Some(ResultCode::NoLine);
            }
        }

        None
    }

    pub fn rev(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        out_wanted: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        let Some(line) = self.read_line(sandbox) else {
            self.inactive = true;
            self.terminal_code = Some(ResultCode::NoLine);
            let zero = Amount::zero_issued(self.issue(self.dst));
            return Ok((zero, zero));
        };
        if let Some(code) = self.check(sandbox, &line) {
            self.inactive = true;
            self.terminal_code = Some(code);
            let zero = Amount::zero_issued(self.issue(self.dst));
            return Ok((zero, zero));
        }

        let dst_limit = line
            .side_of(self.dst)
            .map(|s| line.side(s).limit)
            .unwrap_or(Number::ZERO);
        let headroom = dst_limit.add(&line.balance_from(self.dst).unwrap_or(Number::ZERO).negate())?;
        let out_magnitude = out_wanted.magnitude();
        // Trust-line capacity in this simplified model is bounded only by
        // the destination's configured limit minus its current balance;
        // issuers (native account is the issue's owner) have unlimited
        // capacity to accept redemptions.
        let headroom_available = if self.dst == self.issue(self.dst).issuer {
            out_magnitude
        } else {
            out_magnitude.min(headroom)
        };
        // Further capped by anything this payment has already speculatively
        // moved between src and dst, so a later strand can't re-spend
        // headroom an earlier strand's forward pass already committed.
        let available = sandbox.spendable_balance(self.src, self.dst, self.currency, headroom_available)?;
        let direction = self.debt_direction(&line);
        let rate = self.effective_transfer_rate(sandbox, &direction)?;
        let out_actual = Amount::Issued {
            issue: self.issue(self.dst),
            value: available,
        };
        let in_needed = out_actual.mul_ratio(rate, config.transfer_rate_identity as u64, true)?;
        self.cached_in = Some(in_needed);
        self.cached_out = Some(out_actual);
        Ok((in_needed, out_actual))
    }

    /// The transfer rate applied to a holder-to-holder movement; identity
    /// when either side is the issuer (`spec.md` §4.3.2).
    fn effective_transfer_rate(&self, sandbox: &PaymentSandbox, direction: &DebtDirection) -> EngineResult<u64> {
        if self.is_first || self.is_last {
            return Ok(AccountRoot::TRANSFER_RATE_IDENTITY as u64);
        }
        let _ = direction;
        match self.read_account(sandbox, self.dst) {
            Some(root) if root.charges_transfer_fee() => Ok(root.transfer_rate as u64),
            _ => Ok(AccountRoot::TRANSFER_RATE_IDENTITY as u64),
        }
    }

    pub fn fwd(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        in_available: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        let Some(mut line) = self.read_line(sandbox) else {
            self.inactive = true;
            let zero = Amount::zero_issued(self.issue(self.dst));
            return Ok((zero, zero));
        };
        let direction = self.debt_direction(&line);
        let rate = self.effective_transfer_rate(sandbox, &direction)?;

        let in_magnitude = in_available.magnitude();
        let out_magnitude = in_magnitude.mul_ratio(config.transfer_rate_identity as u64, rate, false)?;

        let Some(src_side) = line.side_of(self.src) else {
            self.inactive = true;
            let zero = Amount::zero_issued(self.issue(self.dst));
            return Ok((zero, zero));
        };
        let src_pre_balance = line.balance_from(self.src).unwrap_or(Number::ZERO);

        let signed_delta = match src_side {
            Side::Low => in_magnitude,
            Side::High => in_magnitude.negate(),
        };
        line.balance = line.balance.sub(&signed_delta)?;

        sandbox.credit(self.src, self.dst, self.currency, out_magnitude, src_pre_balance)?;

        let key = LedgerKey::trust_line(self.src, self.dst, self.currency);
        if line.is_default_state() {
            if line.low_side.reserve {
                self.release_reserve(sandbox, line.low, &key);
            }
            if line.high_side.reserve {
                self.release_reserve(sandbox, line.high, &key);
            }
            sandbox.erase(&key);
        } else {
            sandbox.update_entry(key, &LedgerEntry::TrustLine(line));
        }

        let in_used = Amount::Issued {
            issue: self.issue(self.src),
            value: in_magnitude,
        };
        let out_produced = Amount::Issued {
            issue: self.issue(self.dst),
            value: out_magnitude,
        };
        self.cached_in = Some(in_used);
        self.cached_out = Some(out_produced);
        Ok((in_used, out_produced))
    }

    pub fn quality_upper_bound(
        &self,
        sandbox: &PaymentSandbox,
        prev_dir: DebtDirection,
    ) -> EngineResult<(Quality, DebtDirection)> {
        let Some(line) = self.read_line(sandbox) else {
            return Ok((Quality::worst(), prev_dir));
        };
        let direction = self.debt_direction(&line);
        if self.is_first || self.is_last {
            return Ok((Quality::identity(), direction));
        }
        let rate = self.effective_transfer_rate(sandbox, &direction)?;
        if rate as u32 == AccountRoot::TRANSFER_RATE_IDENTITY || matches!(direction, DebtDirection::Issues) {
            Ok((Quality::identity(), direction))
        } else {
            let identity = Number::from_decimal_str(&AccountRoot::TRANSFER_RATE_IDENTITY.to_string())?;
            let rate_number = Number::from_decimal_str(&rate.to_string())?;
            Ok((Quality::from_amounts(identity, rate_number), direction))
        }
    }

    pub fn valid_fwd(&self, sandbox: &PaymentSandbox, in_amount: Amount) -> EngineResult<bool> {
        let Some(line) = self.read_line(sandbox) else {
            return Ok(false);
        };
        let Some(src_side) = line.side_of(self.src) else {
            return Ok(false);
        };
        let limit = line.side(src_side).limit;
        Ok(in_amount.magnitude() <= limit || self.src == self.issue(self.src).issuer)
    }
}

/// True when `a` and `b` are neither `prev` and this step share the same
/// middle account *and* that account has set no-ripple on both adjoining
/// lines (`spec.md` §4.3.2's no-ripple check). The executor evaluates this
/// by index, never through a back-reference (`spec.md` §9).
pub fn violates_no_ripple(
    prev: &DirectStep,
    next: &DirectStep,
    payment_src: AccountId,
    payment_dst: AccountId,
    sandbox: &PaymentSandbox,
) -> bool {
    if prev.dst != next.src {
        return false;
    }
    let middle = prev.dst;
    if middle == payment_src || middle == payment_dst {
        return false;
    }
    let prev_line = match prev.read_line(sandbox) {
        Some(line) => line,
        None => return false,
    };
    let next_line = match next.read_line(sandbox) {
        Some(line) => line,
        None => return false,
    };
    let prev_no_ripple = prev_line
        .side_of(middle)
        .map(|s| prev_line.side(s).no_ripple)
        .unwrap_or(false);
    let next_no_ripple = next_line
        .side_of(middle)
        .map(|s| next_line.side(s).no_ripple)
        .unwrap_or(false);
    prev_no_ripple && next_no_ripple
}
