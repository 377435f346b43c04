//! The book step: consumption of offers on an order book where one issue
//! is exchanged for another (`spec.md` §4.3.3).

use num_bigint::BigInt;

use crate::account::{AccountId, Issue};
use crate::amount::{Amount, Number, Quality};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{AccountRoot, LedgerEntry, LedgerKey, Offer};
use crate::sandbox::PaymentSandbox;

/// The most `owner` can actually deliver of `offer_gets` worth of
/// `out_issue`, accounting for the owner's own funds and anything this
/// payment has already speculatively drawn against them (`spec.md`
/// §4.3.3: an offer is only as good as its owner's ability to fund it).
fn funded_taker_gets(
    sandbox: &PaymentSandbox,
    config: &EngineConfig,
    out_issue: Issue,
    owner: AccountId,
    offer_gets: Number,
) -> EngineResult<Number> {
    if out_issue.is_native() {
        let Some(LedgerEntry::AccountRoot(root)) = sandbox.read_entry(&LedgerKey::account_root(owner)) else {
            return Ok(Number::ZERO);
        };
        let spendable = root.spendable_native(config.reserve_base, config.reserve_increment, config.base_fee_drops);
        let observed = Number::from_decimal_str(&spendable.to_string())?;
        let capped = sandbox.spendable_balance(owner, out_issue.issuer, out_issue.currency, observed)?;
        return Ok(offer_gets.min(capped));
    }
    if owner == out_issue.issuer {
        // The issuer can always issue more of its own currency.
        return Ok(offer_gets);
    }
    let key = LedgerKey::trust_line(owner, out_issue.issuer, out_issue.currency);
    let Some(LedgerEntry::TrustLine(line)) = sandbox.read_entry(&key) else {
        return Ok(Number::ZERO);
    };
    let observed = match line.balance_from(owner) {
        Some(balance) if balance.signum() > 0 => balance,
        _ => Number::ZERO,
    };
    let capped = sandbox.spendable_balance(owner, out_issue.issuer, out_issue.currency, observed)?;
    let capped = if capped.signum() < 0 { Number::ZERO } else { capped };
    Ok(offer_gets.min(capped))
}

/// Consumption of offers exchanging `in_issue` for `out_issue`.
#[derive(Debug, Clone)]
pub struct BookStep {
    pub in_issue: Issue,
    pub out_issue: Issue,
    pub payment_src: AccountId,
    pub payment_dst: AccountId,
    pub is_last: bool,
    /// Offers worse than this quality are skipped entirely.
    pub quality_limit: Option<Quality>,
    pub cached_in: Option<Amount>,
    pub cached_out: Option<Amount>,
    pub inactive: bool,
    pub offers_used: Vec<LedgerKey>,
}

impl BookStep {
    pub fn new(
        in_issue: Issue,
        out_issue: Issue,
        payment_src: AccountId,
        payment_dst: AccountId,
        is_last: bool,
        quality_limit: Option<Quality>,
    ) -> EngineResult<BookStep> {
        if in_issue == out_issue {
            return Err(EngineError::Invariant("book step requires distinct in/out issues"));
        }
        if in_issue.is_native() && out_issue.is_native() {
            return Err(EngineError::Invariant("book step cannot be native-to-native"));
        }
        Ok(BookStep {
            in_issue,
            out_issue,
            payment_src,
            payment_dst,
            is_last,
            quality_limit,
            cached_in: None,
            cached_out: None,
            inactive: false,
            offers_used: Vec::new(),
        })
    }

    /// Candidate offer keys for this book, in best-quality-first,
    /// insertion order within a bucket (`spec.md` §4.3.3). The directory
    /// scheme guarantees key order already implies quality order within
    /// the book's prefix (see `ledger::LedgerKey::directory_node`). An
    /// offer's book is keyed by its own `(taker_pays, taker_gets)` issues,
    /// which from this step's perspective is `(in_issue, out_issue)`.
    fn candidate_offer_keys(&self, sandbox: &PaymentSandbox) -> Vec<LedgerKey> {
        let base = LedgerKey::book_base(
            self.in_issue.currency,
            self.in_issue.issuer,
            self.out_issue.currency,
            self.out_issue.issuer,
        );
        let mut keys = Vec::new();
        sandbox.for_each_base(&base, &mut |key, _bytes| keys.push(*key));
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        keys
    }

    fn read_offer(&self, sandbox: &PaymentSandbox, key: &LedgerKey) -> Option<Offer> {
        sandbox.read_entry(key).and_then(|e| match e {
            LedgerEntry::Offer(o) => Some(o),
            _ => None,
        })
    }

    fn owner_transfer_rate(&self, sandbox: &PaymentSandbox, owner: AccountId) -> u64 {
        if owner == self.out_issue.issuer {
            return AccountRoot::TRANSFER_RATE_IDENTITY as u64;
        }
        let key = LedgerKey::account_root(owner);
        match sandbox.read_entry(&key) {
            Some(LedgerEntry::AccountRoot(root)) if root.charges_transfer_fee() => root.transfer_rate as u64,
            _ => AccountRoot::TRANSFER_RATE_IDENTITY as u64,
        }
    }

    /// Walks the book crediting `out_wanted`'s worth of output, in
    /// best-quality-first order, without yet committing a forward pass's
    /// real mutations beyond what `rev`'s speculative bookkeeping needs.
    pub fn rev(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        offers_to_remove: &mut Vec<LedgerKey>,
        out_wanted: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        let mut out_remaining = out_wanted.magnitude();
        let mut in_total = Number::ZERO;
        let mut out_total = Number::ZERO;

        for key in self.candidate_offer_keys(sandbox) {
            if out_remaining.is_zero() {
                break;
            }
            let Some(mut offer) = self.read_offer(sandbox, &key) else {
                continue;
            };
            if offer.is_expired(config.close_time) {
                tracing::trace!(account = ?offer.account, "removing expired offer");
                offers_to_remove.push(key);
                continue;
            }
            if offer.account == self.payment_src {
                offers_to_remove.push(key);
                continue;
            }
            let quality = offer.quality();
            if let Some(limit) = self.quality_limit {
                if !quality.better_than_or_equal(&limit) {
                    break;
                }
            }

            let offer_gets = offer.taker_gets.magnitude();
            let offer_pays = offer.taker_pays.magnitude();
            if offer_gets.is_zero() || offer_pays.is_zero() {
                offers_to_remove.push(key);
                continue;
            }
            let funded_gets = funded_taker_gets(sandbox, config, self.out_issue, offer.account, offer_gets)?;
            if funded_gets.is_zero() {
                tracing::trace!(account = ?offer.account, "removing unfunded offer");
                offers_to_remove.push(key);
                continue;
            }

            let take_gets = out_remaining.min(offer_gets).min(funded_gets);
            let take_pays = scale_by_ratio(take_gets, offer_pays, offer_gets, true)?;

            let rate = self.owner_transfer_rate(sandbox, offer.account);
            let owner_cost = take_gets.mul_ratio(rate as u64, config.transfer_rate_identity as u64, true)?;

            offer.taker_gets = offer.taker_gets.sub(&Amount::Issued {
                issue: self.out_issue,
                value: owner_cost,
            })?;
            offer.taker_pays = offer.taker_pays.sub(&Amount::Issued {
                issue: self.in_issue,
                value: take_pays,
            })?;

            in_total = in_total.add(&take_pays)?;
            out_total = out_total.add(&take_gets)?;
            out_remaining = out_remaining.sub(&take_gets)?;

            if offer.is_fully_consumed() {
                offers_to_remove.push(key);
            } else {
                sandbox.update_entry(key, &LedgerEntry::Offer(offer));
            }
            self.offers_used.push(key);
        }

        if out_total.is_zero() {
            self.inactive = true;
        }
        let in_needed = Amount::Issued {
            issue: self.in_issue,
            value: in_total,
        };
        let out_actual = Amount::Issued {
            issue: self.out_issue,
            value: out_total,
        };
        self.cached_in = Some(in_needed);
        self.cached_out = Some(out_actual);
        Ok((in_needed, out_actual))
    }

    /// Walks the same book driven by the real available input rather than
    /// a wanted output, so a shortfall earlier in the strand is reflected
    /// in how much of the book this step actually consumes (`spec.md`
    /// §4.5's forward pass).
    pub fn fwd(
        &mut self,
        sandbox: &mut PaymentSandbox,
        config: &EngineConfig,
        offers_to_remove: &mut Vec<LedgerKey>,
        in_available: Amount,
    ) -> EngineResult<(Amount, Amount)> {
        let mut in_remaining = in_available.magnitude();
        let mut in_total = Number::ZERO;
        let mut out_total = Number::ZERO;

        for key in self.candidate_offer_keys(sandbox) {
            if in_remaining.is_zero() {
                break;
            }
            let Some(mut offer) = self.read_offer(sandbox, &key) else {
                continue;
            };
            if offer.is_expired(config.close_time) {
                tracing::trace!(account = ?offer.account, "removing expired offer");
                offers_to_remove.push(key);
                continue;
            }
            if offer.account == self.payment_src {
                offers_to_remove.push(key);
                continue;
            }
            let quality = offer.quality();
            if let Some(limit) = self.quality_limit {
                if !quality.better_than_or_equal(&limit) {
                    break;
                }
            }

            let offer_gets = offer.taker_gets.magnitude();
            let offer_pays = offer.taker_pays.magnitude();
            if offer_gets.is_zero() || offer_pays.is_zero() {
                offers_to_remove.push(key);
                continue;
            }
            let funded_gets = funded_taker_gets(sandbox, config, self.out_issue, offer.account, offer_gets)?;
            if funded_gets.is_zero() {
                tracing::trace!(account = ?offer.account, "removing unfunded offer");
                offers_to_remove.push(key);
                continue;
            }

            let take_pays_unfunded = in_remaining.min(offer_pays);
            let take_gets_unfunded = scale_by_ratio(take_pays_unfunded, offer_gets, offer_pays, false)?;
            let (take_gets, take_pays) = if take_gets_unfunded > funded_gets {
                let capped_gets = funded_gets;
                let capped_pays = scale_by_ratio(capped_gets, offer_pays, offer_gets, true)?;
                (capped_gets, capped_pays.min(take_pays_unfunded))
            } else {
                (take_gets_unfunded, take_pays_unfunded)
            };

            let rate = self.owner_transfer_rate(sandbox, offer.account);
            let owner_cost = take_gets.mul_ratio(rate as u64, config.transfer_rate_identity as u64, true)?;

            offer.taker_gets = offer.taker_gets.sub(&Amount::Issued {
                issue: self.out_issue,
                value: owner_cost,
            })?;
            offer.taker_pays = offer.taker_pays.sub(&Amount::Issued {
                issue: self.in_issue,
                value: take_pays,
            })?;

            in_total = in_total.add(&take_pays)?;
            out_total = out_total.add(&take_gets)?;
            in_remaining = in_remaining.sub(&take_pays)?;

            if offer.is_fully_consumed() {
                offers_to_remove.push(key);
            } else {
                sandbox.update_entry(key, &LedgerEntry::Offer(offer));
            }
            self.offers_used.push(key);
        }

        if out_total.is_zero() {
            self.inactive = true;
        }
        let in_used = Amount::Issued {
            issue: self.in_issue,
            value: in_total,
        };
        let out_produced = Amount::Issued {
            issue: self.out_issue,
            value: out_total,
        };
        self.cached_in = Some(in_used);
        self.cached_out = Some(out_produced);
        Ok((in_used, out_produced))
    }

    pub fn quality_upper_bound(&self, sandbox: &PaymentSandbox) -> EngineResult<(Quality, crate::step::DebtDirection)> {
        for key in self.candidate_offer_keys(sandbox) {
            if let Some(offer) = self.read_offer(sandbox, &key) {
                if offer.is_fully_consumed() {
                    continue;
                }
                return Ok((offer.quality(), crate::step::DebtDirection::Issues));
            }
        }
        Ok((Quality::worst(), crate::step::DebtDirection::Issues))
    }
}

/// `value * num / den`, computed as an exact rational over each operand's
/// integer mantissa (the same technique `Number::mul_ratio` uses for
/// integer ratios, generalized to a `Number` numerator and denominator).
/// Kept exact rather than routed through `to_f64`, which is reserved for
/// quality-ordering heuristics only (`spec.md` §9).
fn scale_by_ratio(value: Number, num: Number, den: Number, round_up: bool) -> EngineResult<Number> {
    if den.is_zero() {
        return Err(EngineError::Invariant("scale_by_ratio with zero denominator"));
    }
    if value.is_zero() || num.is_zero() {
        return Ok(Number::ZERO);
    }
    let numerator = BigInt::from(value.mantissa()) * BigInt::from(num.mantissa());
    let denominator = BigInt::from(den.mantissa());
    let quotient = &numerator / &denominator;
    let remainder = &numerator % &denominator;

    let mantissa_bigint = if round_up && !remainder.is_zero() {
        let bump = if value.mantissa() >= 0 { 1 } else { -1 };
        quotient + BigInt::from(bump)
    } else {
        quotient
    };

    let mantissa: i128 = mantissa_bigint
        .to_string()
        .parse()
        .map_err(|_| EngineError::AmountOverflow("scale_by_ratio result exceeds i128"))?;
    let exponent = value.exponent() + num.exponent() - den.exponent();
    Number::from_parts(mantissa, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Currency;
    use crate::ledger::offer::OfferFlag;
    use crate::ledger::trust_line::TrustLineSide;
    use crate::ledger::{canonical_order, LedgerView, TrustLine};
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
        fn for_each(&self, prefix: &[u8], callback: &mut dyn FnMut(&LedgerKey, &[u8])) {
            for (key, bytes) in &self.entries {
                if key.0.starts_with(prefix) {
                    callback(key, bytes);
                }
            }
        }
        fn adjust_native_burned(&mut self, _drops: i64) {}
    }

    fn usd_issue(issuer: AccountId) -> Issue {
        Issue::new(Currency::from_code("USD"), issuer).unwrap()
    }

    fn eur_issue(issuer: AccountId) -> Issue {
        Issue::new(Currency::from_code("EUR"), issuer).unwrap()
    }

    /// Seeds a trust line so `holder` is owed `amount` of `issuer`'s
    /// currency, i.e. `holder` actually holds that balance to sell.
    fn fund_holder(view: &mut FakeView, holder: AccountId, issuer: AccountId, currency: Currency, amount: &str) {
        let (low, high) = canonical_order(holder, issuer);
        let balance = if low == holder {
            Number::from_decimal_str(amount).unwrap()
        } else {
            Number::from_decimal_str(amount).unwrap().negate()
        };
        let side = TrustLineSide {
            limit: Number::ZERO,
            quality_in: 0,
            quality_out: 0,
            no_ripple: false,
            freeze: false,
            authorized: false,
            reserve: false,
        };
        let line = TrustLine {
            low,
            high,
            currency,
            balance,
            low_side: side.clone(),
            high_side: side,
            previous_txn_id: None,
            previous_txn_lgr_seq: 0,
        };
        view.insert(LedgerKey::trust_line(holder, issuer, currency), LedgerEntry::TrustLine(line).to_bytes());
    }

    #[test]
    fn consumes_a_single_resting_offer_fully() {
        let owner = AccountId([7u8; 20]);
        let usd_issuer = AccountId([8u8; 20]);
        let eur_issuer = AccountId([9u8; 20]);
        let mut view = FakeView::default();
        fund_holder(&mut view, owner, eur_issuer, eur_issue(eur_issuer).currency, "50");
        let key = LedgerKey::directory_node(
            usd_issue(usd_issuer).currency,
            usd_issuer,
            eur_issue(eur_issuer).currency,
            eur_issuer,
            1,
        );
        let offer = Offer {
            account: owner,
            sequence: 1,
            flags: vec![] as Vec<OfferFlag>,
            taker_gets: Amount::Issued {
                issue: eur_issue(eur_issuer),
                value: Number::from_decimal_str("50").unwrap(),
            },
            taker_pays: Amount::Issued {
                issue: usd_issue(usd_issuer),
                value: Number::from_decimal_str("50").unwrap(),
            },
            book_directory: key,
            owner_node: 0,
            book_node: 0,
            expiration: None,
            previous_txn_id: None,
            previous_txn_lgr_seq: 0,
        };
        view.insert(key, LedgerEntry::Offer(offer).to_bytes());
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let mut step = BookStep::new(
            usd_issue(usd_issuer),
            eur_issue(eur_issuer),
            AccountId([1u8; 20]),
            AccountId([2u8; 20]),
            false,
            None,
        )
        .unwrap();
        let mut offers_to_remove = Vec::new();
        let (_, out_actual) = step
            .rev(
                &mut sandbox,
                &config,
                &mut offers_to_remove,
                Amount::Issued {
                    issue: eur_issue(eur_issuer),
                    value: Number::from_decimal_str("50").unwrap(),
                },
            )
            .unwrap();
        assert_eq!(out_actual.magnitude(), Number::from_decimal_str("50").unwrap());
        assert_eq!(offers_to_remove.len(), 1);
    }

    #[test]
    fn offer_owner_without_the_currency_to_sell_is_skipped() {
        let owner = AccountId([7u8; 20]);
        let usd_issuer = AccountId([8u8; 20]);
        let eur_issuer = AccountId([9u8; 20]);
        let mut view = FakeView::default();
        // No trust line funding `owner` with any EUR.
        let key = LedgerKey::directory_node(
            usd_issue(usd_issuer).currency,
            usd_issuer,
            eur_issue(eur_issuer).currency,
            eur_issuer,
            1,
        );
        let offer = Offer {
            account: owner,
            sequence: 1,
            flags: vec![] as Vec<OfferFlag>,
            taker_gets: Amount::Issued {
                issue: eur_issue(eur_issuer),
                value: Number::from_decimal_str("50").unwrap(),
            },
            taker_pays: Amount::Issued {
                issue: usd_issue(usd_issuer),
                value: Number::from_decimal_str("50").unwrap(),
            },
            book_directory: key,
            owner_node: 0,
            book_node: 0,
            expiration: None,
            previous_txn_id: None,
            previous_txn_lgr_seq: 0,
        };
        view.insert(key, LedgerEntry::Offer(offer).to_bytes());
        let mut sandbox = PaymentSandbox::new(&mut view);
        let config = EngineConfig::mainnet_defaults();
        let mut step = BookStep::new(
            usd_issue(usd_issuer),
            eur_issue(eur_issuer),
            AccountId([1u8; 20]),
            AccountId([2u8; 20]),
            false,
            None,
        )
        .unwrap();
        let mut offers_to_remove = Vec::new();
        let (_, out_actual) = step
            .rev(
                &mut sandbox,
                &config,
                &mut offers_to_remove,
                Amount::Issued {
                    issue: eur_issue(eur_issuer),
                    value: Number::from_decimal_str("50").unwrap(),
                },
            )
            .unwrap();
        assert_eq!(out_actual.magnitude(), Number::ZERO);
        assert_eq!(offers_to_remove.len(), 1);
    }

    #[test]
    fn an_expired_offer_is_removed_without_being_consumed() {
        let owner = AccountId([7u8; 20]);
        let usd_issuer = AccountId([8u8; 20]);
        let eur_issuer = AccountId([9u8; 20]);
        let mut view = FakeView::default();
        fund_holder(&mut view, owner, eur_issuer, eur_issue(eur_issuer).currency, "50");
        let key = LedgerKey::directory_node(
            usd_issue(usd_issuer).currency,
            usd_issuer,
            eur_issue(eur_issuer).currency,
            eur_issuer,
            1,
        );
        let offer = Offer {
            account: owner,
            sequence: 1,
            flags: vec![] as Vec<OfferFlag>,
            taker_gets: Amount::Issued {
                issue: eur_issue(eur_issuer),
                value: Number::from_decimal_str("50").unwrap(),
            },
            taker_pays: Amount::Issued {
                issue: usd_issue(usd_issuer),
                value: Number::from_decimal_str("50").unwrap(),
            },
            book_directory: key,
            owner_node: 0,
            book_node: 0,
            expiration: Some(100),
            previous_txn_id: None,
            previous_txn_lgr_seq: 0,
        };
        view.insert(key, LedgerEntry::Offer(offer).to_bytes());
        let mut sandbox = PaymentSandbox::new(&mut view);
        let mut config = EngineConfig::mainnet_defaults();
        config.close_time = 200;
        let mut step = BookStep::new(
            usd_issue(usd_issuer),
            eur_issue(eur_issuer),
            AccountId([1u8; 20]),
            AccountId([2u8; 20]),
            false,
            None,
        )
        .unwrap();
        let mut offers_to_remove = Vec::new();
        let (_, out_actual) = step
            .rev(
                &mut sandbox,
                &config,
                &mut offers_to_remove,
                Amount::Issued {
                    issue: eur_issue(eur_issuer),
                    value: Number::from_decimal_str("50").unwrap(),
                },
            )
            .unwrap();
        assert_eq!(out_actual.magnitude(), Number::ZERO);
        assert_eq!(offers_to_remove.len(), 1);
    }
}
