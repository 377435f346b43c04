//! Path normalization and step emission (`spec.md` §4.4).
//!
//! A strand is built from a source account, a source issue (the currency
//! `send_max` is denominated in), a destination issue (the currency the
//! destination receives), and zero or more explicit path elements. The
//! builder inserts the synthetic nodes `spec.md` §4.4 describes, then walks
//! consecutive node pairs to emit one [`Step`] per hop, rejecting paths that
//! are structurally malformed or that loop back through an account or issue
//! already used in this strand.

use std::collections::HashSet;

use crate::account::{AccountId, Issue};
use crate::error::ResultCode;
use crate::step::{BookStep, DirectStep, NativeStep, Step};

use super::node::Node;

/// One element of a caller-supplied explicit path: either an account hop or
/// a currency/issuer hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathElement {
    Account(AccountId),
    Issue(Issue),
}

/// The inputs needed to normalize and build one strand.
#[derive(Debug, Clone)]
pub struct StrandSpec<'a> {
    pub source: AccountId,
    pub destination: AccountId,
    /// The issue `send_max` (or the payment source's balance, lacking one)
    /// is denominated in.
    pub source_issue: Issue,
    /// The issue the destination is to receive.
    pub destination_issue: Issue,
    pub path: &'a [PathElement],
}

/// Normalizes `spec`'s path into node form and emits the strand's steps.
/// Returns a [`ResultCode`] (`bad_path`/`bad_path_loop`) rather than an
/// [`crate::error::EngineError`] because a malformed or looping path is a
/// normal, user-facing payment outcome, not an engine bug.
pub fn build_strand(spec: &StrandSpec) -> Result<Vec<Step>, ResultCode> {
    let nodes = normalize_nodes(spec)?;
    if nodes.len() < 2 {
        return Err(ResultCode::BadPath);
    }
    for node in &nodes {
        validate_node(node)?;
    }
    emit_steps(spec, &nodes)
}

fn normalize_nodes(spec: &StrandSpec) -> Result<Vec<Node>, ResultCode> {
    let mut nodes = vec![Node::Account(spec.source)];

    // A distinct non-native send-max issuer is inserted right after the
    // source, unless the first explicit path element already names it.
    if !spec.source_issue.is_native() {
        let already_named = matches!(
            spec.path.first(),
            Some(PathElement::Account(a)) if *a == spec.source_issue.issuer
        );
        if !already_named {
            nodes.push(Node::Account(spec.source_issue.issuer));
        }
    }

    for element in spec.path {
        match *element {
            PathElement::Account(a) => nodes.push(Node::Account(a)),
            PathElement::Issue(i) => nodes.push(Node::Issue(i)),
        }
    }

    let last_currency = nodes
        .iter()
        .rev()
        .find_map(|n| n.as_issue().map(|i| i.currency))
        .unwrap_or(spec.source_issue.currency);
    if last_currency != spec.destination_issue.currency {
        nodes.push(Node::Issue(spec.destination_issue));
    }

    let last_is_dest_issue = matches!(nodes.last(), Some(Node::Issue(i)) if *i == spec.destination_issue);
    let last_is_dest_issuer =
        matches!(nodes.last(), Some(Node::Account(a)) if *a == spec.destination_issue.issuer);
    if !spec.destination_issue.is_native() && !last_is_dest_issue && !last_is_dest_issuer {
        nodes.push(Node::Account(spec.destination_issue.issuer));
    }

    let last_is_dest = matches!(nodes.last(), Some(Node::Account(a)) if *a == spec.destination);
    if !last_is_dest {
        nodes.push(Node::Account(spec.destination));
    }

    Ok(nodes)
}

fn validate_node(node: &Node) -> Result<(), ResultCode> {
    match node {
        Node::Account(a) if a.is_native_issuer() => Err(ResultCode::BadPath),
        Node::Issue(i) if i.is_native() => Err(ResultCode::BadPath),
        _ => Ok(()),
    }
}

/// Walks consecutive node pairs, emitting a [`NativeStep`]/[`DirectStep`]/
/// [`BookStep`] per hop and tracking the currency currently flowing so each
/// step's issue is correctly threaded.
///
/// Loop detection tracks three sets, per `spec.md` §4.4: direct-step
/// sources, direct-step destinations, and book-step output issues. A book
/// output is also rejected if its issuer duplicates any prior direct source
/// or destination, per §4.4's cross-kind loop rule. The strand's own
/// endpoints are exempt (a path may legitimately revisit the payment source
/// or destination, e.g. a redeem-then-issue round trip).
fn emit_steps(spec: &StrandSpec, nodes: &[Node]) -> Result<Vec<Step>, ResultCode> {
    let mut steps = Vec::new();
    let mut current_issue = spec.source_issue;
    let mut direct_sources: HashSet<AccountId> = HashSet::new();
    let mut direct_dests: HashSet<AccountId> = HashSet::new();
    let mut book_outputs: HashSet<Issue> = HashSet::new();
    let last_node = *nodes.last().expect("normalize_nodes guarantees at least two nodes");

    for window in nodes.windows(2) {
        let from = window[0];
        let to = window[1];
        let is_last_edge = to == last_node;

        match (from, to) {
            (Node::Account(a), Node::Account(b)) => {
                if current_issue.is_native() {
                    steps.push(Step::Native(NativeStep::new(a, b, false)));
                    steps.push(Step::Native(NativeStep::new(b, a, true)));
                } else {
                    if a != spec.source && !direct_sources.insert(a) {
                        return Err(ResultCode::BadPathLoop);
                    }
                    if b != spec.destination && !direct_dests.insert(b) {
                        return Err(ResultCode::BadPathLoop);
                    }
                    let is_first = steps.is_empty();
                    steps.push(Step::Direct(DirectStep::new(
                        a,
                        b,
                        current_issue.currency,
                        is_first,
                        is_last_edge,
                    )));
                }
            }
            (Node::Account(a), Node::Issue(issue)) => {
                if !current_issue.is_native() && a != current_issue.issuer {
                    let is_first = steps.is_empty();
                    direct_sources.insert(a);
                    direct_dests.insert(current_issue.issuer);
                    steps.push(Step::Direct(DirectStep::new(
                        a,
                        current_issue.issuer,
                        current_issue.currency,
                        is_first,
                        false,
                    )));
                }
                if !book_outputs.insert(issue)
                    || direct_sources.contains(&issue.issuer)
                    || direct_dests.contains(&issue.issuer)
                {
                    return Err(ResultCode::BadPathLoop);
                }
                steps.push(Step::Book(
                    BookStep::new(current_issue, issue, spec.source, spec.destination, is_last_edge, None)
                        .map_err(|_| ResultCode::BadPath)?,
                ));
                current_issue = issue;
            }
            (Node::Issue(issue), Node::Account(b)) => {
                if issue.issuer != b {
                    direct_sources.insert(issue.issuer);
                    direct_dests.insert(b);
                    steps.push(Step::Direct(DirectStep::new(
                        issue.issuer,
                        b,
                        issue.currency,
                        false,
                        is_last_edge,
                    )));
                }
                // The issue now flowing is unchanged: `b` merely holds it.
            }
            (Node::Issue(a_issue), Node::Issue(b_issue)) => {
                if a_issue == b_issue {
                    return Err(ResultCode::BadPath);
                }
                if !book_outputs.insert(b_issue)
                    || direct_sources.contains(&b_issue.issuer)
                    || direct_dests.contains(&b_issue.issuer)
                {
                    return Err(ResultCode::BadPathLoop);
                }
                steps.push(Step::Book(
                    BookStep::new(a_issue, b_issue, spec.source, spec.destination, is_last_edge, None)
                        .map_err(|_| ResultCode::BadPath)?,
                ));
                current_issue = b_issue;
            }
        }
    }

    if steps.is_empty() {
        return Err(ResultCode::BadPath);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Currency;

    fn acct(n: u8) -> AccountId {
        AccountId([n; 20])
    }

    fn issue(code: &str, issuer: AccountId) -> Issue {
        Issue::new(Currency::from_code(code), issuer).unwrap()
    }

    #[test]
    fn pure_native_strand_is_two_native_steps() {
        let spec = StrandSpec {
            source: acct(1),
            destination: acct(2),
            source_issue: Issue::native(),
            destination_issue: Issue::native(),
            path: &[],
        };
        let steps = build_strand(&spec).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], Step::Native(_)));
        assert!(matches!(steps[1], Step::Native(_)));
    }

    #[test]
    fn direct_issued_strand_normalizes_issuer_endpoints() {
        let issuer = acct(9);
        let usd = issue("USD", issuer);
        let spec = StrandSpec {
            source: acct(1),
            destination: acct(2),
            source_issue: usd,
            destination_issue: usd,
            path: &[],
        };
        let steps = build_strand(&spec).unwrap();
        // source -> issuer -> destination: two direct steps.
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], Step::Direct(_)));
        assert!(matches!(steps[1], Step::Direct(_)));
    }

    #[test]
    fn cross_currency_strand_inserts_a_book_step() {
        let usd_issuer = acct(9);
        let eur_issuer = acct(10);
        let usd = issue("USD", usd_issuer);
        let eur = issue("EUR", eur_issuer);
        let spec = StrandSpec {
            source: acct(1),
            destination: acct(2),
            source_issue: usd,
            destination_issue: eur,
            path: &[],
        };
        let steps = build_strand(&spec).unwrap();
        assert!(steps.iter().any(|s| matches!(s, Step::Book(_))));
    }

    #[test]
    fn revisiting_a_direct_step_destination_is_a_loop() {
        let issuer = acct(9);
        let usd = issue("USD", issuer);
        let middle = acct(5);
        let spec = StrandSpec {
            source: acct(1),
            destination: acct(2),
            source_issue: usd,
            destination_issue: usd,
            path: &[
                PathElement::Account(middle),
                PathElement::Account(issuer),
                PathElement::Account(middle),
            ],
        };
        assert_eq!(build_strand(&spec).unwrap_err(), ResultCode::BadPathLoop);
    }

    #[test]
    fn a_book_output_issuer_matching_a_prior_direct_destination_is_a_loop() {
        let usd_issuer = acct(9);
        let eur_issuer = acct(10);
        let usd = issue("USD", usd_issuer);
        let eur = issue("EUR", eur_issuer);
        let spec = StrandSpec {
            source: acct(1),
            destination: acct(2),
            source_issue: usd,
            destination_issue: usd,
            // source -> usd_issuer (direct dest) -> eur_issuer (book output) -> usd_issuer (book output reuses a direct dest)
            path: &[PathElement::Issue(eur), PathElement::Issue(usd)],
        };
        assert_eq!(build_strand(&spec).unwrap_err(), ResultCode::BadPathLoop);
    }

    #[test]
    fn a_single_node_path_is_bad_path() {
        let spec = StrandSpec {
            source: acct(1),
            destination: acct(1),
            source_issue: Issue::native(),
            destination_issue: Issue::native(),
            path: &[],
        };
        // source == destination collapses every synthetic node to one.
        assert_eq!(build_strand(&spec).unwrap_err(), ResultCode::BadPath);
    }
}
