//! Lookahead pre-pass.
//!
//! For every disjunction and every optional/repeating group, attempts to
//! build a decision table keyed by the next up-to-N tokens. Alternatives are
//! expanded symbolically, following record indirection but never through the
//! same record twice. Tables are only kept when the expansion is exact and
//! unambiguous; anything else falls back to runtime branch-and-try.

use unicase::UniCase;

use crate::error::BuildError;
use crate::grammar::GroupMode;
use crate::graph::{Grammar, Node, NodeId};
use crate::token::TokenKind;

/// Upper bound on symbolic prefixes per node before giving up.
const MAX_PREFIXES: usize = 64;

/// Matches one token of a symbolic prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenMatcher {
    Kind(TokenKind),
    Text {
        text: String,
        kind: Option<TokenKind>,
    },
    Range {
        lo: String,
        hi: String,
    },
}

/// A decision table: the first entry whose matchers all hold selects its
/// alternative; no entry means miss.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Decision {
    pub entries: Vec<(Vec<TokenMatcher>, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
struct Prefix {
    matchers: Vec<TokenMatcher>,
    /// True when the matchers are exactly one full match of the node, not a
    /// truncated or extendable front.
    complete: bool,
}

impl Prefix {
    fn empty() -> Self {
        Self {
            matchers: Vec::new(),
            complete: true,
        }
    }
}

/// Builds decision tables for every owned disjunction and group of every
/// production.
pub(crate) fn build_tables(grammar: &mut Grammar, depth: usize) -> Result<(), BuildError> {
    let mut tables: Vec<(NodeId, Decision)> = Vec::new();

    let entries: Vec<(&'static str, NodeId)> = grammar.production_names().collect();
    for (name, node) in entries {
        for id in owned_nodes(grammar, node) {
            match grammar.node(id) {
                Node::Disjunction { alts, .. } => {
                    if let Some(decision) = disjunction_table(grammar, name, alts, depth)? {
                        tables.push((id, decision));
                    }
                }
                Node::Group { inner, mode, .. } if matches!(
                    mode,
                    GroupMode::ZeroOrOne | GroupMode::ZeroOrMore | GroupMode::OneOrMore
                ) =>
                {
                    if let Some(decision) = enter_table(grammar, *inner, depth) {
                        tables.push((id, decision));
                    }
                }
                _ => {}
            }
        }
    }

    for (id, decision) in tables {
        match &mut grammar.nodes[id as usize] {
            Node::Disjunction { table, .. } | Node::Group { table, .. } => {
                *table = Some(decision);
            }
            _ => unreachable!("table computed for a node without a table slot"),
        }
    }
    Ok(())
}

/// The nodes belonging to one production's own subtree, stopping at record
/// boundaries (other productions own those).
fn owned_nodes(grammar: &Grammar, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![(root, true)];
    while let Some((id, is_root)) = stack.pop() {
        match grammar.node(id) {
            Node::Record(record) => {
                if is_root {
                    stack.push((record.expr, false));
                }
            }
            Node::Variant { inner, .. } => {
                out.push(id);
                stack.push((*inner, false));
            }
            Node::Disjunction { alts, .. } => {
                out.push(id);
                for alt in alts {
                    stack.push((*alt, false));
                }
            }
            Node::Sequence { items } => {
                out.push(id);
                for item in items {
                    stack.push((*item, false));
                }
            }
            Node::Capture { inner, .. }
            | Node::Group { inner, .. }
            | Node::Negation { inner }
            | Node::Lookahead { inner, .. } => {
                out.push(id);
                stack.push((*inner, false));
            }
            Node::Reference { .. }
            | Node::Literal { .. }
            | Node::Range { .. }
            | Node::Custom { .. }
            | Node::Placeholder => {
                out.push(id);
            }
        }
    }
    out
}

fn disjunction_table(
    grammar: &Grammar,
    production: &str,
    alts: &[NodeId],
    depth: usize,
) -> Result<Option<Decision>, BuildError> {
    let mut per_alt = Vec::with_capacity(alts.len());
    for alt in alts {
        let mut visiting = Vec::new();
        match expand(grammar, *alt, depth, &mut visiting) {
            Some(prefixes) => per_alt.push(prefixes),
            None => return Ok(None),
        }
    }

    // Two alternatives that expand to the same complete prefixes can never
    // be told apart by any input.
    for i in 0..per_alt.len() {
        for j in i + 1..per_alt.len() {
            if identical_complete(&per_alt[i], &per_alt[j]) {
                return Err(BuildError::InconsistentLookahead {
                    production: production.to_string(),
                    left: i,
                    right: j,
                    depth,
                });
            }
        }
    }

    // Any cross-alternative prefix overlap leaves the choice to runtime.
    for i in 0..per_alt.len() {
        for j in i + 1..per_alt.len() {
            for a in &per_alt[i] {
                for b in &per_alt[j] {
                    if prefixes_overlap(a, b) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    let mut entries = Vec::new();
    for (index, prefixes) in per_alt.into_iter().enumerate() {
        for prefix in prefixes {
            entries.push((prefix.matchers, index));
        }
    }
    Ok(Some(Decision { entries }))
}

/// Enter-decision for an optional or repeating group: token prefixes after
/// which attempting the body is worthwhile. Only exact, non-nullable
/// expansions qualify.
fn enter_table(grammar: &Grammar, inner: NodeId, depth: usize) -> Option<Decision> {
    let mut visiting = Vec::new();
    let prefixes = expand(grammar, inner, depth, &mut visiting)?;
    if prefixes.iter().any(|p| p.matchers.is_empty()) {
        return None;
    }
    Some(Decision {
        entries: prefixes.into_iter().map(|p| (p.matchers, 0)).collect(),
    })
}

fn identical_complete(a: &[Prefix], b: &[Prefix]) -> bool {
    a.iter().all(|p| p.complete)
        && b.iter().all(|p| p.complete)
        && a.len() == b.len()
        && a.iter().all(|p| b.contains(p))
}

fn prefixes_overlap(a: &Prefix, b: &Prefix) -> bool {
    let n = a.matchers.len().min(b.matchers.len());
    if n == 0 {
        // A nullable prefix shares its (empty) front with everything.
        return true;
    }
    (0..n).all(|i| matchers_overlap(&a.matchers[i], &b.matchers[i]))
}

/// Conservative: true whenever both matchers could accept the same token.
/// Case differences count as overlap so case-insensitive kinds stay sound.
fn matchers_overlap(a: &TokenMatcher, b: &TokenMatcher) -> bool {
    use TokenMatcher::*;
    match (a, b) {
        (Kind(x), Kind(y)) => x == y,
        (Kind(x), Text { kind: Some(y), .. }) | (Text { kind: Some(y), .. }, Kind(x)) => x == y,
        (Kind(_), Text { kind: None, .. }) | (Text { kind: None, .. }, Kind(_)) => true,
        (
            Text {
                text: ta, kind: ka, ..
            },
            Text {
                text: tb, kind: kb, ..
            },
        ) => {
            let kinds_compatible = match (ka, kb) {
                (Some(x), Some(y)) => x == y,
                _ => true,
            };
            kinds_compatible && UniCase::new(ta) == UniCase::new(tb)
        }
        (Range { lo, hi }, Text { text, .. }) | (Text { text, .. }, Range { lo, hi }) => {
            lo.as_str() <= text.as_str() && text.as_str() <= hi.as_str()
        }
        (Range { .. }, Kind(_)) | (Kind(_), Range { .. }) => true,
        (Range { lo: la, hi: ha }, Range { lo: lb, hi: hb }) => la <= hb && lb <= ha,
    }
}

/// All token prefixes (up to `depth`) with which `id` can match.
///
/// `None` means the node cannot be expanded exactly: custom parsers,
/// probes, negations, raw-channel literals, recursion, or a blow-up past
/// [`MAX_PREFIXES`].
fn expand(
    grammar: &Grammar,
    id: NodeId,
    depth: usize,
    visiting: &mut Vec<NodeId>,
) -> Option<Vec<Prefix>> {
    match grammar.node(id) {
        Node::Placeholder => None,
        Node::Record(record) => {
            if visiting.contains(&id) {
                return None;
            }
            visiting.push(id);
            let result = expand(grammar, record.expr, depth, visiting);
            visiting.pop();
            result
        }
        Node::Variant { inner, .. } => expand(grammar, *inner, depth, visiting),
        Node::Capture { inner, .. } => expand(grammar, *inner, depth, visiting),
        Node::Disjunction { alts, .. } => {
            let mut out = Vec::new();
            for alt in alts {
                out.extend(expand(grammar, *alt, depth, visiting)?);
            }
            dedup(&mut out);
            (out.len() <= MAX_PREFIXES).then_some(out)
        }
        Node::Sequence { items } => {
            let mut acc = vec![Prefix::empty()];
            for item in items {
                let expansions = expand(grammar, *item, depth, visiting)?;
                let mut next = Vec::new();
                for prefix in &acc {
                    if !prefix.complete || prefix.matchers.len() >= depth {
                        next.push(Prefix {
                            matchers: prefix.matchers.clone(),
                            complete: false,
                        });
                        continue;
                    }
                    for expansion in &expansions {
                        let mut matchers = prefix.matchers.clone();
                        let mut complete = expansion.complete;
                        for matcher in &expansion.matchers {
                            if matchers.len() >= depth {
                                complete = false;
                                break;
                            }
                            matchers.push(matcher.clone());
                        }
                        next.push(Prefix { matchers, complete });
                    }
                }
                dedup(&mut next);
                if next.len() > MAX_PREFIXES {
                    return None;
                }
                acc = next;
            }
            Some(acc)
        }
        Node::Reference { kind, .. } => Some(vec![Prefix {
            matchers: vec![TokenMatcher::Kind(*kind)],
            complete: true,
        }]),
        Node::Literal { raw: true, .. } => None,
        Node::Literal { text, kind, .. } => Some(vec![Prefix {
            matchers: vec![TokenMatcher::Text {
                text: text.clone(),
                kind: *kind,
            }],
            complete: true,
        }]),
        Node::Range { lo, hi } => Some(vec![Prefix {
            matchers: vec![TokenMatcher::Range {
                lo: lo.clone(),
                hi: hi.clone(),
            }],
            complete: true,
        }]),
        Node::Group { inner, mode, .. } => {
            let inner = expand(grammar, *inner, depth, visiting)?;
            let mut out = match mode {
                GroupMode::Once | GroupMode::NonEmpty => inner,
                GroupMode::ZeroOrOne => {
                    let mut out = inner;
                    out.push(Prefix::empty());
                    out
                }
                GroupMode::ZeroOrMore => {
                    // One unrolling; further iterations leave the prefix open.
                    let mut out: Vec<Prefix> = inner
                        .into_iter()
                        .map(|p| Prefix {
                            matchers: p.matchers,
                            complete: false,
                        })
                        .collect();
                    out.push(Prefix::empty());
                    out
                }
                GroupMode::OneOrMore => inner
                    .into_iter()
                    .map(|p| Prefix {
                        matchers: p.matchers,
                        complete: false,
                    })
                    .collect(),
            };
            dedup(&mut out);
            (out.len() <= MAX_PREFIXES).then_some(out)
        }
        Node::Negation { .. } | Node::Lookahead { .. } | Node::Custom { .. } => None,
    }
}

fn dedup(prefixes: &mut Vec<Prefix>) {
    let mut seen: Vec<Prefix> = Vec::with_capacity(prefixes.len());
    prefixes.retain(|p| {
        if seen.contains(p) {
            false
        } else {
            seen.push(p.clone());
            true
        }
    });
}
