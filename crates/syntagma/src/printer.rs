//! Canonical EBNF-style rendering of a compiled grammar.
//!
//! Productions render upper-case as declared, token references lower-case in
//! angle brackets, literals quoted, with the `? * + !` modifiers. The same
//! renderer produces the "expected …" half of parse errors.

use crate::grammar::GroupMode;
use crate::graph::{Grammar, Node, NodeId};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Alternation,
    Sequence,
    Unary,
}

/// Renders every production, one `Name = expr` line each, root first.
pub(crate) fn render_grammar(grammar: &Grammar) -> String {
    let mut out = String::new();
    for (i, (name, node)) in grammar.production_names().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let body = match grammar.node(node) {
            Node::Record(record) => render(grammar, record.expr, Prec::Alternation),
            _ => render(grammar, node, Prec::Alternation),
        };
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(&body);
    }
    out
}

/// A short description of what `id` matches, for diagnostics.
pub(crate) fn describe(grammar: &Grammar, id: NodeId) -> String {
    render(grammar, id, Prec::Alternation)
}

fn render(grammar: &Grammar, id: NodeId, prec: Prec) -> String {
    match grammar.node(id) {
        Node::Placeholder => "<?>".to_string(),
        Node::Record(record) => record.name.to_string(),
        Node::Variant { inner, .. } => render(grammar, *inner, prec),
        Node::Capture { inner, .. } => render(grammar, *inner, prec),
        Node::Disjunction { alts, .. } => {
            let body = alts
                .iter()
                .map(|alt| render(grammar, *alt, Prec::Alternation))
                .collect::<Vec<_>>()
                .join(" | ");
            parenthesize(body, Prec::Alternation, prec)
        }
        Node::Sequence { items } => {
            let body = items
                .iter()
                .map(|item| render(grammar, *item, Prec::Sequence))
                .collect::<Vec<_>>()
                .join(" ");
            parenthesize(body, Prec::Sequence, prec)
        }
        Node::Reference { name, .. } => format!("<{}>", name.to_lowercase()),
        Node::Literal {
            text, kind_name, ..
        } => match kind_name {
            Some(kind) => format!("{text:?}:{kind}"),
            None => format!("{text:?}"),
        },
        Node::Group { inner, mode, .. } => match mode {
            GroupMode::Once => format!("({})", render(grammar, *inner, Prec::Alternation)),
            GroupMode::ZeroOrOne => format!("{}?", render(grammar, *inner, Prec::Unary)),
            GroupMode::ZeroOrMore => format!("{}*", render(grammar, *inner, Prec::Unary)),
            GroupMode::OneOrMore => format!("{}+", render(grammar, *inner, Prec::Unary)),
            GroupMode::NonEmpty => format!("{}!", render(grammar, *inner, Prec::Unary)),
        },
        Node::Negation { inner } => format!("!{}", render(grammar, *inner, Prec::Unary)),
        Node::Lookahead { positive, inner } => format!(
            "(?{} {})",
            if *positive { "=" } else { "!" },
            render(grammar, *inner, Prec::Alternation)
        ),
        Node::Range { lo, hi } => format!("{lo:?}…{hi:?}"),
        Node::Custom { name, .. } => name.to_string(),
    }
}

fn parenthesize(body: String, own: Prec, context: Prec) -> String {
    if own < context { format!("({body})") } else { body }
}
