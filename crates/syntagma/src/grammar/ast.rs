//! Expression tree for one parsed grammar fragment.

/// Repetition/optionality mode of a grouped expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// Plain grouping, matched exactly once.
    Once,
    /// `x?` or legacy `[x]`.
    ZeroOrOne,
    /// `x*` or legacy `{x}`.
    ZeroOrMore,
    /// `x+`.
    OneOrMore,
    /// `x!`: matched once and required to consume at least one token.
    NonEmpty,
}

/// A fragment expression as written in a field's `#[rule(…)]` attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentExpr {
    /// `a | b | c`, tried in order.
    Alternation(Vec<FragmentExpr>),
    /// `a b c`.
    Sequence(Vec<FragmentExpr>),
    /// `@x`: capture the inner match into the annotated field.
    Capture(Box<FragmentExpr>),
    /// `@@`: capture a parse of the field's own production type.
    SelfCapture,
    /// `"text"` or `"text":Kind`.
    Literal { text: String, kind: Option<String> },
    /// A bare identifier naming a token kind.
    TokenRef(String),
    /// Grouped expression with a repetition mode.
    Group {
        inner: Box<FragmentExpr>,
        mode: GroupMode,
    },
    /// `!x`: exactly one token that would not start a match of `x`.
    Negation(Box<FragmentExpr>),
    /// `(?= x)` / `(?! x)`: zero-width probe.
    Lookahead {
        positive: bool,
        inner: Box<FragmentExpr>,
    },
    /// `"a"…"z"`: one token whose value lies in the inclusive range.
    Range { lo: String, hi: String },
}
