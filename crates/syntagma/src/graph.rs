//! The compiled grammar graph.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]; record
//! nodes are memoized per production type, so recursive grammars form cycles
//! through record ids while every other child is owned by its parent.

use std::any::TypeId;

use indexmap::IndexMap;

use crate::compile::lookahead::Decision;
use crate::grammar::GroupMode;
use crate::production::{ApplyFn, ConstructFn, CustomParseFn, MakeFn};
use crate::token::TokenKind;

/// Index into [`Grammar::nodes`].
pub type NodeId = u32;

pub(crate) struct RecordNode {
    pub name: &'static str,
    pub make: MakeFn,
    pub expr: NodeId,
    pub pos: Option<ApplyFn>,
    pub end_pos: Option<ApplyFn>,
}

pub(crate) struct FieldBinding {
    pub name: &'static str,
    pub apply: ApplyFn,
}

pub(crate) enum Node {
    /// Reserved slot while its production is being compiled. A finished
    /// grammar contains none.
    Placeholder,
    /// Allocates a record, runs `expr`, yields the completed instance.
    Record(RecordNode),
    /// Parses `inner` and wraps the result into an enum variant.
    Variant {
        name: &'static str,
        construct: ConstructFn,
        inner: NodeId,
    },
    /// Ordered alternatives; `table` short-circuits the choice when built.
    Disjunction {
        alts: Vec<NodeId>,
        table: Option<Decision>,
    },
    /// Head-to-tail items. A head miss is the caller's miss; a tail miss is
    /// a hard error.
    Sequence { items: Vec<NodeId> },
    /// Schedules the inner match's values onto a field of the enclosing
    /// record.
    Capture { field: FieldBinding, inner: NodeId },
    /// Any token of one kind.
    Reference { kind: TokenKind, name: String },
    /// A token whose text equals `text`, optionally constrained to a kind.
    /// `raw` literals match through the raw channel, seeing elided tokens.
    Literal {
        text: String,
        kind: Option<TokenKind>,
        kind_name: Option<String>,
        raw: bool,
    },
    /// Grouped expression with a repetition mode; `table` holds the
    /// enter-decision for the optional and repeating modes.
    Group {
        inner: NodeId,
        mode: GroupMode,
        table: Option<Decision>,
    },
    /// One token that would not start a match of `inner`.
    Negation { inner: NodeId },
    /// Zero-width probe.
    Lookahead { positive: bool, inner: NodeId },
    /// A token whose text lies in the inclusive range.
    Range { lo: String, hi: String },
    /// User-supplied parse function (`Parseable` or a per-type override).
    Custom {
        name: &'static str,
        parse: CustomParseFn,
    },
}

pub(crate) struct ProdEntry {
    pub name: &'static str,
    pub node: NodeId,
}

/// An immutable compiled grammar: the node arena plus the production
/// registry, rooted at the type the parser was built for.
pub struct Grammar {
    pub(crate) nodes: Vec<Node>,
    pub(crate) productions: IndexMap<TypeId, ProdEntry>,
    pub(crate) root: NodeId,
}

impl Grammar {
    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    /// Production names in compilation order; the root comes first.
    pub(crate) fn production_names(&self) -> impl Iterator<Item = (&'static str, NodeId)> + '_ {
        self.productions.values().map(|e| (e.name, e.node))
    }
}
