//! The grammar compiler.
//!
//! Walks [`Production`] metadata depth-first, memoizing each production type
//! by `TypeId` so recursive grammars compile to finite, cyclic graphs. Each
//! field's fragment is lexed, parsed and lowered onto the node arena, with
//! every static shape check applied along the way.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::error::BuildError;
use crate::grammar::{FragmentError, FragmentExpr, parse_fragment};
use crate::graph::{FieldBinding, Grammar, Node, NodeId, ProdEntry, RecordNode};
use crate::lexer::{PeekingLexer, Symbols};
use crate::production::{
    CustomParseFn, FieldSpec, Production, RecordSpec, VariantSpec,
};
use crate::token::TokenKind;

use super::lookahead;

/// Compiles production types onto a node arena. One per parser build.
pub struct GrammarCompiler<'a> {
    nodes: Vec<Node>,
    productions: IndexMap<TypeId, ProdEntry>,
    /// Node reserved by `production()` for the type currently compiling.
    pending: Option<NodeId>,
    symbols: &'a Symbols,
    /// Kinds the peeking lexer hides; literals naming them explicitly match
    /// through the raw channel instead.
    elided: &'a IndexSet<TokenKind>,
    /// Per-type parse overrides registered on the builder.
    hooks: &'a HashMap<TypeId, CustomParseFn>,
}

impl<'a> GrammarCompiler<'a> {
    pub(crate) fn new(
        symbols: &'a Symbols,
        elided: &'a IndexSet<TokenKind>,
        hooks: &'a HashMap<TypeId, CustomParseFn>,
    ) -> Self {
        Self {
            nodes: Vec::new(),
            productions: IndexMap::new(),
            pending: None,
            symbols,
            elided,
            hooks,
        }
    }

    /// Compiles the whole grammar rooted at `T`, then runs the lookahead
    /// pre-pass at the given depth.
    pub(crate) fn compile_root<T: Production>(
        mut self,
        depth: usize,
    ) -> Result<Grammar, BuildError> {
        let root = self.production::<T>()?;
        let mut grammar = Grammar {
            nodes: self.nodes,
            productions: self.productions,
            root,
        };
        lookahead::build_tables(&mut grammar, depth)?;
        Ok(grammar)
    }

    /// The node for production `T`, compiling it on first use.
    pub fn production<T: Production>(&mut self) -> Result<NodeId, BuildError> {
        let tid = TypeId::of::<T>();
        if let Some(entry) = self.productions.get(&tid) {
            return Ok(entry.node);
        }

        if let Some(parse) = self.hooks.get(&tid) {
            let id = self.reserve();
            self.productions.insert(tid, ProdEntry { name: T::NAME, node: id });
            self.nodes[id as usize] = Node::Custom {
                name: T::NAME,
                parse: parse.clone(),
            };
            return Ok(id);
        }

        // Reserve the slot first so recursive references resolve to it.
        let id = self.reserve();
        self.productions.insert(tid, ProdEntry { name: T::NAME, node: id });
        self.pending = Some(id);
        let built = T::compile(self)?;
        debug_assert_eq!(built, id, "Production::compile must fill the reserved node");
        Ok(id)
    }

    /// Lowers a record production: one node per grammar-bearing field, joined
    /// in declaration order.
    pub fn record(&mut self, spec: RecordSpec) -> Result<NodeId, BuildError> {
        let id = self.take_slot();

        if spec.fields.is_empty() {
            return Err(BuildError::EmptyProduction {
                name: spec.name.to_string(),
            });
        }

        let mut items = Vec::with_capacity(spec.fields.len());
        for field in &spec.fields {
            let expr = parse_fragment(field.rule).map_err(|error| match error {
                FragmentError::EmptyAlternative => BuildError::EmptyAlternative {
                    production: spec.name.to_string(),
                    field: field.name.to_string(),
                },
                FragmentError::Other(message) => BuildError::FragmentSyntax {
                    production: spec.name.to_string(),
                    field: field.name.to_string(),
                    message,
                },
            })?;
            items.push(self.lower(&expr, spec.name, field, false)?);
        }

        let expr = if items.len() == 1 {
            items[0]
        } else {
            self.push(Node::Sequence { items })
        };

        self.nodes[id as usize] = Node::Record(RecordNode {
            name: spec.name,
            make: spec.make,
            expr,
            pos: spec.pos,
            end_pos: spec.end_pos,
        });
        Ok(id)
    }

    /// Lowers a union production: a disjunction over its variants.
    pub fn union(
        &mut self,
        name: &'static str,
        variants: Vec<VariantSpec>,
    ) -> Result<NodeId, BuildError> {
        let id = self.take_slot();

        if variants.is_empty() {
            return Err(BuildError::EmptyProduction {
                name: name.to_string(),
            });
        }

        let mut alts = Vec::with_capacity(variants.len());
        for variant in variants {
            let hook = variant.production.ok_or_else(|| BuildError::InvalidCapture {
                production: name.to_string(),
                field: variant.name.to_string(),
                reason: "variant type is not a production".to_string(),
            })?;
            let inner = (hook.compile)(self)?;
            alts.push(self.push(Node::Variant {
                name: variant.name,
                construct: variant.construct,
                inner,
            }));
        }

        self.nodes[id as usize] = Node::Disjunction { alts, table: None };
        Ok(id)
    }

    /// Installs a custom parse function as this production's node.
    pub fn custom(
        &mut self,
        name: &'static str,
        parse: fn(&mut PeekingLexer) -> Result<Option<Box<dyn Any>>, crate::error::ParseError>,
    ) -> Result<NodeId, BuildError> {
        let id = self.take_slot();
        self.nodes[id as usize] = Node::Custom {
            name,
            parse: std::sync::Arc::new(parse),
        };
        Ok(id)
    }

    fn reserve(&mut self) -> NodeId {
        self.push(Node::Placeholder)
    }

    fn take_slot(&mut self) -> NodeId {
        match self.pending.take() {
            Some(id) => id,
            None => self.reserve(),
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    fn lower(
        &mut self,
        expr: &FragmentExpr,
        production: &'static str,
        field: &FieldSpec,
        in_capture: bool,
    ) -> Result<NodeId, BuildError> {
        match expr {
            FragmentExpr::Alternation(alternatives) => {
                let mut alts = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    alts.push(self.lower(alternative, production, field, in_capture)?);
                }
                Ok(self.push(Node::Disjunction { alts, table: None }))
            }
            FragmentExpr::Sequence(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.lower(element, production, field, in_capture)?);
                }
                Ok(self.push(Node::Sequence { items }))
            }
            FragmentExpr::Capture(inner) => {
                if in_capture {
                    return Err(self.invalid(production, field, "captures cannot nest"));
                }
                if !field.target.accepts_text {
                    return Err(self.invalid(
                        production,
                        field,
                        "field cannot hold captured token text; use @@ for productions",
                    ));
                }
                let inner = self.lower(inner, production, field, true)?;
                Ok(self.push(Node::Capture {
                    field: FieldBinding {
                        name: field.name,
                        apply: field.target.apply,
                    },
                    inner,
                }))
            }
            FragmentExpr::SelfCapture => {
                if in_capture {
                    return Err(self.invalid(production, field, "captures cannot nest"));
                }
                let Some(hook) = field.target.production else {
                    return Err(self.invalid(
                        production,
                        field,
                        "field cannot hold a parsed production",
                    ));
                };
                let inner = (hook.compile)(self)?;
                Ok(self.push(Node::Capture {
                    field: FieldBinding {
                        name: field.name,
                        apply: field.target.apply,
                    },
                    inner,
                }))
            }
            FragmentExpr::Literal { text, kind } => {
                let (kind_code, kind_name, raw) = match kind {
                    Some(name) => {
                        let code = self.resolve_token(name, production, field)?;
                        (Some(code), Some(name.clone()), self.elided.contains(&code))
                    }
                    None => (None, None, false),
                };
                Ok(self.push(Node::Literal {
                    text: text.clone(),
                    kind: kind_code,
                    kind_name,
                    raw,
                }))
            }
            FragmentExpr::TokenRef(name) => {
                let kind = self.resolve_token(name, production, field)?;
                Ok(self.push(Node::Reference {
                    kind,
                    name: name.clone(),
                }))
            }
            FragmentExpr::Group { inner, mode } => {
                let inner = self.lower(inner, production, field, in_capture)?;
                Ok(self.push(Node::Group {
                    inner,
                    mode: *mode,
                    table: None,
                }))
            }
            FragmentExpr::Negation(inner) => {
                let inner = self.lower(inner, production, field, in_capture)?;
                Ok(self.push(Node::Negation { inner }))
            }
            FragmentExpr::Lookahead { positive, inner } => {
                let inner = self.lower(inner, production, field, in_capture)?;
                Ok(self.push(Node::Lookahead {
                    positive: *positive,
                    inner,
                }))
            }
            FragmentExpr::Range { lo, hi } => Ok(self.push(Node::Range {
                lo: lo.clone(),
                hi: hi.clone(),
            })),
        }
    }

    fn resolve_token(
        &self,
        name: &str,
        production: &'static str,
        field: &FieldSpec,
    ) -> Result<TokenKind, BuildError> {
        self.symbols
            .kind(name)
            .ok_or_else(|| BuildError::UnknownToken {
                production: production.to_string(),
                field: field.name.to_string(),
                name: name.to_string(),
            })
    }

    fn invalid(&self, production: &'static str, field: &FieldSpec, reason: &str) -> BuildError {
        BuildError::InvalidCapture {
            production: production.to_string(),
            field: field.name.to_string(),
            reason: reason.to_string(),
        }
    }
}
