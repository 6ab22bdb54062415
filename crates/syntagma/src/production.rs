//! Type metadata connecting user AST types to the grammar compiler.
//!
//! The derive macro implements [`Production`] for annotated structs and
//! enums. The impl carries no grammar logic of its own: it hands the compiler
//! field names, rule fragments and erased function pointers, and the compiler
//! does the rest at parser construction time.

use std::any::Any;
use std::sync::Arc;

use crate::capture::{Capture, Values};
use crate::compile::GrammarCompiler;
use crate::error::{BuildError, ParseError};
use crate::graph::NodeId;
use crate::lexer::PeekingLexer;
use crate::token::Position;

/// Allocates a fresh, empty record instance.
pub type MakeFn = fn() -> Box<dyn Any>;

/// Applies one capture event to a field of the (type-erased) record.
pub type ApplyFn = fn(&mut dyn Any, &mut Values, &Position) -> Result<(), ParseError>;

/// Wraps a completed variant payload into its enum.
pub type ConstructFn = fn(Box<dyn Any>, &Position) -> Result<Box<dyn Any>, ParseError>;

/// A custom parse function driving the peeking lexer directly.
/// `Ok(None)` is a miss; the caller may try other alternatives.
pub type CustomParseFn =
    Arc<dyn Fn(&mut PeekingLexer) -> Result<Option<Box<dyn Any>>, ParseError> + Send + Sync>;

/// A named record or union type that acts as one grammar production.
pub trait Production: Sized + 'static {
    /// Production name, as rendered in diagnostics and grammar output.
    const NAME: &'static str;

    /// Compiles this production onto the grammar graph. Generated by the
    /// derive macro; must call exactly one of [`GrammarCompiler::record`],
    /// [`GrammarCompiler::union`] or [`GrammarCompiler::custom`].
    fn compile(cc: &mut GrammarCompiler<'_>) -> Result<NodeId, BuildError>;
}

/// A type that parses itself off the token stream, bypassing the grammar
/// compiler. Return [`ParseError::NoMatch`] to signal a miss.
pub trait Parseable: Sized + 'static {
    fn parse(lex: &mut PeekingLexer) -> Result<Self, ParseError>;
}

/// Compile-time handle to a production type, carried by [`Capture`] targets
/// so `@@` can find the production behind `Vec<T>`, `Option<T>` or `Box<T>`.
#[derive(Clone, Copy)]
pub struct ProductionHook {
    pub(crate) name: &'static str,
    pub(crate) compile: fn(&mut GrammarCompiler<'_>) -> Result<NodeId, BuildError>,
}

impl ProductionHook {
    pub fn of<T: Production>() -> Self {
        Self {
            name: T::NAME,
            compile: |cc| cc.production::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for ProductionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductionHook")
            .field("name", &self.name)
            .finish()
    }
}

/// What a field can absorb, plus the erased setter for it.
pub struct FieldTarget {
    pub(crate) accepts_text: bool,
    pub(crate) production: Option<ProductionHook>,
    pub(crate) apply: ApplyFn,
}

impl FieldTarget {
    pub fn of<F: Capture>(apply: ApplyFn) -> Self {
        Self {
            accepts_text: F::ACCEPTS_TEXT,
            production: F::production(),
            apply,
        }
    }
}

/// One grammar-bearing field of a record production.
pub struct FieldSpec {
    pub name: &'static str,
    pub rule: &'static str,
    pub target: FieldTarget,
}

/// Everything the compiler needs to lower a record production.
pub struct RecordSpec {
    pub name: &'static str,
    pub make: MakeFn,
    /// Setter for a `Position` field filled at the record's first token.
    pub pos: Option<ApplyFn>,
    /// Setter for a `Position` field filled past the record's last token.
    pub end_pos: Option<ApplyFn>,
    pub fields: Vec<FieldSpec>,
}

/// One variant of a union production.
pub struct VariantSpec {
    pub name: &'static str,
    pub production: Option<ProductionHook>,
    pub construct: ConstructFn,
}

impl VariantSpec {
    pub fn of<F: Capture>(name: &'static str, construct: ConstructFn) -> Self {
        Self {
            name,
            production: F::production(),
            construct,
        }
    }
}

/// Implements [`Production`] and [`Capture`] for a type that already
/// implements [`Parseable`], letting it be used as a field target.
#[macro_export]
macro_rules! parseable {
    ($ty:ty) => {
        impl $crate::Production for $ty {
            const NAME: &'static str = stringify!($ty);

            fn compile(
                cc: &mut $crate::compile::GrammarCompiler<'_>,
            ) -> ::core::result::Result<$crate::graph::NodeId, $crate::BuildError> {
                cc.custom(stringify!($ty), |lex| {
                    match <$ty as $crate::Parseable>::parse(lex) {
                        ::core::result::Result::Ok(value) => ::core::result::Result::Ok(
                            ::core::option::Option::Some(::std::boxed::Box::new(value)
                                as ::std::boxed::Box<dyn ::core::any::Any>),
                        ),
                        ::core::result::Result::Err($crate::ParseError::NoMatch) => {
                            ::core::result::Result::Ok(::core::option::Option::None)
                        }
                        ::core::result::Result::Err(err) => ::core::result::Result::Err(err),
                    }
                })
            }
        }

        impl $crate::Capture for $ty {
            const ACCEPTS_TEXT: bool = false;

            fn production() -> ::core::option::Option<$crate::production::ProductionHook> {
                ::core::option::Option::Some($crate::production::ProductionHook::of::<$ty>())
            }

            fn from_values(
                values: &mut $crate::Values,
                at: &$crate::Position,
            ) -> ::core::result::Result<Self, $crate::ParseError> {
                values.take_node::<$ty>(at)
            }
        }
    };
}
