//! syntagma: recursive-descent parsers declared on the AST types they build.
//!
//! A grammar is attached to a type with `#[rule(…)]` field attributes; the
//! parser is compiled from the type at construction time and a successful
//! parse *is* the populated AST value.
//!
//! - `lexer` - token sources: the simple classifier, the stateful
//!   regex lexer, and the peeking buffer the engine reads through
//! - `grammar` - the fragment annotation language
//! - `compile` - grammar compilation and the lookahead pre-pass
//! - `engine` - graph evaluation with deferred effects
//! - `recover` - error recovery strategies
//!
//! # Example
//!
//! ```
//! use syntagma::{Parser, Production};
//!
//! #[derive(Debug, Production)]
//! struct Property {
//!     #[rule("@Ident '='")]
//!     key: String,
//!     #[rule("@(Ident | String | Int | Float)")]
//!     value: String,
//! }
//!
//! let parser = Parser::<Property>::new().expect("grammar compiles");
//! let property = parser.parse_str("demo.ini", "answer = 42").unwrap();
//! assert_eq!(property.key, "answer");
//! assert_eq!(property.value, "42");
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// Lets code generated by the derive macro name this crate as `syntagma`
// from inside the crate itself (tests, doctests).
extern crate self as syntagma;

pub mod capture;
pub mod compile;
pub mod error;
pub mod grammar;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod production;
pub mod recover;
pub mod token;
pub mod unescape;

mod engine;
mod printer;

#[cfg(test)]
mod parser_tests;

pub use capture::{Capture, Value, Values};
pub use error::{BuildError, ErrorPrinter, LexerError, ParseError};
pub use lexer::{
    Action, Checkpoint, Lexer, LexerDef, PeekingLexer, Rule, Rules, SimpleLexerDef, StatefulDef,
    StatefulLexer, Symbols,
};
pub use parser::{Parser, ParserBuilder};
pub use production::{Parseable, Production};
pub use recover::{
    Composite, NestedDelimiters, Outcome, Recover, SkipPast, SkipThenRetry, SkipUntil, Strategy,
    SyncToKind,
};
pub use token::{EOF, Position, Token, TokenKind};

/// Derives [`Production`] (and [`Capture`]) from `#[rule(…)]` attributes.
#[cfg(feature = "derive")]
pub use syntagma_macros::Production;
