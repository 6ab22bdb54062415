//! Lexer interfaces.
//!
//! A [`LexerDef`] is an immutable description of how to tokenize: it owns the
//! mapping between symbolic token names and [`TokenKind`] codes and can mint
//! per-input [`Lexer`] instances. Grammar fragments refer to tokens by name;
//! the grammar compiler resolves those names through [`Symbols`].

mod peek;
mod simple;
mod stateful;


pub use peek::{Checkpoint, PeekingLexer};
pub use simple::SimpleLexerDef;
pub use stateful::{Action, Rule, Rules, StatefulDef, StatefulLexer};

use indexmap::IndexMap;

use crate::error::LexerError;
use crate::token::{EOF, Token, TokenKind};

/// Bijection between symbolic token names and kind codes.
///
/// `"EOF"` is always present and maps to the negative [`EOF`] sentinel.
#[derive(Debug, Clone)]
pub struct Symbols {
    by_name: IndexMap<String, TokenKind>,
}

impl Symbols {
    pub fn new() -> Self {
        let mut by_name = IndexMap::new();
        by_name.insert("EOF".to_string(), EOF);
        Self { by_name }
    }

    /// Registers `name`, ignoring duplicates (first registration wins).
    pub fn insert(&mut self, name: impl Into<String>, kind: TokenKind) {
        self.by_name.entry(name.into()).or_insert(kind);
    }

    pub fn kind(&self, name: &str) -> Option<TokenKind> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, kind: TokenKind) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, k)| **k == kind)
            .map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TokenKind)> {
        self.by_name.iter().map(|(n, k)| (n.as_str(), *k))
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable lexer description, shared by all parses of one parser.
pub trait LexerDef: Send + Sync {
    /// The name ↔ kind mapping this definition emits.
    fn symbols(&self) -> &Symbols;

    /// Creates a lexer over `input`. One lexer per parse; lexers are stateful.
    fn lexer<'i>(&'i self, filename: &str, input: &'i str)
    -> Result<Box<dyn Lexer + 'i>, LexerError>;
}

/// A running tokenizer over one input.
pub trait Lexer {
    /// Produces the next token; an EOF token once the input is exhausted.
    fn next_token(&mut self) -> Result<Token, LexerError>;
}

/// Drains a lexer into a buffer, EOF token included.
pub(crate) fn collect_tokens(
    def: &dyn LexerDef,
    filename: &str,
    input: &str,
) -> Result<Vec<Token>, LexerError> {
    let mut lexer = def.lexer(filename, input)?;
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.is_eof();
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
