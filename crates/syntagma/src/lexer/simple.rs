//! Built-in text lexer for grammars that do not need custom token rules.
//!
//! Classifies input into identifiers, integers, floats, quoted strings,
//! quoted characters and single punctuation runes. Whitespace and `//` / `/* */`
//! comments are consumed silently.

use logos::Logos;

use super::{Lexer, LexerDef, Symbols};
use crate::error::LexerError;
use crate::token::{Position, Token, TokenKind};

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Raw {
    // Consumed without being emitted.
    #[regex(r"//[^\n]*", allow_greedy = true)]
    #[regex(r"/\*(?:[^*]|\*[^/])*\*/")]
    Comment,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", priority = 3)]
    Ident,

    #[regex(r"[0-9][0-9_]*\.[0-9]+(?:[eE][+-]?[0-9]+)?")]
    Float,

    #[regex(r"[0-9][0-9_]*")]
    #[regex(r"0[xX][0-9a-fA-F]+|0[oO][0-7]+|0[bB][01]+")]
    Int,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    Str,

    #[regex(r"'(?:[^'\\]|\\.)*'")]
    Char,

    #[regex(r#"[!-/:-@\[-`{-~]"#)]
    Punct,
}

/// Default lexer definition: a fixed, general-purpose token classification.
#[derive(Debug, Clone)]
pub struct SimpleLexerDef {
    symbols: Symbols,
}

impl SimpleLexerDef {
    pub const IDENT: TokenKind = 1;
    pub const INT: TokenKind = 2;
    pub const FLOAT: TokenKind = 3;
    pub const STRING: TokenKind = 4;
    pub const CHAR: TokenKind = 5;
    pub const PUNCT: TokenKind = 6;

    pub fn new() -> Self {
        let mut symbols = Symbols::new();
        symbols.insert("Ident", Self::IDENT);
        symbols.insert("Int", Self::INT);
        symbols.insert("Float", Self::FLOAT);
        symbols.insert("String", Self::STRING);
        symbols.insert("Char", Self::CHAR);
        symbols.insert("Punct", Self::PUNCT);
        Self { symbols }
    }
}

impl Default for SimpleLexerDef {
    fn default() -> Self {
        Self::new()
    }
}

impl LexerDef for SimpleLexerDef {
    fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    fn lexer<'i>(
        &'i self,
        filename: &str,
        input: &'i str,
    ) -> Result<Box<dyn Lexer + 'i>, LexerError> {
        Ok(Box::new(SimpleLexer {
            inner: Raw::lexer(input),
            input,
            pos: Position::start(filename),
        }))
    }
}

struct SimpleLexer<'i> {
    inner: logos::Lexer<'i, Raw>,
    input: &'i str,
    /// Position at the end of the last span we accounted for.
    pos: Position,
}

impl SimpleLexer<'_> {
    /// Advances `self.pos` over everything between it and `target` (skipped
    /// whitespace and comments the iterator stepped over).
    fn catch_up(&mut self, target: usize) {
        if target > self.pos.offset {
            let skipped = &self.input[self.pos.offset..target];
            self.pos.advance(skipped);
        }
    }
}

impl Lexer for SimpleLexer<'_> {
    fn next_token(&mut self) -> Result<Token, LexerError> {
        loop {
            match self.inner.next() {
                Some(Ok(raw)) => {
                    let span = self.inner.span();
                    self.catch_up(span.start);
                    let text = &self.input[span.clone()];
                    let start = self.pos.clone();
                    self.pos.advance(text);
                    let kind = match raw {
                        Raw::Comment => continue,
                        Raw::Ident => SimpleLexerDef::IDENT,
                        Raw::Int => SimpleLexerDef::INT,
                        Raw::Float => SimpleLexerDef::FLOAT,
                        Raw::Str => SimpleLexerDef::STRING,
                        Raw::Char => SimpleLexerDef::CHAR,
                        Raw::Punct => SimpleLexerDef::PUNCT,
                    };
                    return Ok(Token::new(kind, text, start));
                }
                Some(Err(())) => {
                    let span = self.inner.span();
                    self.catch_up(span.start);
                    return Err(LexerError::NoMatch {
                        pos: self.pos.clone(),
                        state: "Root".to_string(),
                        fragment: self.input[span].to_string(),
                    });
                }
                None => {
                    self.catch_up(self.input.len());
                    return Ok(Token::eof(self.pos.clone()));
                }
            }
        }
    }
}
