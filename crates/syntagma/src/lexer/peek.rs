//! Buffered lookahead over a materialized token stream.
//!
//! The whole stream is lexed up front; checkpoints are plain indices into the
//! buffer, so saving and rewinding are O(1) and branch attempts cost only a
//! cursor copy. Elided kinds stay in the buffer but are invisible to the
//! normal peek/next channel; the raw channel sees every token.

use indexmap::IndexSet;

use crate::token::{Token, TokenKind};

/// An O(1) rewind point. Only valid for the lexer that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub(crate) usize);

/// Token stream with arbitrary-distance lookahead and checkpoint/rewind.
#[derive(Debug, Clone)]
pub struct PeekingLexer {
    tokens: Vec<Token>,
    cursor: usize,
    elide: IndexSet<TokenKind>,
}

impl PeekingLexer {
    /// Wraps a token buffer. The buffer must end with an EOF token.
    pub fn new(tokens: Vec<Token>, elide: IndexSet<TokenKind>) -> Self {
        debug_assert!(tokens.last().is_some_and(Token::is_eof));
        Self {
            tokens,
            cursor: 0,
            elide,
        }
    }

    /// The next visible token without consuming it.
    #[inline]
    pub fn peek(&self) -> &Token {
        self.peek_n(0)
    }

    /// The n-th visible token ahead (0 = next), skipping elided kinds.
    pub fn peek_n(&self, n: usize) -> &Token {
        let mut remaining = n;
        let mut index = self.cursor;
        loop {
            let token = self.at(index);
            if token.is_eof() {
                return token;
            }
            if !self.elide.contains(&token.kind) {
                if remaining == 0 {
                    return token;
                }
                remaining -= 1;
            }
            index += 1;
        }
    }

    /// Consumes and returns the next visible token.
    pub fn next_token(&mut self) -> Token {
        loop {
            let token = self.at(self.cursor).clone();
            if token.is_eof() {
                return token;
            }
            self.cursor += 1;
            if !self.elide.contains(&token.kind) {
                return token;
            }
        }
    }

    /// The next token on the raw channel, elided kinds included.
    #[inline]
    pub fn peek_raw(&self) -> &Token {
        self.at(self.cursor)
    }

    /// Consumes the next raw token.
    pub fn next_raw(&mut self) -> Token {
        let token = self.at(self.cursor).clone();
        if !token.is_eof() {
            self.cursor += 1;
        }
        token
    }

    /// Saves the current read position.
    #[inline]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.cursor)
    }

    /// Rewinds to an earlier checkpoint of the same stream.
    #[inline]
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.tokens.len());
        self.cursor = checkpoint.0;
    }

    /// Monotonic stream offset, used to compare how deep two attempts got.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn at(&self, index: usize) -> &Token {
        self.tokens
            .get(index)
            .unwrap_or_else(|| self.tokens.last().expect("buffer ends with EOF"))
    }
}
