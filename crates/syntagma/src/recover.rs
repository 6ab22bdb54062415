//! Error recovery strategies.
//!
//! A strategy is invoked when a record fails to parse and decides where the
//! parse can resume. Strategies compose: [`Composite`] tries each in turn,
//! rewinding between attempts with the same checkpoint primitive branches
//! use.

use crate::error::ParseError;
use crate::lexer::{Checkpoint, PeekingLexer};
use crate::token::{Token, TokenKind};

/// What a strategy decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The cursor now points at a safe resumption point.
    Recovered,
    /// The caller should re-attempt the failed parse from the new position.
    Retry,
    /// This strategy cannot resynchronize here.
    Failed,
}

/// Cursor access handed to strategies.
pub struct Recover<'a> {
    pub(crate) lex: &'a mut PeekingLexer,
    /// How many times the failed parse has been retried in this episode.
    pub(crate) attempts: usize,
}

impl Recover<'_> {
    pub fn peek(&self) -> &Token {
        self.lex.peek()
    }

    /// Consumes and returns the next token.
    pub fn skip(&mut self) -> Token {
        self.lex.next_token()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.lex.checkpoint()
    }

    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.lex.rewind(checkpoint);
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

/// A resynchronization strategy.
pub trait Strategy: Send + Sync {
    fn recover(&self, ctx: &mut Recover<'_>, error: &ParseError) -> Outcome;
}

/// Advances until the next token's text is one of the sync values; the sync
/// token itself is left unconsumed.
pub struct SkipUntil {
    values: Vec<String>,
}

impl SkipUntil {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Strategy for SkipUntil {
    fn recover(&self, ctx: &mut Recover<'_>, _error: &ParseError) -> Outcome {
        loop {
            let token = ctx.peek();
            if token.is_eof() {
                return Outcome::Failed;
            }
            if self.values.iter().any(|v| *v == token.value) {
                return Outcome::Recovered;
            }
            ctx.skip();
        }
    }
}

/// Like [`SkipUntil`], but consumes the sync token too.
pub struct SkipPast {
    values: Vec<String>,
}

impl SkipPast {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Strategy for SkipPast {
    fn recover(&self, ctx: &mut Recover<'_>, _error: &ParseError) -> Outcome {
        loop {
            let token = ctx.peek();
            if token.is_eof() {
                return Outcome::Failed;
            }
            let hit = self.values.iter().any(|v| *v == token.value);
            ctx.skip();
            if hit {
                return Outcome::Recovered;
            }
        }
    }
}

/// Skips one token and asks the caller to retry the failed parse, up to
/// `max_skip` times, giving up at any of the boundary tokens.
pub struct SkipThenRetry {
    until: Vec<String>,
    max_skip: usize,
}

impl SkipThenRetry {
    pub fn new<I, S>(until: I, max_skip: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            until: until.into_iter().map(Into::into).collect(),
            max_skip,
        }
    }
}

impl Strategy for SkipThenRetry {
    fn recover(&self, ctx: &mut Recover<'_>, _error: &ParseError) -> Outcome {
        if ctx.attempts() >= self.max_skip {
            return Outcome::Failed;
        }
        let token = ctx.peek();
        if token.is_eof() || self.until.iter().any(|v| *v == token.value) {
            return Outcome::Failed;
        }
        ctx.skip();
        Outcome::Retry
    }
}

/// Starting inside one `open` delimiter, advances to its matching `close`,
/// respecting the nesting of `open`/`close` and of any extra pairs.
pub struct NestedDelimiters {
    open: String,
    close: String,
    others: Vec<(String, String)>,
}

impl NestedDelimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            others: Vec::new(),
        }
    }

    pub fn with_pair(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.others.push((open.into(), close.into()));
        self
    }
}

impl Strategy for NestedDelimiters {
    fn recover(&self, ctx: &mut Recover<'_>, _error: &ParseError) -> Outcome {
        let mut depth: usize = 1;
        let mut other_depths = vec![0usize; self.others.len()];

        loop {
            let token = ctx.peek();
            if token.is_eof() {
                return Outcome::Failed;
            }
            let value = token.value.clone();

            let mut inside_other = false;
            for (i, (open, close)) in self.others.iter().enumerate() {
                if open == close {
                    // Symmetric delimiters (quotes) toggle.
                    if value == *open {
                        other_depths[i] = 1 - other_depths[i];
                    }
                } else if value == *open {
                    other_depths[i] += 1;
                } else if value == *close && other_depths[i] > 0 {
                    other_depths[i] -= 1;
                }
                if other_depths[i] > 0 {
                    inside_other = true;
                }
            }

            if !inside_other {
                if value == self.open {
                    depth += 1;
                } else if value == self.close {
                    depth -= 1;
                    if depth == 0 {
                        ctx.skip();
                        return Outcome::Recovered;
                    }
                }
            }
            ctx.skip();
        }
    }
}

/// Like [`SkipUntil`], keyed by token kind codes instead of text.
pub struct SyncToKind {
    kinds: Vec<TokenKind>,
}

impl SyncToKind {
    pub fn new<I: IntoIterator<Item = TokenKind>>(kinds: I) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl Strategy for SyncToKind {
    fn recover(&self, ctx: &mut Recover<'_>, _error: &ParseError) -> Outcome {
        loop {
            let token = ctx.peek();
            if token.is_eof() {
                return Outcome::Failed;
            }
            if self.kinds.contains(&token.kind) {
                return Outcome::Recovered;
            }
            ctx.skip();
        }
    }
}

/// Tries each strategy in order, rewinding the cursor between attempts.
pub struct Composite {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Composite {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }
}

impl Strategy for Composite {
    fn recover(&self, ctx: &mut Recover<'_>, error: &ParseError) -> Outcome {
        let checkpoint = ctx.checkpoint();
        for strategy in &self.strategies {
            match strategy.recover(ctx, error) {
                Outcome::Failed => ctx.rewind(checkpoint),
                decided => return decided,
            }
        }
        Outcome::Failed
    }
}
