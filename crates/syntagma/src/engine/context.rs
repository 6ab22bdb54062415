//! Per-parse state: cursor, effect stream, deepest error, recovery.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::ParseError;
use crate::lexer::{Checkpoint, PeekingLexer};
use crate::recover::Strategy;
use crate::token::TokenKind;

use super::effects::{EffectStream, SlotId};

/// Parse-time configuration shared by all nodes of one parse.
pub(crate) struct ParseConfig {
    /// Tokens a failing branch may consume before its error becomes fatal;
    /// also the depth budget of compiled decision tables.
    pub lookahead: usize,
    /// Kinds whose literals compare under simple case folding.
    pub case_insensitive: IndexSet<TokenKind>,
    pub recovery: Option<Arc<dyn Strategy>>,
    pub max_errors: usize,
}

/// A branch mark: cursor plus effect watermark. Discarding rewinds both.
#[derive(Clone, Copy)]
pub(crate) struct Branch {
    pub cursor: Checkpoint,
    pub effects: usize,
}

/// The mutable state threaded through node evaluation.
pub(crate) struct Context<'p> {
    pub lex: PeekingLexer,
    pub effects: EffectStream,
    pub config: &'p ParseConfig,
    /// Errors collected while recovery is active.
    pub recovered: Vec<ParseError>,
    /// The error reported furthest into the stream, preferred for reporting.
    deepest: Option<(usize, ParseError)>,
    next_slot: SlotId,
    /// Non-zero inside lookahead and negation probes; suppresses recovery
    /// and deepest-error noise from speculation.
    probe_depth: u32,
}

impl<'p> Context<'p> {
    pub fn new(lex: PeekingLexer, config: &'p ParseConfig) -> Self {
        Self {
            lex,
            effects: EffectStream::new(),
            config,
            recovered: Vec::new(),
            deepest: None,
            next_slot: 0,
            probe_depth: 0,
        }
    }

    pub fn branch(&self) -> Branch {
        Branch {
            cursor: self.lex.checkpoint(),
            effects: self.effects.len(),
        }
    }

    /// Abandons a branch: cursor back, effects dropped. The deepest-error
    /// slot survives on purpose.
    pub fn discard(&mut self, branch: Branch) {
        self.lex.rewind(branch.cursor);
        self.effects.truncate(branch.effects);
    }

    /// Tokens consumed since the branch was opened.
    pub fn consumed_since(&self, branch: &Branch) -> usize {
        self.lex.cursor() - branch.cursor.0
    }

    pub fn fresh_slot(&mut self) -> SlotId {
        let id = self.next_slot;
        self.next_slot += 1;
        id
    }

    pub fn enter_probe(&mut self) {
        self.probe_depth += 1;
    }

    pub fn leave_probe(&mut self) {
        self.probe_depth -= 1;
    }

    pub fn in_probe(&self) -> bool {
        self.probe_depth > 0
    }

    /// Remembers `error` if it is at least as deep as anything seen so far.
    pub fn note_error(&mut self, error: &ParseError) {
        if self.probe_depth > 0 || matches!(error, ParseError::NoMatch) {
            return;
        }
        let cursor = self.lex.cursor();
        if self.deepest.as_ref().is_none_or(|(deep, _)| cursor >= *deep) {
            self.deepest = Some((cursor, error.clone()));
        }
    }

    /// The deepest error seen, leaving the slot empty.
    pub fn take_deepest(&mut self) -> Option<ParseError> {
        self.deepest.take().map(|(_, error)| error)
    }

    /// Builds an `UnexpectedToken` at the current position.
    pub fn unexpected(&mut self, expected: impl Into<String>) -> ParseError {
        let token = self.lex.peek();
        let error = ParseError::UnexpectedToken {
            pos: token.pos.clone(),
            found: token.to_string(),
            expected: expected.into(),
        };
        self.note_error(&error);
        error
    }
}
