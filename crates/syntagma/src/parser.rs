//! The public parser facade.
//!
//! A [`Parser`] is compiled once from a root [`Production`] type and is
//! immutable afterwards; it can be shared freely between threads, with each
//! parse getting its own lexer, context and output value.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::capture::Capture;
use crate::compile::GrammarCompiler;
use crate::engine::context::{Context, ParseConfig};
use crate::engine::effects::{Emit, materialize};
use crate::engine::eval::parse_node;
use crate::error::{BuildError, LexerError, ParseError};
use crate::graph::Grammar;
use crate::lexer::{LexerDef, PeekingLexer, SimpleLexerDef, collect_tokens};
use crate::printer::{describe, render_grammar};
use crate::production::{CustomParseFn, Production};
use crate::recover::Strategy;
use crate::token::{Token, TokenKind};
use crate::unescape::unquote;

type MapFn = Arc<dyn Fn(Token) -> Result<Token, ParseError> + Send + Sync>;

/// Configures and builds a [`Parser`].
pub struct ParserBuilder<T: Production> {
    lexer: Arc<dyn LexerDef>,
    lookahead: usize,
    case_insensitive: Vec<String>,
    elide: Vec<String>,
    unquote: Vec<String>,
    upper: Vec<String>,
    map: Option<MapFn>,
    hooks: HashMap<TypeId, CustomParseFn>,
    recovery: Option<Arc<dyn Strategy>>,
    max_errors: usize,
    allow_trailing: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Production> ParserBuilder<T> {
    fn new() -> Self {
        Self {
            lexer: Arc::new(SimpleLexerDef::new()),
            lookahead: 1,
            case_insensitive: Vec::new(),
            elide: Vec::new(),
            unquote: Vec::new(),
            upper: Vec::new(),
            map: None,
            hooks: HashMap::new(),
            recovery: None,
            max_errors: 10,
            allow_trailing: false,
            _marker: PhantomData,
        }
    }

    /// Replaces the default lexer definition.
    pub fn lexer(mut self, def: impl LexerDef + 'static) -> Self {
        self.lexer = Arc::new(def);
        self
    }

    /// Sets the lookahead depth budget (default 1).
    pub fn lookahead(mut self, depth: usize) -> Self {
        self.lookahead = depth;
        self
    }

    /// Token kinds whose literals match under simple case folding.
    pub fn case_insensitive<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.case_insensitive.extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Token kinds dropped from the parser's view (whitespace, comments).
    pub fn elide<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elide.extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Token kinds whose values get their quotes stripped and escapes
    /// interpreted before parsing.
    pub fn unquote<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unquote.extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Token kinds upper-cased before parsing.
    pub fn upper<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upper.extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Arbitrary token rewriting, applied after the built-in transforms.
    pub fn map(
        mut self,
        f: impl Fn(Token) -> Result<Token, ParseError> + Send + Sync + 'static,
    ) -> Self {
        self.map = Some(Arc::new(f));
        self
    }

    /// Overrides parsing for one production type with a custom function.
    pub fn parse_with<P, F>(mut self, f: F) -> Self
    where
        P: Production + Capture,
        F: Fn(&mut PeekingLexer) -> Result<P, ParseError> + Send + Sync + 'static,
    {
        let parse: CustomParseFn = Arc::new(move |lex: &mut PeekingLexer| match f(lex) {
            Ok(value) => Ok(Some(Box::new(value) as Box<dyn Any>)),
            Err(ParseError::NoMatch) => Ok(None),
            Err(error) => Err(error),
        });
        self.hooks.insert(TypeId::of::<P>(), parse);
        self
    }

    /// Enables error recovery with the given strategy.
    pub fn recover(mut self, strategy: impl Strategy + 'static) -> Self {
        self.recovery = Some(Arc::new(strategy));
        self
    }

    /// Caps the recovery accumulator (default 10).
    pub fn max_recovery_errors(mut self, max: usize) -> Self {
        self.max_errors = max.max(1);
        self
    }

    /// Tolerates tokens after the root production.
    pub fn allow_trailing(mut self, allow: bool) -> Self {
        self.allow_trailing = allow;
        self
    }

    /// Compiles the grammar and produces the parser.
    pub fn build(self) -> Result<Parser<T>, BuildError> {
        let symbols = self.lexer.symbols();
        let resolve = |names: &[String], option: &'static str| {
            let mut out = IndexSet::new();
            for name in names {
                match symbols.kind(name) {
                    Some(kind) => {
                        out.insert(kind);
                    }
                    None => {
                        return Err(BuildError::UnknownToken {
                            production: "options".to_string(),
                            field: option.to_string(),
                            name: name.clone(),
                        });
                    }
                }
            }
            Ok(out)
        };

        let elide = resolve(&self.elide, "elide")?;
        let case_insensitive = resolve(&self.case_insensitive, "case_insensitive")?;
        let unquote = resolve(&self.unquote, "unquote")?;
        let upper = resolve(&self.upper, "upper")?;

        let compiler = GrammarCompiler::new(symbols, &elide, &self.hooks);
        let grammar = compiler.compile_root::<T>(self.lookahead)?;

        Ok(Parser {
            grammar,
            lexer: self.lexer,
            lookahead: self.lookahead,
            case_insensitive,
            elide,
            unquote,
            upper,
            map: self.map,
            recovery: self.recovery,
            max_errors: self.max_errors,
            allow_trailing: self.allow_trailing,
            _marker: PhantomData,
        })
    }
}

/// A compiled parser for the AST type `T`.
pub struct Parser<T: Production> {
    pub(crate) grammar: Grammar,
    lexer: Arc<dyn LexerDef>,
    lookahead: usize,
    case_insensitive: IndexSet<TokenKind>,
    elide: IndexSet<TokenKind>,
    unquote: IndexSet<TokenKind>,
    upper: IndexSet<TokenKind>,
    map: Option<MapFn>,
    recovery: Option<Arc<dyn Strategy>>,
    max_errors: usize,
    allow_trailing: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Production> std::fmt::Debug for Parser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").finish_non_exhaustive()
    }
}

impl<T: Production> Parser<T> {
    /// Builds a parser with the default lexer and options.
    pub fn new() -> Result<Self, BuildError> {
        Self::builder().build()
    }

    pub fn builder() -> ParserBuilder<T> {
        ParserBuilder::new()
    }

    /// Parses `input`, requiring the whole stream to be consumed unless
    /// `allow_trailing` is set.
    pub fn parse_str(&self, filename: &str, input: &str) -> Result<T, ParseError> {
        match self.run(filename, input, self.allow_trailing) {
            (_, Some(error)) => Err(error),
            (Some(value), None) => Ok(value),
            (None, None) => unreachable!("successful parse without a value"),
        }
    }

    /// Parses a leading prefix of `input`, tolerating trailing tokens for
    /// this call regardless of the builder setting.
    pub fn parse_prefix(&self, filename: &str, input: &str) -> Result<T, ParseError> {
        match self.run(filename, input, true) {
            (_, Some(error)) => Err(error),
            (Some(value), None) => Ok(value),
            (None, None) => unreachable!("successful parse without a value"),
        }
    }

    /// Parses from a reader.
    pub fn parse(&self, filename: &str, mut reader: impl Read) -> Result<T, ParseError> {
        let mut input = String::new();
        reader
            .read_to_string(&mut input)
            .map_err(|e| LexerError::Read {
                message: e.to_string(),
            })?;
        self.parse_str(filename, &input)
    }

    /// Parses, returning whatever AST prefix was built even on failure.
    ///
    /// With recovery enabled this is how the collected errors and the
    /// repaired AST are obtained together.
    pub fn parse_partial(&self, filename: &str, input: &str) -> (Option<T>, Option<ParseError>) {
        self.run(filename, input, self.allow_trailing)
    }

    /// Lexes `input` with this parser's configured transforms applied.
    pub fn tokenize(&self, filename: &str, input: &str) -> Result<Vec<Token>, ParseError> {
        let tokens = collect_tokens(self.lexer.as_ref(), filename, input)?;
        self.transform(tokens)
    }

    /// The compiled grammar in canonical EBNF-like form.
    pub fn ebnf(&self) -> String {
        render_grammar(&self.grammar)
    }

    fn transform(&self, tokens: Vec<Token>) -> Result<Vec<Token>, ParseError> {
        tokens
            .into_iter()
            .map(|mut token| {
                if token.is_eof() {
                    return Ok(token);
                }
                if self.upper.contains(&token.kind) {
                    token.value = token.value.to_uppercase();
                }
                if self.unquote.contains(&token.kind) {
                    token.value = unquote(&token.value).map_err(|message| {
                        ParseError::Conversion {
                            pos: token.pos.clone(),
                            message,
                        }
                    })?;
                }
                if let Some(map) = &self.map {
                    token = map(token)?;
                }
                Ok(token)
            })
            .collect()
    }

    fn run(
        &self,
        filename: &str,
        input: &str,
        allow_trailing: bool,
    ) -> (Option<T>, Option<ParseError>) {
        let tokens = match collect_tokens(self.lexer.as_ref(), filename, input) {
            Ok(tokens) => tokens,
            Err(error) => return (None, Some(error.into())),
        };
        let tokens = match self.transform(tokens) {
            Ok(tokens) => tokens,
            Err(error) => return (None, Some(error)),
        };

        let config = ParseConfig {
            lookahead: self.lookahead,
            case_insensitive: self.case_insensitive.clone(),
            recovery: self.recovery.clone(),
            max_errors: self.max_errors,
        };
        let lex = PeekingLexer::new(tokens, self.elide.clone());
        let mut ctx = Context::new(lex, &config);

        let result = parse_node(&self.grammar, self.grammar.root(), &mut ctx);
        match result {
            Ok(Some(values)) => {
                let root_slot = match values.first() {
                    Some(Emit::Slot(id)) => Some(*id),
                    _ => None,
                };
                let mut error = None;
                if !allow_trailing && !ctx.lex.peek().is_eof() {
                    let trailing = ctx.unexpected("end of input");
                    let trailing = ctx.take_deepest().unwrap_or(trailing);
                    error = Some(wrap_recovered(&mut ctx, trailing));
                } else if !ctx.recovered.is_empty() {
                    error = Some(ParseError::Recovery {
                        errors: std::mem::take(&mut ctx.recovered),
                    });
                }
                let ops = ctx.effects.into_ops();
                match materialize(ops, root_slot) {
                    Ok(value) => (value.and_then(downcast::<T>), error),
                    Err(conversion) => (None, Some(error.unwrap_or(conversion))),
                }
            }
            Ok(None) => {
                let fallback = ctx.unexpected(describe(&self.grammar, self.grammar.root()));
                let deepest = ctx.take_deepest().unwrap_or(fallback);
                let error = wrap_recovered(&mut ctx, deepest);
                let ops = ctx.effects.into_ops();
                let partial = materialize(ops, None).ok().flatten();
                (partial.and_then(downcast::<T>), Some(error))
            }
            Err(error) => {
                let error = match error {
                    ParseError::Recovery { .. } => error,
                    other => {
                        let deepest = ctx.take_deepest().unwrap_or(other);
                        wrap_recovered(&mut ctx, deepest)
                    }
                };
                let ops = ctx.effects.into_ops();
                let partial = materialize(ops, None).ok().flatten();
                (partial.and_then(downcast::<T>), Some(error))
            }
        }
    }
}

/// Folds a final error into any errors the recovery engine collected.
fn wrap_recovered(ctx: &mut Context<'_>, error: ParseError) -> ParseError {
    if ctx.recovered.is_empty() {
        return error;
    }
    let mut errors = std::mem::take(&mut ctx.recovered);
    errors.push(error);
    ParseError::Recovery { errors }
}

fn downcast<T: 'static>(value: Box<dyn Any>) -> Option<T> {
    value.downcast::<T>().ok().map(|boxed| *boxed)
}

impl<T: Production> fmt::Display for Parser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ebnf())
    }
}
