//! Error taxonomy and rendering.
//!
//! Three families, matching the three phases of a parser's life:
//! [`BuildError`] from grammar compilation, [`LexerError`] from token
//! production, [`ParseError`] from the parse engine and field binding.
//! Everything that can point at the source carries a [`Position`] and renders
//! as `file:line:column: message`.

use std::fmt::Write as _;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

use crate::token::Position;

/// Errors raised while compiling a type tree into a grammar graph.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    /// A grammar fragment names a token the lexer definition does not define.
    #[error("{production}.{field}: unknown token {name:?}")]
    UnknownToken {
        production: String,
        field: String,
        name: String,
    },

    /// An alternative of a disjunction is empty, as in `a | | b`.
    #[error("{production}.{field}: empty alternative")]
    EmptyAlternative { production: String, field: String },

    /// A capture targets a field that cannot hold the captured value.
    #[error("{production}.{field}: {reason}")]
    InvalidCapture {
        production: String,
        field: String,
        reason: String,
    },

    /// A production type declares no grammar at all.
    #[error("production {name} has no grammar rules")]
    EmptyProduction { name: String },

    /// Two alternatives of a disjunction can never be told apart.
    #[error("{production}: alternatives {left} and {right} are indistinguishable within lookahead {depth}")]
    InconsistentLookahead {
        production: String,
        left: usize,
        right: usize,
        depth: usize,
    },

    /// A grammar fragment does not parse.
    #[error("{production}.{field}: {message}")]
    FragmentSyntax {
        production: String,
        field: String,
        message: String,
    },

    /// A lexer rule's pattern is not a valid regular expression.
    #[error("lexer rule {rule}: {message}")]
    InvalidPattern { rule: String, message: String },

    /// A lexer rule pushes or includes a state that does not exist.
    #[error("lexer state {state:?} is not defined")]
    UnknownState { state: String },

    /// The stateful lexer definition has no `Root` state.
    #[error("lexer definition has no Root state")]
    MissingRootState,

    /// An `Include` chain loops back onto itself.
    #[error("lexer state {state:?} includes itself")]
    RecursiveInclude { state: String },
}

/// Errors raised while turning input text into tokens.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexerError {
    /// No rule of the current state matches the remaining input.
    #[error("{pos}: no lexer rule matches {fragment:?}")]
    NoMatch {
        pos: Position,
        state: String,
        fragment: String,
    },

    /// A rule without a state transition matched the empty string.
    #[error("{pos}: rule {rule} matched zero characters")]
    ZeroWidthMatch { pos: Position, rule: String },

    /// A `\N` back-reference has no corresponding capture group.
    #[error("{pos}: rule {rule} refers to undefined group {index}")]
    Backref {
        pos: Position,
        rule: String,
        index: usize,
    },

    /// A pattern failed to compile after back-reference interpolation.
    #[error("{pos}: rule {rule}: {message}")]
    Pattern {
        pos: Position,
        rule: String,
        message: String,
    },

    /// A rule tried to pop the root state.
    #[error("{pos}: rule {rule} pops the root state")]
    PopOnRoot { pos: Position, rule: String },

    /// The input source could not be read.
    #[error("reading input: {message}")]
    Read { message: String },
}

/// Errors raised while parsing a token stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// The engine met a token it has no rule for at this point.
    #[error("{pos}: unexpected token {found} (expected {expected})")]
    UnexpectedToken {
        pos: Position,
        found: String,
        expected: String,
    },

    /// The lexer failed underneath the parser.
    #[error(transparent)]
    Lexer(#[from] LexerError),

    /// Captured text could not be converted into the target field.
    #[error("{pos}: {message}")]
    Conversion { pos: Position, message: String },

    /// Error reported by a user `Capture` or `Parseable` implementation.
    #[error("{pos}: {message}")]
    Custom { pos: Position, message: String },

    /// All errors collected while error recovery was active.
    #[error("{}", format_recovery(.errors))]
    Recovery { errors: Vec<ParseError> },

    /// Sentinel a [`Parseable`](crate::Parseable) returns to signal a miss,
    /// letting the caller try other alternatives. Never escapes to callers of
    /// [`Parser::parse`](crate::Parser::parse).
    #[error("no match")]
    NoMatch,
}

impl ParseError {
    /// Convenience constructor for user parse hooks.
    pub fn custom(pos: Position, message: impl Into<String>) -> Self {
        Self::Custom {
            pos,
            message: message.into(),
        }
    }

    /// The source position this error points at, when it has one.
    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::UnexpectedToken { pos, .. }
            | Self::Conversion { pos, .. }
            | Self::Custom { pos, .. } => Some(pos),
            Self::Lexer(err) => err.position(),
            Self::Recovery { errors } => errors.first().and_then(|e| e.position()),
            Self::NoMatch => None,
        }
    }
}

impl LexerError {
    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::NoMatch { pos, .. }
            | Self::ZeroWidthMatch { pos, .. }
            | Self::Backref { pos, .. }
            | Self::Pattern { pos, .. }
            | Self::PopOnRoot { pos, .. } => Some(pos),
            Self::Read { .. } => None,
        }
    }
}

fn format_recovery(errors: &[ParseError]) -> String {
    let mut out = String::new();
    for (i, err) in errors.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{err}");
    }
    out
}

/// Renders a [`ParseError`] against its source text with a caret span.
///
/// Mirrors the plain `Display` output when no source is supplied.
pub struct ErrorPrinter<'e, 's> {
    error: &'e ParseError,
    source: Option<&'s str>,
    colored: bool,
}

impl<'e, 's> ErrorPrinter<'e, 's> {
    pub fn new(error: &'e ParseError) -> Self {
        Self {
            error,
            source: None,
            colored: false,
        }
    }

    pub fn source(mut self, source: &'s str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let Some(source) = self.source else {
            return self.error.to_string();
        };

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let mut out = String::new();
        let errors: Vec<&ParseError> = match self.error {
            ParseError::Recovery { errors } => errors.iter().collect(),
            other => vec![other],
        };

        for (i, err) in errors.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let message = err.to_string();
            let Some(pos) = err.position() else {
                out.push_str(&message);
                continue;
            };

            let start = pos.offset.min(source.len());
            let end = (start + 1).min(source.len()).max(start);
            let path = pos.file.to_string();

            let mut snippet = Snippet::source(source)
                .line_start(1)
                .annotation(AnnotationKind::Primary.span(start..end).label(&message));
            if !path.is_empty() {
                snippet = snippet.path(&path);
            }

            let report: Vec<Group> = vec![Level::ERROR.primary_title(&message).element(snippet)];
            let _ = write!(out, "{}", renderer.render(&report));
        }

        out
    }
}
