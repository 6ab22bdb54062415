//! Recursive-descent parser for grammar fragments.
//!
//! ```text
//! expression  = sequence ('|' sequence)*
//! sequence    = term+
//! term        = ('@' ('@' | atom) | atom) modifier?
//! atom        = literal | range | token-ref | group | '[' expression ']'
//!             | '{' expression '}' | '!' atom | '(' '?' ('='|'!') expression ')'
//! literal     = quoted-string (':' token-ref)?
//! range       = quoted-string '…' quoted-string
//! modifier    = '?' | '*' | '+' | '!'
//! ```
//!
//! A `!` is read as a postfix modifier only when it is directly adjacent to
//! the preceding token; otherwise it opens a negation.

use std::fmt;

use super::ast::{FragmentExpr, GroupMode};
use super::lexer::{FragmentToken, Spanned, scan};
use crate::unescape::unquote;

/// Why a fragment failed to parse. The compiler maps [`EmptyAlternative`]
/// onto its dedicated `BuildError` variant so callers can match on it.
///
/// [`EmptyAlternative`]: FragmentError::EmptyAlternative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// An alternative of a disjunction is empty, as in `a | | b`.
    EmptyAlternative,
    /// Any other malformation, described in prose.
    Other(String),
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAlternative => f.write_str("empty alternative"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

impl From<String> for FragmentError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

/// Parses one fragment into its expression tree.
pub fn parse_fragment(src: &str) -> Result<FragmentExpr, FragmentError> {
    let tokens = scan(src)?;
    let mut parser = FragmentParser { tokens, pos: 0 };
    let expr = parser.expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(FragmentError::Other(format!(
            "unexpected {} after expression",
            describe(token)
        ))),
    }
}

struct FragmentParser<'src> {
    tokens: Vec<Spanned<'src>>,
    pos: usize,
}

impl<'src> FragmentParser<'src> {
    fn peek(&self) -> Option<&FragmentToken<'src>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn bump(&mut self) -> Option<FragmentToken<'src>> {
        let token = self.tokens.get(self.pos).map(|(t, _)| *t);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: FragmentToken<'src>) -> bool {
        if self.peek() == Some(&token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: FragmentToken<'src>, context: &str) -> Result<(), FragmentError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(FragmentError::Other(match self.peek() {
                Some(found) => format!("expected {context}, found {}", describe(found)),
                None => format!("expected {context}, found end of rule"),
            }))
        }
    }

    /// True when the token at `self.pos` starts at the previous token's end.
    fn adjacent(&self) -> bool {
        if self.pos == 0 {
            return false;
        }
        match (self.tokens.get(self.pos - 1), self.tokens.get(self.pos)) {
            (Some((_, prev)), Some((_, next))) => prev.end == next.start,
            _ => false,
        }
    }

    fn expression(&mut self) -> Result<FragmentExpr, FragmentError> {
        let mut alternatives = vec![self.sequence()?];
        while self.eat(FragmentToken::Pipe) {
            if !self.at_sequence_start() {
                return Err(FragmentError::EmptyAlternative);
            }
            alternatives.push(self.sequence()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.pop().expect("one alternative")
        } else {
            FragmentExpr::Alternation(alternatives)
        })
    }

    fn at_sequence_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                FragmentToken::At
                    | FragmentToken::Bang
                    | FragmentToken::Ident(_)
                    | FragmentToken::Str(_)
                    | FragmentToken::ParenOpen
                    | FragmentToken::BracketOpen
                    | FragmentToken::BraceOpen
            )
        )
    }

    fn sequence(&mut self) -> Result<FragmentExpr, FragmentError> {
        if !self.at_sequence_start() {
            return Err(FragmentError::EmptyAlternative);
        }
        let mut terms = vec![self.term()?];
        while self.at_sequence_start() {
            terms.push(self.term()?);
        }
        Ok(if terms.len() == 1 {
            terms.pop().expect("one term")
        } else {
            FragmentExpr::Sequence(terms)
        })
    }

    fn term(&mut self) -> Result<FragmentExpr, FragmentError> {
        let base = if self.eat(FragmentToken::At) {
            if self.eat(FragmentToken::At) {
                FragmentExpr::SelfCapture
            } else {
                FragmentExpr::Capture(Box::new(self.atom()?))
            }
        } else {
            self.atom()?
        };

        let mode = match self.peek() {
            Some(FragmentToken::Question) => Some(GroupMode::ZeroOrOne),
            Some(FragmentToken::Star) => Some(GroupMode::ZeroOrMore),
            Some(FragmentToken::Plus) => Some(GroupMode::OneOrMore),
            Some(FragmentToken::Bang) if self.adjacent() => Some(GroupMode::NonEmpty),
            _ => None,
        };
        if let Some(mode) = mode {
            self.pos += 1;
            return Ok(FragmentExpr::Group {
                inner: Box::new(base),
                mode,
            });
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<FragmentExpr, FragmentError> {
        match self.bump() {
            Some(FragmentToken::Str(raw)) => {
                let text = unquote(raw)?;
                if self.eat(FragmentToken::Ellipsis) {
                    let hi = match self.bump() {
                        Some(FragmentToken::Str(raw)) => unquote(raw)?,
                        _ => {
                            return Err(FragmentError::Other(
                                "expected upper bound after …".to_string(),
                            ));
                        }
                    };
                    return Ok(FragmentExpr::Range { lo: text, hi });
                }
                let kind = if self.eat(FragmentToken::Colon) {
                    match self.bump() {
                        Some(FragmentToken::Ident(name)) => Some(name.to_string()),
                        _ => {
                            return Err(FragmentError::Other(
                                "expected token name after :".to_string(),
                            ));
                        }
                    }
                } else {
                    None
                };
                Ok(FragmentExpr::Literal { text, kind })
            }
            Some(FragmentToken::Ident(name)) => Ok(FragmentExpr::TokenRef(name.to_string())),
            Some(FragmentToken::Bang) => Ok(FragmentExpr::Negation(Box::new(self.atom()?))),
            Some(FragmentToken::ParenOpen) => {
                if self.eat(FragmentToken::Question) {
                    let positive = match self.bump() {
                        Some(FragmentToken::Equals) => true,
                        Some(FragmentToken::Bang) => false,
                        _ => {
                            return Err(FragmentError::Other(
                                "expected = or ! after (?".to_string(),
                            ));
                        }
                    };
                    let inner = self.expression()?;
                    self.expect(FragmentToken::ParenClose, ") to close lookahead group")?;
                    return Ok(FragmentExpr::Lookahead {
                        positive,
                        inner: Box::new(inner),
                    });
                }
                let inner = self.expression()?;
                self.expect(FragmentToken::ParenClose, ") to close group")?;
                Ok(FragmentExpr::Group {
                    inner: Box::new(inner),
                    mode: GroupMode::Once,
                })
            }
            Some(FragmentToken::BracketOpen) => {
                let inner = self.expression()?;
                self.expect(FragmentToken::BracketClose, "] to close optional")?;
                Ok(FragmentExpr::Group {
                    inner: Box::new(inner),
                    mode: GroupMode::ZeroOrOne,
                })
            }
            Some(FragmentToken::BraceOpen) => {
                let inner = self.expression()?;
                self.expect(FragmentToken::BraceClose, "} to close repetition")?;
                Ok(FragmentExpr::Group {
                    inner: Box::new(inner),
                    mode: GroupMode::ZeroOrMore,
                })
            }
            Some(other) => Err(FragmentError::Other(format!(
                "unexpected {}",
                describe(&other)
            ))),
            None => Err(FragmentError::Other("unexpected end of rule".to_string())),
        }
    }
}

fn describe(token: &FragmentToken<'_>) -> String {
    match token {
        FragmentToken::Ident(name) => format!("identifier {name:?}"),
        FragmentToken::Str(raw) => format!("string {raw}"),
        FragmentToken::At => "\"@\"".to_string(),
        FragmentToken::Pipe => "\"|\"".to_string(),
        FragmentToken::ParenOpen => "\"(\"".to_string(),
        FragmentToken::ParenClose => "\")\"".to_string(),
        FragmentToken::BracketOpen => "\"[\"".to_string(),
        FragmentToken::BracketClose => "\"]\"".to_string(),
        FragmentToken::BraceOpen => "\"{\"".to_string(),
        FragmentToken::BraceClose => "\"}\"".to_string(),
        FragmentToken::Question => "\"?\"".to_string(),
        FragmentToken::Star => "\"*\"".to_string(),
        FragmentToken::Plus => "\"+\"".to_string(),
        FragmentToken::Bang => "\"!\"".to_string(),
        FragmentToken::Equals => "\"=\"".to_string(),
        FragmentToken::Colon => "\":\"".to_string(),
        FragmentToken::Comma => "\",\"".to_string(),
        FragmentToken::Ellipsis => "\"…\"".to_string(),
    }
}
