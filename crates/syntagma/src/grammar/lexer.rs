//! Tokenizer for grammar fragments.

use logos::Logos;
use std::ops::Range;

/// One fragment lexeme plus its span inside the fragment text.
///
/// Spans let the parser tell a postfix `!` modifier (adjacent to its operand)
/// from a prefix `!` negation.
pub type Spanned<'src> = (FragmentToken<'src>, Range<usize>);

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum FragmentToken<'src> {
    #[token("@")]
    At,

    #[token("|")]
    Pipe,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token("?")]
    Question,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,

    #[token("!")]
    Bang,

    #[token("=")]
    Equals,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token("…")]
    #[token("...")]
    Ellipsis,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'src str),

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    #[regex(r"'(?:[^'\\]|\\.)*'")]
    #[regex(r"`[^`]*`")]
    Str(&'src str),
}

/// Tokenizes a fragment. Errors name the offending text.
pub fn scan(src: &str) -> Result<Vec<Spanned<'_>>, String> {
    let mut lexer = FragmentToken::lexer(src);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(format!(
                    "unexpected character {:?} in grammar",
                    &src[lexer.span()]
                ));
            }
        }
    }
    Ok(tokens)
}
