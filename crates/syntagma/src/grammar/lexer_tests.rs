use super::lexer::{FragmentToken, scan};

fn kinds(src: &str) -> Vec<FragmentToken<'_>> {
    scan(src).unwrap().into_iter().map(|(t, _)| t).collect()
}

#[test]
fn scans_runes() {
    use FragmentToken::*;
    assert_eq!(
        kinds("@ | ( ) [ ] { } ? * + ! = : ,"),
        vec![
            At, Pipe, ParenOpen, ParenClose, BracketOpen, BracketClose, BraceOpen, BraceClose,
            Question, Star, Plus, Bang, Equals, Colon, Comma,
        ]
    );
}

#[test]
fn scans_identifiers_and_strings() {
    let tokens = kinds(r#"Ident 'single' "double" `raw`"#);
    assert_eq!(
        tokens,
        vec![
            FragmentToken::Ident("Ident"),
            FragmentToken::Str("'single'"),
            FragmentToken::Str("\"double\""),
            FragmentToken::Str("`raw`"),
        ]
    );
}

#[test]
fn scans_both_ellipsis_spellings() {
    assert_eq!(
        kinds(r#"'a' … 'z'"#),
        vec![
            FragmentToken::Str("'a'"),
            FragmentToken::Ellipsis,
            FragmentToken::Str("'z'"),
        ]
    );
    assert_eq!(kinds("...")[0], FragmentToken::Ellipsis);
}

#[test]
fn strings_may_contain_escaped_quotes() {
    assert_eq!(kinds(r#"'it\'s'"#), vec![FragmentToken::Str(r"'it\'s'")]);
}

#[test]
fn rejects_stray_characters() {
    let err = scan("a # b").unwrap_err();
    assert!(err.contains("#"), "unexpected message: {err}");
}

#[test]
fn spans_expose_adjacency() {
    let tokens = scan("x! !y").unwrap();
    // `x` and `!` touch; the second `!` and `y` touch, but not `!` and `!`.
    assert_eq!(tokens[0].1.end, tokens[1].1.start);
    assert_ne!(tokens[1].1.end, tokens[2].1.start);
    assert_eq!(tokens[2].1.end, tokens[3].1.start);
}
