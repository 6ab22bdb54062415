//! End-to-end tests: derive → grammar compiler → engine → AST.

use indexmap::IndexMap;
use indoc::indoc;

use crate::lexer::{Action, Rule, StatefulDef};
use crate::{
    BuildError, ParseError, Parseable, Parser, PeekingLexer, Position, Production, parseable,
};

#[test]
fn parsers_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}

    #[derive(Debug, Production)]
    struct P {
        #[rule("@Ident")]
        x: String,
    }

    assert_send_sync::<Parser<P>>();
}

#[test]
fn structural_capture() {
    #[derive(Debug, Production)]
    struct Grammar {
        #[rule("@Ident")]
        a: String,
    }

    let parser = Parser::<Grammar>::new().unwrap();
    let ast = parser.parse_str("t.x", "world").unwrap();
    assert_eq!(ast.a, "world");
}

#[test]
fn repetition_across_fields() {
    #[derive(Debug, Production)]
    struct Grammar {
        #[rule("@'.'*")]
        a: Vec<String>,
        #[rule("(@'b' | @'c')")]
        b: String,
    }

    let parser = Parser::<Grammar>::new().unwrap();

    let ast = parser.parse_str("t.x", "...b").unwrap();
    assert_eq!(ast.a, vec![".", ".", "."]);
    assert_eq!(ast.b, "b");

    let ast = parser.parse_str("t.x", "...c").unwrap();
    assert_eq!(ast.a, vec![".", ".", "."]);
    assert_eq!(ast.b, "c");

    let ast = parser.parse_str("t.x", "b").unwrap();
    assert!(ast.a.is_empty());
    assert_eq!(ast.b, "b");
}

#[test]
fn negative_lookahead_group() {
    #[derive(Debug, Production)]
    struct Identifiers {
        #[rule("((?! 'except' | 'end') @Ident)*")]
        names: Vec<String>,
        #[rule("('except' @Ident)?")]
        except: Option<String>,
        #[rule("'end'")]
        end: bool,
    }

    let parser = Parser::<Identifiers>::new().unwrap();

    let ast = parser.parse_str("t.x", "anything except this end").unwrap();
    assert_eq!(ast.names, vec!["anything"]);
    assert_eq!(ast.except.as_deref(), Some("this"));

    let err = parser.parse_str("t.x", "no end in sight").unwrap_err();
    let pos = err.position().expect("positioned error");
    // `no` parses, `end` terminates; the trailing `in` is the failure.
    assert_eq!((pos.line, pos.column), (1, 8));
}

#[test]
fn recursive_production_through_self_capture() {
    #[derive(Debug, Production)]
    struct List {
        #[rule("'[' @@* ']'")]
        items: Vec<List>,
    }

    let parser = Parser::<List>::new().unwrap();
    let ast = parser.parse_str("t.x", "[ [ ] [ [ ] ] ]").unwrap();
    assert_eq!(ast.items.len(), 2);
    assert_eq!(ast.items[1].items.len(), 1);
}

#[derive(Debug, Production)]
struct StrVal {
    #[rule("@String")]
    value: String,
}

#[derive(Debug, Default, Production)]
struct NumVal {
    #[rule("@Int")]
    value: i64,
}

#[derive(Debug, Production)]
enum Literal {
    Str(StrVal),
    Num(NumVal),
}

#[test]
fn union_enum_dispatches_by_variant() {
    #[derive(Debug, Production)]
    struct Doc {
        #[rule("@@+")]
        values: Vec<Literal>,
    }

    let parser = Parser::<Doc>::builder().unquote(["String"]).build().unwrap();
    let ast = parser.parse_str("t.x", r#""hi" 42"#).unwrap();
    assert_eq!(ast.values.len(), 2);
    match &ast.values[0] {
        Literal::Str(s) => assert_eq!(s.value, "hi"),
        other => panic!("expected a string, got {other:?}"),
    }
    match &ast.values[1] {
        Literal::Num(n) => assert_eq!(n.value, 42),
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn union_enum_as_root() {
    let parser = Parser::<Literal>::new().unwrap();
    match parser.parse_str("t.x", "7").unwrap() {
        Literal::Num(n) => assert_eq!(n.value, 7),
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn position_fields_are_filled() {
    #[derive(Debug, Production)]
    struct Spanned {
        pos: Position,
        #[rule("@Ident")]
        name: String,
        end_pos: Position,
    }

    let parser = Parser::<Spanned>::new().unwrap();
    let ast = parser.parse_str("t.x", "hello").unwrap();
    assert_eq!((ast.pos.line, ast.pos.column), (1, 1));
    assert_eq!(ast.name, "hello");
    assert_eq!(ast.end_pos.column, 6);
}

#[test]
fn multi_line_input_tracks_line_positions() {
    #[derive(Debug, Production)]
    struct Entry {
        pos: Position,
        #[rule("@Ident '='")]
        key: String,
        #[rule("@(Int | Ident)")]
        value: String,
    }

    #[derive(Debug, Production)]
    struct Ini {
        #[rule("@@*")]
        entries: Vec<Entry>,
    }

    let parser = Parser::<Ini>::new().unwrap();
    let input = indoc! {"
        host = localhost
        port = 9000
    "};
    let ast = parser.parse_str("conf.ini", input).unwrap();
    assert_eq!(ast.entries.len(), 2);
    assert_eq!(ast.entries[0].key, "host");
    assert_eq!(ast.entries[0].value, "localhost");
    assert_eq!(ast.entries[1].value, "9000");
    assert_eq!(ast.entries[1].pos.line, 2);
    assert_eq!(ast.entries[1].pos.column, 1);
}

#[test]
fn case_insensitive_literals() {
    #[derive(Debug, Production)]
    struct Query {
        #[rule("'select' @Ident")]
        what: String,
    }

    let parser = Parser::<Query>::builder()
        .case_insensitive(["Ident"])
        .build()
        .unwrap();
    assert_eq!(parser.parse_str("t.x", "SELECT x").unwrap().what, "x");
    assert_eq!(parser.parse_str("t.x", "select x").unwrap().what, "x");
}

#[test]
fn upper_and_map_transforms() {
    #[derive(Debug, Production)]
    struct Word {
        #[rule("@Ident")]
        text: String,
    }

    let parser = Parser::<Word>::builder().upper(["Ident"]).build().unwrap();
    assert_eq!(parser.parse_str("t.x", "abc").unwrap().text, "ABC");

    let parser = Parser::<Word>::builder()
        .map(|mut token| {
            token.value = token.value.chars().rev().collect();
            Ok(token)
        })
        .build()
        .unwrap();
    assert_eq!(parser.parse_str("t.x", "abc").unwrap().text, "cba");
}

#[test]
fn allow_trailing_tokens() {
    #[derive(Debug, Production)]
    struct One {
        #[rule("@Ident")]
        name: String,
    }

    let strict = Parser::<One>::new().unwrap();
    assert!(strict.parse_str("t.x", "a b").is_err());

    let lax = Parser::<One>::builder().allow_trailing(true).build().unwrap();
    assert_eq!(lax.parse_str("t.x", "a b").unwrap().name, "a");

    // Per-parse override on an otherwise strict parser.
    assert_eq!(strict.parse_prefix("t.x", "a b").unwrap().name, "a");
}

#[test]
fn partial_ast_on_failure() {
    #[derive(Debug, Production)]
    struct Stmt {
        #[rule("@Ident '='")]
        key: String,
        #[rule("@Int")]
        value: i64,
    }

    let parser = Parser::<Stmt>::new().unwrap();
    let (partial, error) = parser.parse_partial("t.x", "x =");
    let partial = partial.expect("partial AST");
    assert_eq!(partial.key, "x");
    assert_eq!(partial.value, 0);
    let error = error.expect("error");
    assert!(matches!(error, ParseError::UnexpectedToken { .. }));
}

#[test]
fn discarded_branch_leaves_no_captures() {
    #[derive(Debug, Production)]
    struct Either {
        #[rule("(@Ident '=') | (@Ident '+')")]
        v: String,
    }

    let parser = Parser::<Either>::new().unwrap();
    let ast = parser.parse_str("t.x", "a +").unwrap();
    // The first branch captured `a` before missing `=`; its capture must not
    // survive into the committed second branch.
    assert_eq!(ast.v, "a");
}

#[test]
fn empty_input_matches_nullable_root() {
    #[derive(Debug, Production)]
    struct Nullable {
        #[rule("@Ident*")]
        xs: Vec<String>,
    }

    let parser = Parser::<Nullable>::new().unwrap();
    assert!(parser.parse_str("t.x", "").unwrap().xs.is_empty());

    #[derive(Debug, Production)]
    struct Required {
        #[rule("@Ident")]
        x: String,
    }
    assert!(Parser::<Required>::new().unwrap().parse_str("t.x", "").is_err());
}

#[test]
fn zero_consumption_repetition_terminates() {
    #[derive(Debug, Production)]
    struct Loopy {
        #[rule("(@Ident?)*")]
        xs: Vec<String>,
    }

    let parser = Parser::<Loopy>::new().unwrap();
    let ast = parser.parse_str("t.x", "x y").unwrap();
    assert_eq!(ast.xs, vec!["x", "y"]);
}

#[test]
fn negation_consumes_one_token() {
    #[derive(Debug, Production)]
    struct Until {
        #[rule("(@!';')* ';'")]
        body: Vec<String>,
    }

    let parser = Parser::<Until>::new().unwrap();
    let ast = parser.parse_str("t.x", "a b ;").unwrap();
    assert_eq!(ast.body, vec!["a", "b"]);

    // Negation fails at EOF, so a missing terminator is an error.
    assert!(parser.parse_str("t.x", "a b").is_err());
}

#[test]
fn positive_lookahead_consumes_nothing() {
    #[derive(Debug, Production)]
    struct Guarded {
        #[rule("(?= 'a') @Ident")]
        name: String,
    }

    let parser = Parser::<Guarded>::new().unwrap();
    assert_eq!(parser.parse_str("t.x", "a").unwrap().name, "a");
    assert!(parser.parse_str("t.x", "b").is_err());
}

#[test]
fn negative_lookahead_succeeds_at_eof() {
    #[derive(Debug, Production)]
    struct NotAhead {
        #[rule("(?! 'a' 'b') @Ident*")]
        rest: Vec<String>,
    }

    let parser = Parser::<NotAhead>::new().unwrap();
    assert!(parser.parse_str("t.x", "").unwrap().rest.is_empty());
    assert_eq!(parser.parse_str("t.x", "a c").unwrap().rest, vec!["a", "c"]);
    assert!(parser.parse_str("t.x", "a b").is_err());
}

#[test]
fn literal_range_matches_lexicographically() {
    #[derive(Debug, Production)]
    struct Letters {
        #[rule("@'a'…'m'*")]
        low: Vec<String>,
        #[rule("@Ident*")]
        rest: Vec<String>,
    }

    let parser = Parser::<Letters>::new().unwrap();
    let ast = parser.parse_str("t.x", "a b x y").unwrap();
    assert_eq!(ast.low, vec!["a", "b"]);
    assert_eq!(ast.rest, vec!["x", "y"]);
}

#[test]
fn repeated_parses_build_equal_asts() {
    #[derive(Debug, PartialEq, Production)]
    struct Pair {
        #[rule("@Ident '='")]
        key: String,
        #[rule("@Int")]
        value: i64,
    }

    let parser = Parser::<Pair>::new().unwrap();
    let first = parser.parse_str("t.x", "x = 42").unwrap();
    let second = parser.parse_str("t.x", "x = 42").unwrap();
    assert_eq!(first, second);
}

#[test]
fn decision_table_commits_to_an_alternative() {
    #[derive(Debug, Production)]
    struct Choice {
        #[rule("(@'x' 'l') | (@'y' 'r')")]
        v: String,
    }

    let parser = Parser::<Choice>::new().unwrap();
    assert_eq!(parser.parse_str("t.x", "y r").unwrap().v, "y");
    assert_eq!(parser.parse_str("t.x", "x l").unwrap().v, "x");
    // The table picked the first branch; its tail failure is final even
    // though no other branch matches either.
    assert!(parser.parse_str("t.x", "x r").is_err());
}

#[test]
fn indistinguishable_alternatives_are_rejected() {
    #[derive(Debug, Production)]
    struct Twice {
        #[rule("'a' | 'a'")]
        any: bool,
    }

    let err = Parser::<Twice>::new().unwrap_err();
    assert!(matches!(err, BuildError::InconsistentLookahead { .. }));
}

#[test]
fn overlapping_alternatives_fall_back_to_runtime() {
    #[derive(Debug, Production)]
    struct Prefixed {
        #[rule("(@Ident '=' @Int) | (@Ident '+' @Int)")]
        repr: String,
    }

    let parser = Parser::<Prefixed>::new().unwrap();
    assert_eq!(parser.parse_str("t.x", "a + 1").unwrap().repr, "a1");
}

#[test]
fn deepest_discarded_error_dominates() {
    // The probe in the second alternative keeps the lookahead pre-pass from
    // building a table, so both alternatives go through runtime trial.
    #[derive(Debug, Production)]
    struct Choice {
        #[rule("(@Ident '=' @Int '=') | ((?! '%') @Ident '+')")]
        repr: String,
    }

    let parser = Parser::<Choice>::builder().lookahead(2).build().unwrap();
    // First alternative fails two tokens in (at `+`, expecting an integer);
    // the second fails after one token (at `=`). Both stay within the
    // lookahead budget and are discarded, and the deeper error is reported.
    let err = parser.parse_str("t.x", "a = +").unwrap_err();
    match err {
        ParseError::UnexpectedToken { pos, expected, .. } => {
            assert_eq!((pos.line, pos.column), (1, 5));
            assert!(expected.contains("<int>"), "{expected}");
        }
        other => panic!("expected UnexpectedToken, got {other}"),
    }
}

#[test]
fn unknown_token_reference_is_a_build_error() {
    #[derive(Debug, Production)]
    struct Bad {
        #[rule("@Nope")]
        x: String,
    }

    let err = Parser::<Bad>::new().unwrap_err();
    match err {
        BuildError::UnknownToken {
            production,
            field,
            name,
        } => {
            assert_eq!(production, "Bad");
            assert_eq!(field, "x");
            assert_eq!(name, "Nope");
        }
        other => panic!("expected UnknownToken, got {other}"),
    }
}

#[test]
fn invalid_captures_are_build_errors() {
    // Text capture into a production-typed field.
    #[derive(Debug, Production)]
    struct Inner {
        #[rule("@Ident")]
        x: String,
    }

    #[derive(Debug, Production)]
    struct TextIntoStruct {
        #[rule("@Ident")]
        inner: Option<Inner>,
    }
    assert!(matches!(
        Parser::<TextIntoStruct>::new().unwrap_err(),
        BuildError::InvalidCapture { .. }
    ));

    // `@@` on a field that cannot hold a production.
    #[derive(Debug, Production)]
    struct SelfIntoInt {
        #[rule("@@")]
        n: i64,
    }
    assert!(matches!(
        Parser::<SelfIntoInt>::new().unwrap_err(),
        BuildError::InvalidCapture { .. }
    ));
}

#[test]
fn empty_production_is_a_build_error() {
    #[derive(Debug, Production)]
    struct Empty {
        ignored: u32,
    }

    assert!(matches!(
        Parser::<Empty>::new().unwrap_err(),
        BuildError::EmptyProduction { .. }
    ));
}

#[test]
fn fragment_syntax_errors_carry_context() {
    #[derive(Debug, Production)]
    struct BadRule {
        #[rule("(a")]
        x: String,
    }

    match Parser::<BadRule>::new().unwrap_err() {
        BuildError::FragmentSyntax {
            production,
            field,
            message,
        } => {
            assert_eq!(production, "BadRule");
            assert_eq!(field, "x");
            assert!(message.contains("to close group"), "{message}");
        }
        other => panic!("expected FragmentSyntax, got {other}"),
    }
}

#[test]
fn empty_alternatives_are_their_own_build_error() {
    #[derive(Debug, Production)]
    struct EmptyAlt {
        #[rule("a | | b")]
        x: String,
    }

    match Parser::<EmptyAlt>::new().unwrap_err() {
        BuildError::EmptyAlternative { production, field } => {
            assert_eq!(production, "EmptyAlt");
            assert_eq!(field, "x");
        }
        other => panic!("expected EmptyAlternative, got {other}"),
    }
}

fn word_lexer() -> StatefulDef {
    StatefulDef::new(IndexMap::from([(
        "Root".to_string(),
        vec![
            Rule::new("Whitespace", r"\s+"),
            Rule::new("Word", r"\w+"),
            Rule::new("Punct", r"[^\s\w]"),
        ],
    )]))
    .unwrap()
}

#[test]
fn elided_kinds_still_match_with_explicit_kind_suffix() {
    #[derive(Debug, Production)]
    struct Tight {
        #[rule("@Word ' ':Whitespace @Word")]
        words: Vec<String>,
    }

    let parser = Parser::<Tight>::builder()
        .lexer(word_lexer())
        .elide(["Whitespace"])
        .build()
        .unwrap();

    // One space matches the explicit elided literal through the raw channel.
    let ast = parser.parse_str("t.x", "a b").unwrap();
    assert_eq!(ast.words, vec!["a", "b"]);

    // Two spaces: the raw channel sees a "  " token, not " ".
    assert!(parser.parse_str("t.x", "a  b").is_err());
}

#[test]
fn elide_hides_kinds_from_the_grammar() {
    #[derive(Debug, Production)]
    struct Words {
        #[rule("@Word+")]
        words: Vec<String>,
    }

    let parser = Parser::<Words>::builder()
        .lexer(word_lexer())
        .elide(["Whitespace"])
        .build()
        .unwrap();
    let ast = parser.parse_str("t.x", "one  two\tthree").unwrap();
    assert_eq!(ast.words, vec!["one", "two", "three"]);
}

#[test]
fn tokenize_applies_transforms() {
    #[derive(Debug, Production)]
    struct Any {
        #[rule("@Word+")]
        words: Vec<String>,
    }

    let parser = Parser::<Any>::builder()
        .lexer(word_lexer())
        .upper(["Word"])
        .build()
        .unwrap();
    let tokens = parser.tokenize("t.x", "ab cd").unwrap();
    let values: Vec<_> = tokens.iter().filter(|t| !t.is_eof()).map(|t| t.value.as_str()).collect();
    assert_eq!(values, vec!["AB", " ", "CD"]);
}

#[derive(Debug, Default)]
struct Dots {
    count: usize,
}

impl Parseable for Dots {
    fn parse(lex: &mut PeekingLexer) -> Result<Self, ParseError> {
        let mut count = 0;
        while lex.peek().value == "." {
            lex.next_token();
            count += 1;
        }
        if count == 0 {
            return Err(ParseError::NoMatch);
        }
        Ok(Dots { count })
    }
}

parseable!(Dots);

#[test]
fn parseable_types_drive_the_lexer_directly() {
    #[derive(Debug, Production)]
    struct Lead {
        #[rule("@@")]
        dots: Dots,
        #[rule("@Ident")]
        name: String,
    }

    let parser = Parser::<Lead>::new().unwrap();
    let ast = parser.parse_str("t.x", "...x").unwrap();
    assert_eq!(ast.dots.count, 3);
    assert_eq!(ast.name, "x");

    // A miss from the parseable lets the record miss cleanly.
    assert!(parser.parse_str("t.x", "x").is_err());
}

#[test]
fn parse_with_overrides_a_production() {
    #[derive(Debug, Production)]
    struct Doubled {
        #[rule("@@")]
        num: NumVal,
    }

    let parser = Parser::<Doubled>::builder()
        .parse_with::<NumVal, _>(|lex| {
            let token = lex.peek().clone();
            if token.kind != crate::SimpleLexerDef::INT {
                return Err(ParseError::NoMatch);
            }
            lex.next_token();
            let value: i64 = token.value.parse().map_err(|_| ParseError::Conversion {
                pos: token.pos.clone(),
                message: "bad int".to_string(),
            })?;
            Ok(NumVal { value: value * 2 })
        })
        .build()
        .unwrap();

    assert_eq!(parser.parse_str("t.x", "21").unwrap().num.value, 42);
}

#[test]
fn stateful_lexer_feeds_the_parser() {
    let rules = IndexMap::from([
        (
            "Root".to_string(),
            vec![
                Rule::new("whitespace", r"\s+"),
                Rule::with_action("String", "\"", Action::push("String")),
                Rule::new("Ident", r"[a-zA-Z_]\w*"),
                Rule::new("Equals", "="),
            ],
        ),
        (
            "String".to_string(),
            vec![
                Rule::with_action("StringEnd", "\"", Action::Pop),
                Rule::new("Chars", r#"[^"\\]+"#),
            ],
        ),
    ]);

    #[derive(Debug, Production)]
    struct Assign {
        #[rule("@Ident Equals")]
        key: String,
        #[rule("String @Chars StringEnd")]
        value: String,
    }

    let parser = Parser::<Assign>::builder()
        .lexer(StatefulDef::new(rules).unwrap())
        .build()
        .unwrap();
    let ast = parser.parse_str("t.x", r#"name = "moth""#).unwrap();
    assert_eq!(ast.key, "name");
    assert_eq!(ast.value, "moth");
}
