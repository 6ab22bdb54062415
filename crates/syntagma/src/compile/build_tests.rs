use crate::graph::Node;
use crate::{BuildError, Parser, Production};

#[derive(Debug, Production)]
struct Leaf {
    #[rule("@Ident")]
    name: String,
}

#[derive(Debug, Production)]
struct Tree {
    #[rule("'(' @@* ')'")]
    children: Vec<Tree>,
    #[rule("@@?")]
    label: Option<Leaf>,
}

#[test]
fn productions_are_memoized_into_a_finite_graph() {
    let parser = Parser::<Tree>::new().unwrap();
    let grammar = &parser.grammar;

    // Tree appears once despite the self-reference.
    assert_eq!(grammar.production_names().count(), 2);
    let names: Vec<_> = grammar.production_names().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["Tree", "Leaf"]);
}

#[test]
fn finished_grammars_contain_no_placeholders() {
    let parser = Parser::<Tree>::new().unwrap();
    assert!(
        !parser
            .grammar
            .nodes
            .iter()
            .any(|node| matches!(node, Node::Placeholder))
    );
}

#[test]
fn parse_hooks_compile_to_custom_nodes() {
    let parser = Parser::<Leaf>::builder()
        .parse_with::<Leaf, _>(|_lex| Err(crate::ParseError::NoMatch))
        .build()
        .unwrap();
    let custom = parser
        .grammar
        .nodes
        .iter()
        .filter(|node| matches!(node, Node::Custom { .. }))
        .count();
    assert_eq!(custom, 1);
}

#[test]
fn union_variants_must_be_productions() {
    #[derive(Debug, Production)]
    enum Bad {
        Text(String),
    }

    assert!(matches!(
        Parser::<Bad>::new().unwrap_err(),
        BuildError::InvalidCapture { .. }
    ));
}

#[test]
fn empty_union_is_rejected() {
    #[derive(Debug, Production)]
    enum Nothing {}

    assert!(matches!(
        Parser::<Nothing>::new().unwrap_err(),
        BuildError::EmptyProduction { .. }
    ));
}

#[test]
fn nested_captures_are_rejected() {
    #[derive(Debug, Production)]
    struct Nested {
        #[rule("@(@Ident)")]
        x: String,
    }

    assert!(matches!(
        Parser::<Nested>::new().unwrap_err(),
        BuildError::InvalidCapture { .. }
    ));
}

#[test]
fn literal_kind_suffix_resolves_against_symbols() {
    #[derive(Debug, Production)]
    struct Suffixed {
        #[rule("@';':Punct")]
        semi: String,
    }

    // Punct exists in the simple lexer; the grammar compiles and parses.
    let parser = Parser::<Suffixed>::new().unwrap();
    assert_eq!(parser.parse_str("t.x", ";").unwrap().semi, ";");

    #[derive(Debug, Production)]
    struct BadSuffix {
        #[rule("@';':Missing")]
        semi: String,
    }
    assert!(matches!(
        Parser::<BadSuffix>::new().unwrap_err(),
        BuildError::UnknownToken { .. }
    ));
}
