use crate::compile::lookahead::Decision;
use crate::graph::{Grammar, Node};
use crate::{Parser, Production};

fn disjunction_tables(grammar: &Grammar) -> Vec<Option<&Decision>> {
    grammar
        .nodes
        .iter()
        .filter_map(|node| match node {
            Node::Disjunction { table, .. } => Some(table.as_ref()),
            _ => None,
        })
        .collect()
}

fn group_tables(grammar: &Grammar) -> Vec<Option<&Decision>> {
    grammar
        .nodes
        .iter()
        .filter_map(|node| match node {
            Node::Group { table, .. } => Some(table.as_ref()),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Production)]
struct DeepChoice {
    #[rule("('a' @'x') | ('a' @'y')")]
    v: String,
}

#[test]
fn ambiguity_within_depth_leaves_no_table() {
    let parser = Parser::<DeepChoice>::new().unwrap();
    let tables = disjunction_tables(&parser.grammar);
    assert_eq!(tables.len(), 1);
    assert!(tables[0].is_none());
}

#[test]
fn deeper_lookahead_disambiguates() {
    let parser = Parser::<DeepChoice>::builder().lookahead(2).build().unwrap();
    let tables = disjunction_tables(&parser.grammar);
    let table = tables[0].expect("two tokens distinguish the alternatives");
    // One two-token prefix per alternative.
    assert_eq!(table.entries.len(), 2);
    assert_eq!(table.entries[0].1, 0);
    assert_eq!(table.entries[1].1, 1);

    // And the parser picks the right branch either way.
    assert_eq!(parser.parse_str("t.x", "a y").unwrap().v, "y");
    assert_eq!(parser.parse_str("t.x", "a x").unwrap().v, "x");
}

#[test]
fn disjoint_first_tokens_build_a_depth_one_table() {
    #[derive(Debug, Production)]
    struct Simple {
        #[rule("(@'l' 'x') | (@'r' 'y')")]
        v: String,
    }

    let parser = Parser::<Simple>::new().unwrap();
    let tables = disjunction_tables(&parser.grammar);
    assert!(tables[0].is_some());
}

#[test]
fn nullable_repetition_bodies_get_no_enter_table() {
    #[derive(Debug, Production)]
    struct Loopy {
        #[rule("(@Ident?)*")]
        xs: Vec<String>,
    }

    let parser = Parser::<Loopy>::new().unwrap();
    let tables = group_tables(&parser.grammar);
    // Outer `*` has no table (nullable body); inner `?` has one.
    let with = tables.iter().filter(|t| t.is_some()).count();
    let without = tables.iter().filter(|t| t.is_none()).count();
    assert_eq!((with, without), (1, 1));
}

#[test]
fn recursion_abandons_expansion() {
    #[derive(Debug, Production)]
    struct Nest {
        #[rule("('[' @@ ']') | ('<' @@ '>')")]
        inner: Vec<Nest>,
        #[rule("'.'?")]
        leaf: bool,
    }

    // At depth 2 the expansion must walk into Nest itself, and gives up.
    let parser = Parser::<Nest>::builder().lookahead(2).build().unwrap();
    let tables = disjunction_tables(&parser.grammar);
    assert!(tables.iter().all(|t| t.is_none()));
}

#[test]
fn probes_and_custom_parsers_block_tables() {
    #[derive(Debug, Production)]
    struct Probing {
        #[rule("((?= 'a') @Ident) | (!'b' @Ident)")]
        v: Vec<String>,
    }

    let parser = Parser::<Probing>::new().unwrap();
    let tables = disjunction_tables(&parser.grammar);
    assert!(tables[0].is_none());
}
