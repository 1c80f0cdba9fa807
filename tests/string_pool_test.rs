//! Integration tests for the node pool
//!
//! Localization round trips, type ordering and range queries.

use oxrdf::{Literal, NamedNode, Term};
use quadstore::string_pool::FlatFile;
use quadstore::{NodeId, StringPool, StringPoolError, TypeCategory};
use std::sync::Arc;

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

fn pool() -> StringPool {
    StringPool::new(Arc::new(FlatFile::temporary().unwrap()))
}

fn typed(lexical: &str, datatype: &str) -> Term {
    Term::Literal(Literal::new_typed_literal(
        lexical,
        NamedNode::new(format!("{}{}", XSD, datatype)).unwrap(),
    ))
}

fn values(pool: &StringPool, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| match pool.globalize(*node).unwrap() {
            Term::Literal(literal) => literal.value().to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[test]
fn test_round_trip_of_term_kinds() {
    let mut pool = pool();
    let terms = vec![
        Term::NamedNode(NamedNode::new("http://example.org/thing").unwrap()),
        Term::Literal(Literal::new_simple_literal("plain")),
        Term::Literal(Literal::new_language_tagged_literal("bonjour", "fr").unwrap()),
        typed("42", "int"),
        typed("-3.25", "decimal"),
        typed("2.5E3", "double"),
        typed("2024-02-29", "date"),
        typed("2024-02-29T12:30:00Z", "dateTime"),
        typed("true", "boolean"),
        Term::Literal(Literal::new_typed_literal(
            "opaque",
            NamedNode::new("http://example.org/custom-type").unwrap(),
        )),
    ];

    let nodes: Vec<NodeId> = terms.iter().map(|term| pool.localize(term).unwrap()).collect();
    for (term, node) in terms.iter().zip(&nodes) {
        assert_eq!(&pool.globalize(*node).unwrap(), term);
        assert_eq!(pool.lookup(term).unwrap(), Some(*node));
    }
    assert_eq!(pool.len(), terms.len());
}

#[test]
fn test_lookup_of_unknown_value_is_none() {
    let pool = pool();
    let term = Term::NamedNode(NamedNode::new("http://example.org/missing").unwrap());
    assert_eq!(pool.lookup(&term).unwrap(), None);
}

#[test]
fn test_malformed_typed_literal_is_rejected() {
    let mut pool = pool();
    let result = pool.localize(&typed("not-a-number", "integer"));
    assert!(matches!(result, Err(StringPoolError::Localize(_))));
    assert!(pool.is_empty());
    assert!(pool.pending().is_empty());
}

#[test]
fn test_integers_are_ordered_by_value() {
    let mut pool = pool();
    for lexical in ["10", "-7", "2", "100", "0"] {
        pool.localize(&typed(lexical, "integer")).unwrap();
    }
    let nodes = pool.find_type(TypeCategory::TypedLiteral, Some(&format!("{}integer", XSD))).unwrap();
    assert_eq!(values(&pool, &nodes), vec!["-7", "0", "2", "10", "100"]);
}

#[test]
fn test_find_type_restricts_to_datatype() {
    let mut pool = pool();
    pool.localize(&typed("1", "integer")).unwrap();
    pool.localize(&typed("2", "int")).unwrap();
    pool.localize(&typed("3.5", "double")).unwrap();
    pool.localize(&Term::Literal(Literal::new_simple_literal("text"))).unwrap();

    let ints = pool.find_type(TypeCategory::TypedLiteral, Some(&format!("{}int", XSD))).unwrap();
    assert_eq!(values(&pool, &ints), vec!["2"]);
    let typed_all = pool.find_type(TypeCategory::TypedLiteral, None).unwrap();
    assert_eq!(typed_all.len(), 3);
    let untyped = pool.find_type(TypeCategory::UntypedLiteral, None).unwrap();
    assert_eq!(untyped.len(), 1);
    assert!(matches!(
        pool.find_type(TypeCategory::Uri, Some(&format!("{}int", XSD))),
        Err(StringPoolError::InvalidRange(_))
    ));
}

#[test]
fn test_range_bounds() {
    let mut pool = pool();
    for lexical in ["1", "2", "3", "4", "5"] {
        pool.localize(&typed(lexical, "integer")).unwrap();
    }
    let low = typed("2", "integer");
    let high = typed("4", "integer");

    let closed = pool.find_range(Some(&low), true, Some(&high), true).unwrap();
    assert_eq!(values(&pool, &closed), vec!["2", "3", "4"]);
    let open = pool.find_range(Some(&low), false, Some(&high), false).unwrap();
    assert_eq!(values(&pool, &open), vec!["3"]);
    let from = pool.find_range(Some(&high), true, None, false).unwrap();
    assert_eq!(values(&pool, &from), vec!["4", "5"]);
    let until = pool.find_range(None, false, Some(&low), false).unwrap();
    assert_eq!(values(&pool, &until), vec!["1"]);
}

#[test]
fn test_range_spans_decimal_family() {
    let mut pool = pool();
    pool.localize(&typed("1.5", "decimal")).unwrap();
    pool.localize(&typed("3", "int")).unwrap();
    pool.localize(&typed("7", "long")).unwrap();

    let range = pool
        .find_range(Some(&typed("1", "integer")), true, Some(&typed("5", "decimal")), true)
        .unwrap();
    assert_eq!(values(&pool, &range), vec!["1.5", "3"]);
}

#[test]
fn test_range_requires_compatible_bounds() {
    let pool = pool();
    assert!(matches!(
        pool.find_range(None, true, None, true),
        Err(StringPoolError::InvalidRange(_))
    ));
    assert!(matches!(
        pool.find_range(Some(&typed("1", "integer")), true, Some(&typed("1.0", "double")), true),
        Err(StringPoolError::InvalidRange(_))
    ));
}

#[test]
fn test_uri_prefix_range() {
    let mut pool = pool();
    for iri in [
        "http://example.org/a/1",
        "http://example.org/a/2",
        "http://example.org/b/1",
        "http://other.org/x",
    ] {
        pool.localize(&Term::NamedNode(NamedNode::new(iri).unwrap())).unwrap();
    }
    let low = Term::NamedNode(NamedNode::new("http://example.org/a/").unwrap());
    let high = Term::NamedNode(NamedNode::new("http://example.org/a0").unwrap());
    let range = pool.find_range(Some(&low), true, Some(&high), false).unwrap();
    assert_eq!(
        values(&pool, &range),
        vec!["<http://example.org/a/1>", "<http://example.org/a/2>"]
    );
}

fn sorted_values(pool: &StringPool, nodes: &[NodeId]) -> Vec<String> {
    let mut values = values(pool, nodes);
    values.sort();
    values
}

#[test]
fn test_range_bounds_cover_every_form_of_a_value() {
    let mut pool = pool();
    pool.localize(&typed("0.5", "decimal")).unwrap();
    pool.localize(&typed("1", "short")).unwrap();
    pool.localize(&typed("1.0", "decimal")).unwrap();
    pool.localize(&typed("01", "integer")).unwrap();
    pool.localize(&typed("2", "int")).unwrap();

    let one = typed("1", "integer");
    let until = pool.find_range(None, false, Some(&one), true).unwrap();
    assert_eq!(sorted_values(&pool, &until), vec!["0.5", "01", "1", "1.0"]);
    let below = pool.find_range(None, false, Some(&one), false).unwrap();
    assert_eq!(values(&pool, &below), vec!["0.5"]);

    let above = pool.find_range(Some(&typed("1", "int")), false, None, false).unwrap();
    assert_eq!(values(&pool, &above), vec!["2"]);
    let from = pool.find_range(Some(&typed("1.00", "decimal")), true, None, false).unwrap();
    assert_eq!(sorted_values(&pool, &from), vec!["01", "1", "1.0", "2"]);

    let exact = pool.find_range(Some(&one), true, Some(&typed("1.0", "decimal")), true).unwrap();
    assert_eq!(sorted_values(&pool, &exact), vec!["01", "1", "1.0"]);
}

#[test]
fn test_date_time_range_compares_instants() {
    let mut pool = pool();
    pool.localize(&typed("2024-01-01T11:00:00Z", "dateTime")).unwrap();
    pool.localize(&typed("2024-01-01T12:00:00Z", "dateTime")).unwrap();
    pool.localize(&typed("2024-01-01T13:00:00+01:00", "dateTime")).unwrap();
    pool.localize(&typed("2024-01-02T00:00:00Z", "dateTime")).unwrap();

    let noon = typed("2024-01-01T12:00:00Z", "dateTime");
    let until = pool.find_range(None, false, Some(&noon), true).unwrap();
    assert_eq!(until.len(), 3);
    let after = pool
        .find_range(Some(&typed("2024-01-01T14:00:00+02:00", "dateTime")), false, None, false)
        .unwrap();
    assert_eq!(values(&pool, &after), vec!["2024-01-02T00:00:00Z"]);
}

#[test]
fn test_range_stays_within_category() {
    let mut pool = pool();
    let a = pool.localize(&Term::NamedNode(NamedNode::new("http://example.org/a").unwrap())).unwrap();
    pool.localize(&Term::Literal(Literal::new_simple_literal("http://example.org/m"))).unwrap();
    let z = pool.localize(&Term::NamedNode(NamedNode::new("http://example.org/z").unwrap())).unwrap();
    pool.new_blank_node();

    let low = Term::NamedNode(NamedNode::new("http://example.org/").unwrap());
    let high = Term::NamedNode(NamedNode::new("http://example.org/zz").unwrap());
    assert_eq!(pool.find_range(Some(&low), true, Some(&high), false).unwrap(), vec![a, z]);
    assert_eq!(pool.find_range(Some(&low), true, None, false).unwrap(), vec![a, z]);
    assert_eq!(pool.find_type(TypeCategory::Uri, None).unwrap(), vec![a, z]);
    assert_eq!(pool.find_type(TypeCategory::UntypedLiteral, None).unwrap().len(), 1);
}
