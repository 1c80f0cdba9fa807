//! Integration tests for the statement store
//!
//! Pattern lookups, projections, removal and phase isolation.

use quadstore::statement::{IndexOrder, StatementStore, StatementStoreError, TuplesError};
use quadstore::{probe_is_empty, NodeId, NONE};

fn collect(store: &StatementStore, pattern: [NodeId; 4]) -> Vec<Vec<NodeId>> {
    store
        .find_tuples(pattern[0], pattern[1], pattern[2], pattern[3])
        .unwrap()
        .map(|row| row.unwrap())
        .collect()
}

#[test]
fn test_subject_lookup_scenario() {
    let mut store = StatementStore::new();
    assert!(store.is_empty().unwrap());

    store.add_triple(1, 2, 3, 1).unwrap();
    store.add_triple(1, 2, 4, 2).unwrap();
    store.add_triple(2, 5, 6, 2).unwrap();

    let tuples = store.find_tuples(1, NONE, NONE, NONE).unwrap();
    assert_eq!(tuples.column_order(), vec![1, 2, 3]);
    let rows: Vec<Vec<NodeId>> = tuples.map(|row| row.unwrap()).collect();
    assert_eq!(rows, vec![vec![2, 3, 1], vec![2, 4, 2]]);

    assert!(!store.exists_triples(1, 3, 2, NONE).unwrap());
    assert!(!store.is_empty().unwrap());

    store.remove_triples(1, 2, 3, 1).unwrap();
    assert!(!store.exists_triples(1, 2, 3, NONE).unwrap());
    assert!(store.exists_triples(1, 2, 4, NONE).unwrap());
    assert_eq!(store.len(), 2);
}

#[test]
fn test_every_mask_finds_the_same_statements() {
    let mut store = StatementStore::new();
    for s in 1..=3 {
        for p in 10..=11 {
            store.add_triple(s, p, 20 + s, 30).unwrap();
        }
    }
    let full = [2, 11, 22, 30];
    for mask in 0u8..16 {
        let pattern: Vec<NodeId> = (0..4)
            .map(|position| if mask & (1 << position) != 0 { full[position] } else { NONE })
            .collect();
        let tuples = store
            .find_tuples(pattern[0], pattern[1], pattern[2], pattern[3])
            .unwrap();
        assert_eq!(tuples.index_order(), IndexOrder::for_mask(mask));
        assert_eq!(tuples.width(), 4 - mask.count_ones() as usize);
        let columns = tuples.column_order();
        let rows: Vec<Vec<NodeId>> = tuples.map(|row| row.unwrap()).collect();
        assert!(!rows.is_empty(), "mask {:04b} found nothing", mask);
        // The full statement is among the projected rows.
        let expected: Vec<NodeId> = columns.iter().map(|position| full[*position]).collect();
        assert!(rows.contains(&expected), "mask {:04b}", mask);
    }
}

#[test]
fn test_rows_are_ordered_and_distinct() {
    let mut store = StatementStore::new();
    for object in [9, 3, 7, 3, 1] {
        store.add_triple(5, 6, object, 1).unwrap();
    }
    assert_eq!(collect(&store, [5, 6, NONE, 1]), vec![vec![1], vec![3], vec![7], vec![9]]);
}

#[test]
fn test_graph_and_predicate_lookup() {
    let mut store = StatementStore::new();
    store.add_triple(1, 2, 3, 7).unwrap();
    store.add_triple(4, 2, 5, 7).unwrap();
    store.add_triple(6, 2, 8, 9).unwrap();

    let tuples = store.find_tuples(NONE, 2, NONE, 7).unwrap();
    assert_eq!(tuples.index_order(), IndexOrder::Gpso);
    let rows: Vec<Vec<NodeId>> = tuples.map(|row| row.unwrap()).collect();
    assert_eq!(rows, vec![vec![1, 3], vec![4, 5]]);
    assert!(store.is_graph_empty(8).unwrap());
    assert!(!store.is_graph_empty(9).unwrap());
}

#[test]
fn test_sequence_is_isolated_from_later_writes() {
    let mut store = StatementStore::new();
    store.add_triple(1, 2, 3, 4).unwrap();
    let tuples = store.find_tuples(NONE, NONE, NONE, NONE).unwrap();
    store.add_triple(5, 6, 7, 8).unwrap();
    assert_eq!(tuples.count(), 1);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_writable_phase_does_not_touch_parent() {
    let mut committed = StatementStore::new();
    committed.add_triple(1, 2, 3, 4).unwrap();
    committed.mark_clean();

    let mut phase = committed.new_writable();
    phase.add_triple(5, 6, 7, 8).unwrap();
    phase.remove_triples(1, NONE, NONE, NONE).unwrap();

    assert_eq!(committed.len(), 1);
    assert!(committed.exists_triples(1, 2, 3, 4).unwrap());
    assert_eq!(phase.len(), 1);
    assert_eq!(phase.changes().len(), 2);
}

#[test]
fn test_closed_store() {
    let mut store = StatementStore::new();
    store.add_triple(1, 2, 3, 4).unwrap();
    let mut tuples = store.find_tuples(NONE, NONE, NONE, NONE).unwrap();
    store.close();

    assert_eq!(tuples.next(), Some(Err(TuplesError::StoreClosed)));
    assert_eq!(tuples.next(), None);
    assert!(matches!(
        store.find_tuples(1, NONE, NONE, NONE),
        Err(StatementStoreError::Closed)
    ));
    assert!(matches!(store.add_triple(5, 6, 7, 8), Err(StatementStoreError::Closed)));
}

#[test]
fn test_probe_is_empty() {
    let mut store = StatementStore::new();
    assert_eq!(probe_is_empty(&store).unwrap(), Some(true));
    store.add_triple(1, 2, 3, 4).unwrap();
    assert_eq!(probe_is_empty(&store).unwrap(), Some(false));
}
