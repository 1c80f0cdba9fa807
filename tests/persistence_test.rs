//! Integration tests for durability
//!
//! Reopening, transaction log recovery and rollback atomicity.

use oxrdf::{Literal, NamedNode, Term};
use quadstore::persistence::wal::{Change, Wal, WalEntry};
use quadstore::persistence::RecoveryStats;
use quadstore::{Database, DatabaseConfig, PersistenceManager, NONE};
use tempfile::TempDir;

fn iri(s: &str) -> Term {
    Term::NamedNode(NamedNode::new(s).unwrap())
}

#[test]
fn test_committed_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let long = Term::Literal(Literal::new_simple_literal("y".repeat(300)));
    let (s, o, blank);
    {
        let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
        let mut session = db.new_session();
        session.refresh().unwrap();
        s = session.localize(&iri("http://example.org/s")).unwrap();
        let p = session.localize(&iri("http://example.org/p")).unwrap();
        o = session.localize(&long).unwrap();
        let g = session.localize(&iri("http://example.org/g")).unwrap();
        blank = session.new_blank_node().unwrap();
        session.add_triple(s, p, o, g).unwrap();
        session.add_triple(blank, p, s, g).unwrap();
        session.commit().unwrap();
        db.close().unwrap();
    }

    let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
    let stats = db.stats();
    assert_eq!(stats.statements, 2);
    assert!(stats.overflow_bytes > 0);

    let snapshot = db.snapshot().unwrap();
    assert_eq!(snapshot.lookup(&iri("http://example.org/s")).unwrap(), Some(s));
    assert_eq!(snapshot.globalize(o).unwrap(), long);
    assert!(snapshot.exists_triples(blank, NONE, s, NONE).unwrap());

    // Allocation continues past the recovered counters.
    let mut session = db.new_session();
    session.refresh().unwrap();
    let fresh = session.localize(&iri("http://example.org/new")).unwrap();
    assert!(fresh > s && fresh > o);
    assert_ne!(session.new_blank_node().unwrap(), blank);
}

#[test]
fn test_rollback_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let long = Term::Literal(Literal::new_simple_literal("z".repeat(400)));
    {
        let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
        let mut session = db.new_session();
        session.refresh().unwrap();
        let s = session.localize(&iri("http://example.org/s")).unwrap();
        let o = session.localize(&long).unwrap();
        session.add_triple(s, s, o, s).unwrap();
        session.prepare().unwrap();
        session.rollback().unwrap();
        assert_eq!(db.stats().overflow_bytes, 0);
        db.close().unwrap();
    }

    // The rollback decision was logged next to the truncation.
    {
        let mut manager = PersistenceManager::new(dir.path(), false).unwrap();
        assert_eq!(manager.recover().unwrap(), RecoveryStats::default());
    }

    let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
    let snapshot = db.snapshot().unwrap();
    assert!(snapshot.is_empty().unwrap());
    assert_eq!(snapshot.lookup(&iri("http://example.org/s")).unwrap(), None);
    assert_eq!(snapshot.lookup(&long).unwrap(), None);
}

#[test]
fn test_recovery_applies_logged_commits() {
    let dir = TempDir::new().unwrap();
    {
        // A commit record that never reached storage, and an undecided
        // transaction.
        let mut wal = Wal::new(dir.path().join("wal")).unwrap();
        wal.append(WalEntry::Prepare {
            txn: 1,
            changes: vec![Change::AddQuad([5, 6, 7, 8])],
        })
        .unwrap();
        wal.append(WalEntry::Commit { txn: 1 }).unwrap();
        wal.append(WalEntry::Prepare {
            txn: 2,
            changes: vec![Change::AddQuad([9, 9, 9, 9])],
        })
        .unwrap();
        wal.flush().unwrap();
    }

    let mut manager = PersistenceManager::new(dir.path(), true).unwrap();
    let stats = manager.recover().unwrap();
    assert_eq!(stats, RecoveryStats { replayed: 1, discarded: 1 });
    assert_eq!(manager.storage().load_quads().unwrap(), vec![[5, 6, 7, 8]]);

    // The log was truncated, so a second recovery has nothing to do.
    drop(manager);
    let mut manager = PersistenceManager::new(dir.path(), true).unwrap();
    assert_eq!(manager.recover().unwrap(), RecoveryStats::default());
}

#[test]
fn test_undecided_transaction_is_dropped_on_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut manager = PersistenceManager::new(dir.path(), true).unwrap();
        manager.recover().unwrap();
        let txn = manager.begin();
        manager.prepare(txn, vec![Change::AddQuad([1, 2, 3, 4])]).unwrap();
        assert!(manager.is_prepared(txn));
    }

    let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
    assert_eq!(db.stats().statements, 0);
}

#[test]
fn test_checkpoint_and_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
        for name in ["a", "b", "c"] {
            let mut session = db.new_session();
            session.refresh().unwrap();
            let node = session.localize(&iri(&format!("http://example.org/{}", name))).unwrap();
            session.add_triple(node, node, node, node).unwrap();
            session.commit().unwrap();
        }
        db.checkpoint().unwrap();
        db.close().unwrap();
    }
    let db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
    assert_eq!(db.stats().statements, 3);
}

#[test]
fn test_copy_graph_between_databases() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let source = Database::open(DatabaseConfig::new(source_dir.path())).unwrap();
    let target = Database::open(DatabaseConfig::new(target_dir.path())).unwrap();
    let graph = iri("http://example.org/g");

    let mut session = source.new_session();
    session.refresh().unwrap();
    let g = session.localize(&graph).unwrap();
    let p = session.localize(&iri("http://example.org/p")).unwrap();
    let b1 = session.new_blank_node().unwrap();
    let b2 = session.new_blank_node().unwrap();
    session.add_triple(b1, p, b2, g).unwrap();
    session.add_triple(b2, p, b1, g).unwrap();
    session.commit().unwrap();

    let copied = source
        .copy_graph_into(&target, &graph, &iri("http://example.org/copy"))
        .unwrap();
    assert_eq!(copied, 2);

    let snapshot = target.snapshot().unwrap();
    let copy = snapshot.lookup(&iri("http://example.org/copy")).unwrap().unwrap();
    let rows: Vec<Vec<u64>> = snapshot
        .find_tuples(NONE, NONE, NONE, copy)
        .unwrap()
        .map(|row| row.unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    // The blank node cycle is preserved.
    let (first, second) = (&rows[0], &rows[1]);
    assert_eq!(first[0], second[2]);
    assert_eq!(first[2], second[0]);
}
