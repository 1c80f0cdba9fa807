//! Integration tests for the XA resource and resolver sessions
//!
//! Two-phase flows, rollback, protocol errors and writer exclusion.

use oxrdf::{NamedNode, Term};
use quadstore::{
    Database, DatabaseConfig, NodeId, SessionError, XaError, XaFlags, XaResolverSession, XaVote,
    Xid, NONE,
};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    Database::open(DatabaseConfig::new(dir.path())).unwrap()
}

fn iri(s: &str) -> Term {
    Term::NamedNode(NamedNode::new(s).unwrap())
}

fn add_statement(session: &mut XaResolverSession, name: &str) -> [NodeId; 4] {
    let s = session.localize(&iri(&format!("http://example.org/{}", name))).unwrap();
    let p = session.localize(&iri("http://example.org/p")).unwrap();
    let o = session.localize(&iri("http://example.org/o")).unwrap();
    let g = session.localize(&iri("http://example.org/g")).unwrap();
    session.add_triple(s, p, o, g).unwrap();
    [s, p, o, g]
}

#[test]
fn test_two_phase_commit() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let xid = Xid::new(1, b"global-1".to_vec(), b"branch-1".to_vec());

    xa.start(&xid, XaFlags::TMNOFLAGS).unwrap();
    assert_eq!(xa.current_xid(), Some(&xid));
    let quad = add_statement(xa.session_mut(), "alice");
    xa.end(&xid, XaFlags::TMSUCCESS).unwrap();

    assert_eq!(xa.prepare(&xid).unwrap(), XaVote::Ok);
    // Preparing again is harmless.
    assert_eq!(xa.prepare(&xid).unwrap(), XaVote::Ok);
    assert_eq!(db.snapshot().unwrap().len(), 0);

    xa.commit(&xid, false).unwrap();
    assert_eq!(xa.current_xid(), None);
    let snapshot = db.snapshot().unwrap();
    assert!(snapshot.exists_triples(quad[0], quad[1], quad[2], quad[3]).unwrap());
}

#[test]
fn test_one_phase_commit() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let xid = Xid::new(7, b"g".to_vec(), b"b".to_vec());

    xa.start(&xid, XaFlags::TMNOFLAGS).unwrap();
    add_statement(xa.session_mut(), "bob");
    xa.end(&xid, XaFlags::TMSUCCESS).unwrap();
    xa.commit(&xid, true).unwrap();
    assert_eq!(db.snapshot().unwrap().len(), 1);
}

#[test]
fn test_rollback_discards_changes() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let xid = Xid::new(1, b"g".to_vec(), b"b".to_vec());

    xa.start(&xid, XaFlags::TMNOFLAGS).unwrap();
    add_statement(xa.session_mut(), "carol");
    xa.prepare(&xid).unwrap();
    xa.rollback(&xid).unwrap();

    let snapshot = db.snapshot().unwrap();
    assert_eq!(snapshot.len(), 0);
    assert_eq!(snapshot.lookup(&iri("http://example.org/carol")).unwrap(), None);

    // The writer slot is free again.
    let mut other = db.new_session();
    other.refresh().unwrap();
}

#[test]
fn test_unknown_branch_errors() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let xid = Xid::new(1, b"g".to_vec(), b"b".to_vec());
    let stranger = Xid::new(1, b"g".to_vec(), b"other".to_vec());

    xa.start(&xid, XaFlags::TMNOFLAGS).unwrap();
    assert!(matches!(xa.prepare(&stranger), Err(XaError::Nota(_))));
    assert!(matches!(xa.commit(&stranger, false), Err(XaError::Nota(_))));
    assert!(matches!(xa.start(&stranger, XaFlags::TMJOIN), Err(XaError::Inval(_))));
    xa.start(&xid, XaFlags::TMRESUME).unwrap();

    // Rolling back the wrong branch still rolls the session back.
    let err = xa.rollback(&stranger).unwrap_err();
    assert_eq!(err.code(), -3);
    assert!(!xa.session().is_active());
}

#[test]
fn test_unrecognised_flags_mark_rollback_only() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let xid = Xid::new(1, b"g".to_vec(), b"b".to_vec());

    assert!(matches!(xa.start(&xid, XaFlags::TMSUSPEND), Err(XaError::Inval(_))));
    assert!(xa.is_rollback_only());
    assert!(matches!(xa.prepare(&xid), Err(XaError::RbRollback(_))));
    assert!(matches!(xa.commit(&xid, true), Err(XaError::RbRollback(_))));
    xa.rollback(&xid).unwrap();
    assert!(!xa.is_rollback_only());
}

#[test]
fn test_start_on_prepared_branch_is_protocol_error() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let xid = Xid::new(1, b"g".to_vec(), b"b".to_vec());

    xa.start(&xid, XaFlags::TMNOFLAGS).unwrap();
    add_statement(xa.session_mut(), "dave");
    xa.prepare(&xid).unwrap();
    let next = Xid::new(1, b"g2".to_vec(), b"b".to_vec());
    assert!(matches!(xa.start(&next, XaFlags::TMNOFLAGS), Err(XaError::Proto(_))));
    xa.commit(&xid, false).unwrap();
    assert_eq!(db.snapshot().unwrap().len(), 1);
}

#[test]
fn test_recover_and_timeouts() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut xa = db.new_xa_resource();
    let other = db.new_xa_resource();

    assert!(matches!(xa.recover(XaFlags::TMSTARTRSCAN), Err(XaError::RmErr(_))));
    assert!(xa.set_transaction_timeout(30));
    assert_eq!(xa.get_transaction_timeout(), 30);
    assert!(xa.is_same_rm(&xa));
    assert!(!xa.is_same_rm(&other));
}

#[test]
fn test_single_writer() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut first = db.new_session();
    let mut second = db.new_session();

    first.refresh().unwrap();
    assert!(matches!(second.refresh(), Err(SessionError::WriterBusy(id)) if id == first.id()));

    // Reads outside a transaction see the committed phase.
    let quad = add_statement(&mut first, "erin");
    assert!(!second.exists_triples(quad[0], NONE, NONE, NONE).unwrap());
    first.commit().unwrap();
    assert!(second.exists_triples(quad[0], NONE, NONE, NONE).unwrap());

    second.refresh().unwrap();
    assert!(second.is_active());
}

#[test]
fn test_session_write_without_transaction() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut session = db.new_session();
    assert!(matches!(
        session.localize(&iri("http://example.org/x")),
        Err(SessionError::NotInTransaction)
    ));

    session.refresh().unwrap();
    add_statement(&mut session, "frank");
    session.prepare().unwrap();
    assert!(matches!(session.add_triple(1, 2, 3, 4), Err(SessionError::Prepared)));
    session.commit().unwrap();
}

#[test]
fn test_dropped_session_rolls_back() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    {
        let mut session = db.new_session();
        session.refresh().unwrap();
        add_statement(&mut session, "gina");
    }
    assert_eq!(db.snapshot().unwrap().len(), 0);
    let mut session = db.new_session();
    session.refresh().unwrap();
}
