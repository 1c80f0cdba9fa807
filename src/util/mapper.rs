//! Node identifier remapping

use super::IntFile;
use crate::node::{blank_counter, is_blank, NodeId, NONE};
use rustc_hash::FxHashMap;
use std::io;

/// Maps node identifiers of one database to those of another.
///
/// [`NONE`] is returned for identifiers that were never mapped.
pub trait LongMapper {
    fn put_long(&mut self, key: NodeId, value: NodeId) -> io::Result<()>;
    fn get_long(&mut self, key: NodeId) -> io::Result<NodeId>;
}

/// In-memory mapper for small graphs
#[derive(Debug, Default)]
pub struct MemLongMapper {
    map: FxHashMap<NodeId, NodeId>,
}

impl MemLongMapper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LongMapper for MemLongMapper {
    fn put_long(&mut self, key: NodeId, value: NodeId) -> io::Result<()> {
        self.map.insert(key, value);
        Ok(())
    }

    fn get_long(&mut self, key: NodeId) -> io::Result<NodeId> {
        Ok(self.map.get(&key).copied().unwrap_or(NONE))
    }
}

/// File-backed mapper with one slot file for ordinary nodes and one for
/// blank nodes, each addressed by a dense counter.
pub struct BlankNodeMapper {
    nodes: IntFile,
    blanks: IntFile,
}

impl BlankNodeMapper {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            nodes: IntFile::temporary()?,
            blanks: IntFile::temporary()?,
        })
    }
}

impl LongMapper for BlankNodeMapper {
    fn put_long(&mut self, key: NodeId, value: NodeId) -> io::Result<()> {
        if is_blank(key) {
            self.blanks.put_long(blank_counter(key), value)
        } else {
            self.nodes.put_long(key, value)
        }
    }

    fn get_long(&mut self, key: NodeId) -> io::Result<NodeId> {
        if is_blank(key) {
            self.blanks.get_long(blank_counter(key))
        } else {
            self.nodes.get_long(key)
        }
    }
}
