//! Blank node labels of one document
//!
//! Labels are collected while a batch is examined, allocated together on the
//! consuming thread, and remembered for the rest of the parse so a label
//! always resolves to the same node.

use super::RdfFormat;
use crate::node::{NodeId, NONE};
use crate::util::{IntFile, StringToLongMap};
use crate::xa::{SessionResult, XaResolverSession};
use rustc_hash::FxHashSet;
use std::io;
use tracing::debug;

/// Numeric labels at or above this go to the string map.
const MAX_NUMERIC_LABEL: u64 = 1 << 32;

/// Label to node maps for one parse
pub struct BlankNodeMap {
    format: RdfFormat,
    numeric: IntFile,
    named: StringToLongMap,
    unallocated_numeric: FxHashSet<u64>,
    unallocated_named: FxHashSet<String>,
    allocated: u64,
}

impl BlankNodeMap {
    pub fn new(format: RdfFormat) -> io::Result<Self> {
        Ok(Self {
            format,
            numeric: IntFile::temporary()?,
            named: StringToLongMap::new(),
            unallocated_numeric: FxHashSet::default(),
            unallocated_named: FxHashSet::default(),
            allocated: 0,
        })
    }

    /// Integer form of a label: plain digits in N3 (`_:17`), `A` and digits
    /// in RDF/XML (`A17`). Leading zeros are not canonical and use the
    /// string map.
    fn numeric_key(&self, label: &str) -> Option<u64> {
        let digits = match self.format {
            RdfFormat::N3 => label,
            RdfFormat::RdfXml => label.strip_prefix('A')?,
        };
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return None;
        }
        digits.parse::<u64>().ok().filter(|key| *key < MAX_NUMERIC_LABEL)
    }

    /// Node already assigned to `label`, or [`NONE`]
    pub fn get(&mut self, label: &str) -> io::Result<NodeId> {
        match self.numeric_key(label) {
            Some(key) => self.numeric.get_long(key),
            None => Ok(self.named.get(label)),
        }
    }

    /// Remember `label` for the next allocation if it has no node yet.
    pub fn note(&mut self, label: &str) -> io::Result<()> {
        if self.get(label)? != NONE {
            return Ok(());
        }
        match self.numeric_key(label) {
            Some(key) => {
                self.unallocated_numeric.insert(key);
            }
            None => {
                if !self.unallocated_named.contains(label) {
                    self.unallocated_named.insert(label.to_string());
                }
            }
        }
        Ok(())
    }

    /// Number of labels waiting for a node
    pub fn unallocated(&self) -> usize {
        self.unallocated_numeric.len() + self.unallocated_named.len()
    }

    /// Allocate nodes for every noted label and clear the working sets.
    pub fn allocate(&mut self, session: &mut XaResolverSession) -> SessionResult<usize> {
        let count = self.unallocated();
        for key in std::mem::take(&mut self.unallocated_numeric) {
            let node = session.new_blank_node()?;
            self.numeric.put_long(key, node)?;
        }
        for label in std::mem::take(&mut self.unallocated_named) {
            let node = session.new_blank_node()?;
            self.named.put(&label, node);
        }
        if count > 0 {
            self.allocated += count as u64;
            debug!("Allocated {} blank nodes ({} in this parse)", count, self.allocated);
        }
        Ok(count)
    }

    /// Blank nodes allocated during this parse
    pub fn allocated(&self) -> u64 {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_label_forms() {
        let n3 = BlankNodeMap::new(RdfFormat::N3).unwrap();
        assert_eq!(n3.numeric_key("17"), Some(17));
        assert_eq!(n3.numeric_key("A17"), None);
        assert_eq!(n3.numeric_key("017"), None);
        assert_eq!(n3.numeric_key("bn1"), None);
        assert_eq!(n3.numeric_key("99999999999"), None);

        let xml = BlankNodeMap::new(RdfFormat::RdfXml).unwrap();
        assert_eq!(xml.numeric_key("A17"), Some(17));
        assert_eq!(xml.numeric_key("17"), None);
        assert_eq!(xml.numeric_key("A"), None);
    }
}
