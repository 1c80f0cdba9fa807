//! Node pool phases

use super::comparator::{DataComparator, PoolComparator};
use super::flat_file::FlatFile;
use super::object::{EncodedValue, SpObject, XsdType, UNKNOWN_TYPE_ID};
use super::{StringPoolError, StringPoolResult, TypeCategory};
use crate::avl::{AvlComparator, AvlTree};
use crate::node::{blank_counter, blank_node, is_blank, NodeId, BLANK_NODE_BIT, MIN_NODE, NONE};
use oxiri::Iri;
use oxrdf::{BlankNode, Term};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Largest data block kept inline in a pool entry.
pub const MAX_DATA_SIZE: usize = 72;

/// A pool entry
///
/// At most [`MAX_DATA_SIZE`] bytes of the data block are stored inline; the
/// remainder of a longer block lives in the overflow file at `overflow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStruct {
    pub gnode: NodeId,
    pub type_category: u8,
    pub type_id: u8,
    pub subtype_id: u8,
    pub data_size: u32,
    pub prefix: Vec<u8>,
    pub overflow: Option<u64>,
}

impl DataStruct {
    fn new(gnode: NodeId, value: &EncodedValue, flat: &FlatFile) -> StringPoolResult<Self> {
        let data = &value.data;
        let data_size = u32::try_from(data.len())
            .map_err(|_| StringPoolError::Localize(format!("value of {} bytes is too large", data.len())))?;
        let (prefix, overflow) = if data.len() > MAX_DATA_SIZE {
            let offset = flat.append(&data[MAX_DATA_SIZE..])?;
            (data[..MAX_DATA_SIZE].to_vec(), Some(offset))
        } else {
            (data.clone(), None)
        };
        Ok(Self {
            gnode,
            type_category: value.category.id(),
            type_id: value.type_id,
            subtype_id: value.subtype_id,
            data_size,
            prefix,
            overflow,
        })
    }

    /// The complete data block, reading the overflow file if needed.
    pub fn read_data(&self, flat: &FlatFile) -> StringPoolResult<Vec<u8>> {
        let size = self.data_size as usize;
        match self.overflow {
            None => Ok(self.prefix.clone()),
            Some(offset) => {
                let tail_len = size.checked_sub(self.prefix.len()).ok_or_else(|| StringPoolError::Corrupt {
                    node: self.gnode,
                    reason: "prefix longer than data".to_string(),
                })?;
                let mut data = self.prefix.clone();
                data.extend(flat.read(offset, tail_len)?);
                Ok(data)
            }
        }
    }

    /// The entry in the form used for comparisons.
    pub fn encoded(&self, flat: &FlatFile) -> StringPoolResult<EncodedValue> {
        Ok(EncodedValue {
            category: self.category()?,
            type_id: self.type_id,
            subtype_id: self.subtype_id,
            data: self.read_data(flat)?,
        })
    }

    fn category(&self) -> StringPoolResult<TypeCategory> {
        TypeCategory::from_id(self.type_category).ok_or_else(|| StringPoolError::Corrupt {
            node: self.gnode,
            reason: format!("unknown type category {}", self.type_category),
        })
    }

    /// Decode the stored value.
    pub fn to_object(&self, flat: &FlatFile) -> StringPoolResult<SpObject> {
        let data = self.read_data(flat)?;
        SpObject::decode(self.category()?, self.type_id, self.subtype_id, &data)
            .map_err(|reason| StringPoolError::Corrupt { node: self.gnode, reason })
    }
}

/// One phase of the node pool.
///
/// Cloning is O(1): both indexes share their nodes with the original, which
/// is how a committed phase is handed to readers while a writer builds the
/// next phase.
#[derive(Clone)]
pub struct StringPool {
    /// Entries in (category, type, value, subtype) order
    data_index: AvlTree<Arc<DataStruct>>,
    /// Entries in node identifier order
    node_index: AvlTree<Arc<DataStruct>>,
    next_gnode: NodeId,
    next_blank: u64,
    flat: Arc<FlatFile>,
    /// Entries added since the phase was last marked clean
    pending: Vec<Arc<DataStruct>>,
}

impl StringPool {
    /// Create an empty pool over `flat`
    pub fn new(flat: Arc<FlatFile>) -> Self {
        Self {
            data_index: AvlTree::new(),
            node_index: AvlTree::new(),
            next_gnode: MIN_NODE,
            next_blank: 1,
            flat,
            pending: Vec::new(),
        }
    }

    /// Rebuild a pool from persisted entries.
    pub fn from_entries(
        flat: Arc<FlatFile>,
        mut entries: Vec<DataStruct>,
        next_gnode: NodeId,
        next_blank: u64,
    ) -> StringPoolResult<Self> {
        entries.sort_by_key(|entry| entry.gnode);
        let entries: Vec<Arc<DataStruct>> = entries.into_iter().map(Arc::new).collect();
        let mut data_index = AvlTree::new();
        for entry in &entries {
            let key = entry.encoded(&flat)?;
            let mut cmp = PoolComparator::Data(DataComparator::new(&key, &flat));
            if !data_index.insert(Arc::clone(entry), &mut cmp)? {
                return Err(StringPoolError::Corrupt {
                    node: entry.gnode,
                    reason: "duplicate value in pool".to_string(),
                });
            }
        }
        let max_gnode = entries.last().map_or(NONE, |entry| entry.gnode);
        debug!("Loaded {} pool entries", entries.len());
        Ok(Self {
            data_index,
            node_index: AvlTree::from_sorted(entries),
            next_gnode: next_gnode.max(max_gnode + 1).max(MIN_NODE),
            next_blank: next_blank.max(1),
            flat,
            pending: Vec::new(),
        })
    }

    /// Return the node for `term`, allocating one if the value is new.
    ///
    /// Blank nodes that this pool issued map back to themselves; any other
    /// blank node gets a fresh identifier.
    pub fn localize(&mut self, term: &Term) -> StringPoolResult<NodeId> {
        match term {
            Term::BlankNode(blank) => Ok(match self.issued_blank(blank) {
                Some(node) => node,
                None => self.new_blank_node(),
            }),
            _ => self.localize_object(&SpObject::from_term(term)?),
        }
    }

    /// Return the node for `object`, allocating one if the value is new.
    pub fn localize_object(&mut self, object: &SpObject) -> StringPoolResult<NodeId> {
        if let SpObject::Uri(iri) = object {
            Iri::parse(iri.as_str())
                .map_err(|e| StringPoolError::Localize(format!("invalid IRI <{}>: {}", iri, e)))?;
        }
        let key = object.encode()?;
        if let Some(node) = self.find_encoded(&key)? {
            return Ok(node);
        }

        if self.next_gnode >= BLANK_NODE_BIT {
            return Err(StringPoolError::Localize("node identifiers exhausted".to_string()));
        }
        let gnode = self.next_gnode;
        let entry = Arc::new(DataStruct::new(gnode, &key, &self.flat)?);

        let mut cmp = PoolComparator::Data(DataComparator::new(&key, &self.flat));
        self.data_index.insert(Arc::clone(&entry), &mut cmp)?;
        self.node_index
            .insert(Arc::clone(&entry), &mut PoolComparator::Node(gnode))?;
        self.next_gnode += 1;
        self.pending.push(entry);
        Ok(gnode)
    }

    /// Allocate a blank node.
    pub fn new_blank_node(&mut self) -> NodeId {
        let node = blank_node(self.next_blank);
        self.next_blank += 1;
        node
    }

    fn issued_blank(&self, blank: &BlankNode) -> Option<NodeId> {
        let id = u64::try_from(blank.as_ref().unique_id()?).ok()?;
        self.is_issued_blank(id).then_some(id)
    }

    /// Check if `node` is a blank node allocated by this pool.
    pub fn is_issued_blank(&self, node: NodeId) -> bool {
        is_blank(node) && (1..self.next_blank).contains(&blank_counter(node))
    }

    /// Find the node for `term` without allocating.
    pub fn lookup(&self, term: &Term) -> StringPoolResult<Option<NodeId>> {
        match term {
            Term::BlankNode(blank) => Ok(self.issued_blank(blank)),
            _ => match SpObject::from_term(term) {
                Ok(object) => self.lookup_object(&object),
                Err(_) => Ok(None),
            },
        }
    }

    /// Find the node for `object` without allocating.
    pub fn lookup_object(&self, object: &SpObject) -> StringPoolResult<Option<NodeId>> {
        match object.encode() {
            Ok(key) => self.find_encoded(&key),
            // A value that cannot be encoded was never stored.
            Err(StringPoolError::Localize(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn find_encoded(&self, key: &EncodedValue) -> StringPoolResult<Option<NodeId>> {
        let mut cmp = PoolComparator::Data(DataComparator::new(key, &self.flat));
        Ok(self.data_index.find(&mut cmp)?.map(|entry| entry.gnode))
    }

    /// The value stored for `node`, if any. Blank nodes have none.
    pub fn find_node(&self, node: NodeId) -> StringPoolResult<Option<SpObject>> {
        match self.node_index.find(&mut PoolComparator::Node(node))? {
            Some(entry) => Ok(Some(entry.to_object(&self.flat)?)),
            None => Ok(None),
        }
    }

    /// Return the term for `node`.
    pub fn globalize(&self, node: NodeId) -> StringPoolResult<Term> {
        if node == NONE {
            return Err(StringPoolError::Globalize("cannot globalize the wildcard node".to_string()));
        }
        if is_blank(node) {
            if self.is_issued_blank(node) {
                return Ok(Term::BlankNode(BlankNode::new_from_unique_id(node as u128)));
            }
            return Err(StringPoolError::Globalize(format!("unknown blank node {}", node)));
        }
        match self.find_node(node)? {
            Some(object) => object.to_term(),
            None => Err(StringPoolError::Globalize(format!("unknown node {}", node))),
        }
    }

    /// All nodes of a category in pool order, optionally restricted to one
    /// datatype of the typed literal category.
    pub fn find_type(
        &self,
        category: TypeCategory,
        datatype: Option<&str>,
    ) -> StringPoolResult<Vec<NodeId>> {
        let category_id = category.id();
        let mut result = Vec::new();

        let Some(datatype) = datatype else {
            let cursor = self.data_index.lower_bound(&mut PoolComparator::Category(category_id))?;
            for entry in cursor {
                if entry.type_category != category_id {
                    break;
                }
                result.push(entry.gnode);
            }
            return Ok(result);
        };

        if category != TypeCategory::TypedLiteral {
            return Err(StringPoolError::InvalidRange(format!(
                "datatype filter on {:?} category",
                category
            )));
        }
        let (type_id, subtype_id) = match XsdType::from_iri(datatype) {
            Some(ty) => (ty.type_id(), Some(ty.subtype_id())),
            None => (UNKNOWN_TYPE_ID, None),
        };
        let cursor = self
            .data_index
            .lower_bound(&mut PoolComparator::CategoryType(category_id, type_id))?;
        for entry in cursor {
            if entry.type_category != category_id || entry.type_id != type_id {
                break;
            }
            let matches = match subtype_id {
                Some(subtype_id) => entry.subtype_id == subtype_id,
                None => matches!(
                    entry.to_object(&self.flat)?,
                    SpObject::TypedLiteral { datatype: ref stored, .. } if stored == datatype
                ),
            };
            if matches {
                result.push(entry.gnode);
            }
        }
        Ok(result)
    }

    /// All nodes whose value lies between `start` and `end` in pool order.
    ///
    /// Bounds compare by value, so every stored form of a bound's value is
    /// on the same side of it.
    ///
    /// Either bound may be open, but not both, and the bounds must share a
    /// category and type.
    pub fn find_range(
        &self,
        start: Option<&Term>,
        start_inclusive: bool,
        end: Option<&Term>,
        end_inclusive: bool,
    ) -> StringPoolResult<Vec<NodeId>> {
        let encode = |term: &Term| -> StringPoolResult<EncodedValue> {
            SpObject::from_term(term)
                .and_then(|object| object.encode())
                .map_err(|e| StringPoolError::InvalidRange(e.to_string()))
        };
        let start = start.map(encode).transpose()?;
        let end = end.map(encode).transpose()?;

        let (category, type_id) = match (&start, &end) {
            (None, None) => {
                return Err(StringPoolError::InvalidRange("range has no bounds".to_string()))
            }
            (Some(bound), None) | (None, Some(bound)) => (bound.category.id(), bound.type_id),
            (Some(low), Some(high)) => {
                if (low.category, low.type_id) != (high.category, high.type_id) {
                    return Err(StringPoolError::InvalidRange(
                        "range bounds have different types".to_string(),
                    ));
                }
                (low.category.id(), low.type_id)
            }
        };

        let cursor = match &start {
            Some(low) => {
                let data = DataComparator::by_value(low, &self.flat);
                let mut cmp = if start_inclusive {
                    PoolComparator::Data(data)
                } else {
                    PoolComparator::After(data)
                };
                self.data_index.lower_bound(&mut cmp)?
            }
            None => self
                .data_index
                .lower_bound(&mut PoolComparator::CategoryType(category, type_id))?,
        };

        let mut end_cmp = end
            .as_ref()
            .map(|high| PoolComparator::Data(DataComparator::by_value(high, &self.flat)));
        let mut result = Vec::new();
        for entry in cursor {
            if entry.type_category != category || entry.type_id != type_id {
                break;
            }
            if let Some(cmp) = end_cmp.as_mut() {
                match cmp.compare(&entry)? {
                    Ordering::Less => break,
                    Ordering::Equal if !end_inclusive => break,
                    _ => {}
                }
            }
            result.push(entry.gnode);
        }
        Ok(result)
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.node_index.len()
    }

    /// Check if no values are stored
    pub fn is_empty(&self) -> bool {
        self.node_index.is_empty()
    }

    /// Next ordinary identifier to be allocated
    pub fn next_gnode(&self) -> NodeId {
        self.next_gnode
    }

    /// Next blank node counter to be allocated
    pub fn next_blank(&self) -> u64 {
        self.next_blank
    }

    /// Entries added since the last call to [`StringPool::mark_clean`].
    pub fn pending(&self) -> &[Arc<DataStruct>] {
        &self.pending
    }

    /// Forget pending entries once they are durable.
    pub fn mark_clean(&mut self) {
        self.pending.clear();
    }

    /// Overflow file shared by all phases of this pool
    pub fn flat_file(&self) -> &Arc<FlatFile> {
        &self.flat
    }
}
