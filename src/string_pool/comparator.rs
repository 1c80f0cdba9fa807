//! Pool orderings
//!
//! Entries are ordered by type category, then type id, then a per-type value
//! comparator over the encoded data, with the subtype id breaking any
//! remaining tie. Values longer than [`MAX_DATA_SIZE`] keep only a prefix
//! inline; the data comparator answers from that prefix when it can and
//! reads the rest from the overflow file only when the prefix is
//! inconclusive.
//!
//! Range bounds use a value-only comparison: differently written forms of
//! one value (`"1"^^xsd:short` and `"1.0"^^xsd:decimal`, or one instant in
//! two time zones) compare equal to each other.

use super::flat_file::FlatFile;
use super::object::{decimal_lexical, decimal_value, split_untyped, value_key_len, EncodedValue};
use super::pool::{DataStruct, MAX_DATA_SIZE};
use super::{StringPoolError, TypeCategory};
use crate::avl::AvlComparator;
use crate::node::NodeId;
use std::cmp::Ordering;
use std::sync::Arc;

/// Value comparators, one per family of encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpComparator {
    /// Unsigned byte order. Numeric, temporal and boolean encodings carry an
    /// order-preserving key so this also orders them by value.
    Bytes,
    /// Lexical form compared ignoring ASCII case, then exactly, then the
    /// language tag.
    Untyped,
    /// Numeric value across xsd:decimal and the integer subtypes, then
    /// lexical form.
    Decimal,
}

impl SpComparator {
    /// Comparator for a category and type id.
    pub fn for_type(category: TypeCategory, type_id: u8) -> Self {
        match (category, type_id) {
            (TypeCategory::UntypedLiteral, _) => SpComparator::Untyped,
            (TypeCategory::TypedLiteral, 2) => SpComparator::Decimal,
            _ => SpComparator::Bytes,
        }
    }

    /// Order `key` against the inline prefix of a node whose data is
    /// `node_size` bytes long. `Equal` means the prefix cannot decide.
    pub fn compare_prefix(
        self,
        key_subtype: u8,
        key: &[u8],
        node_subtype: u8,
        prefix: &[u8],
        node_size: usize,
    ) -> Ordering {
        match self {
            SpComparator::Bytes => prefix_order(key, prefix, false),
            SpComparator::Untyped => {
                let Some((_, key_lexical)) = split_untyped(key) else {
                    return Ordering::Equal;
                };
                let Some(&language_len) = prefix.first() else {
                    return Ordering::Equal;
                };
                let start = 1 + language_len as usize;
                if start > prefix.len() || start > node_size {
                    return Ordering::Equal;
                }
                prefix_order(key_lexical, &prefix[start..], true)
            }
            SpComparator::Decimal => {
                if key_subtype == 0 || node_subtype == 0 || key.len() < 16 || prefix.len() < 16 {
                    return Ordering::Equal;
                }
                key[..16].cmp(&prefix[..16])
            }
        }
    }

    /// Order two complete data blocks.
    pub fn compare(self, key_subtype: u8, key: &[u8], node_subtype: u8, node: &[u8]) -> Ordering {
        match self {
            SpComparator::Bytes => key.cmp(node),
            SpComparator::Untyped => match (split_untyped(key), split_untyped(node)) {
                (Some((key_language, key_lexical)), Some((node_language, node_lexical))) => {
                    compare_folded(key_lexical, node_lexical)
                        .then_with(|| key_lexical.cmp(node_lexical))
                        .then_with(|| key_language.cmp(node_language))
                }
                _ => key.cmp(node),
            },
            SpComparator::Decimal => {
                let value = match (decimal_value(key_subtype, key), decimal_value(node_subtype, node)) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => Ordering::Equal,
                };
                value.then_with(|| {
                    decimal_lexical(key_subtype, key).cmp(decimal_lexical(node_subtype, node))
                })
            }
        }
    }

    /// Order two complete data blocks by value, ignoring the lexical form
    /// and subtype.
    pub fn compare_value(self, key_subtype: u8, key: &[u8], node_subtype: u8, node: &[u8]) -> Ordering {
        match self {
            SpComparator::Decimal => match (decimal_value(key_subtype, key), decimal_value(node_subtype, node)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            },
            _ => self.compare(key_subtype, key, node_subtype, node),
        }
    }
}

fn fold(b: &u8) -> u8 {
    b.to_ascii_lowercase()
}

fn compare_folded(a: &[u8], b: &[u8]) -> Ordering {
    a.iter().map(fold).cmp(b.iter().map(fold))
}

/// Order a complete key against a truncated prefix of a longer node value.
fn prefix_order(key: &[u8], prefix: &[u8], folded: bool) -> Ordering {
    let n = key.len().min(prefix.len());
    let head = if folded {
        compare_folded(&key[..n], &prefix[..n])
    } else {
        key[..n].cmp(&prefix[..n])
    };
    if head != Ordering::Equal {
        return head;
    }
    if key.len() < prefix.len() {
        // The key ends inside the node's prefix, so it is a proper prefix of
        // the node value.
        return Ordering::Less;
    }
    Ordering::Equal
}

/// Compares an encoded key with pool entries.
pub struct DataComparator<'a> {
    key: &'a EncodedValue,
    comparator: SpComparator,
    flat: &'a FlatFile,
    by_value: bool,
    overflow_reads: usize,
}

impl<'a> DataComparator<'a> {
    /// Comparator in full pool order.
    pub fn new(key: &'a EncodedValue, flat: &'a FlatFile) -> Self {
        Self {
            key,
            comparator: key.comparator(),
            flat,
            by_value: false,
            overflow_reads: 0,
        }
    }

    /// Comparator that treats every entry with the key's value as equal.
    ///
    /// Pool order sorts by value before lexical form and subtype, so the
    /// entries equal to the key form one contiguous run.
    pub fn by_value(key: &'a EncodedValue, flat: &'a FlatFile) -> Self {
        Self {
            by_value: true,
            ..Self::new(key, flat)
        }
    }

    /// Number of comparisons that had to read the overflow file.
    pub fn overflow_reads(&self) -> usize {
        self.overflow_reads
    }

    /// Order the key against `node` by value alone.
    pub fn compare_value(&mut self, node: &DataStruct) -> Result<Ordering, StringPoolError> {
        self.compare_with(node, true)
    }

    /// Order the key against `node` in this comparator's mode.
    pub fn compare_data(&mut self, node: &DataStruct) -> Result<Ordering, StringPoolError> {
        self.compare_with(node, self.by_value)
    }

    fn compare_with(&mut self, node: &DataStruct, by_value: bool) -> Result<Ordering, StringPoolError> {
        let key = self.key;
        let ord = key
            .category
            .id()
            .cmp(&node.type_category)
            .then(key.type_id.cmp(&node.type_id));
        if ord != Ordering::Equal {
            return Ok(ord);
        }
        if by_value {
            // The fixed value key always lies inside the inline prefix.
            if let Some(len) = value_key_len(key.category, key.type_id) {
                return Ok(key.data.get(..len).cmp(&node.prefix.get(..len)));
            }
        }

        let size = node.data_size as usize;
        let ord = if size > MAX_DATA_SIZE {
            let ord = self.comparator.compare_prefix(
                key.subtype_id,
                &key.data,
                node.subtype_id,
                &node.prefix,
                size,
            );
            if ord != Ordering::Equal {
                ord
            } else {
                self.overflow_reads += 1;
                let data = node.read_data(self.flat)?;
                self.compare_blocks(by_value, &data, node.subtype_id)
            }
        } else {
            self.compare_blocks(by_value, &node.prefix, node.subtype_id)
        };
        if by_value {
            return Ok(ord);
        }
        Ok(ord.then(key.subtype_id.cmp(&node.subtype_id)))
    }

    fn compare_blocks(&self, by_value: bool, node: &[u8], node_subtype: u8) -> Ordering {
        let key = self.key;
        if by_value {
            self.comparator
                .compare_value(key.subtype_id, &key.data, node_subtype, node)
        } else {
            self.comparator
                .compare(key.subtype_id, &key.data, node_subtype, node)
        }
    }
}

/// Comparators used to search the pool indexes.
pub enum PoolComparator<'a> {
    /// Boundary before the first entry of a category.
    Category(u8),
    /// Boundary before the first entry of a category and type.
    CategoryType(u8, u8),
    /// Full comparison against an encoded value.
    Data(DataComparator<'a>),
    /// Boundary immediately after an encoded value.
    After(DataComparator<'a>),
    /// Node index order.
    Node(NodeId),
}

impl AvlComparator<Arc<DataStruct>> for PoolComparator<'_> {
    type Error = StringPoolError;

    fn compare(&mut self, node: &Arc<DataStruct>) -> Result<Ordering, StringPoolError> {
        match self {
            PoolComparator::Category(category) => Ok(if *category <= node.type_category {
                Ordering::Less
            } else {
                Ordering::Greater
            }),
            PoolComparator::CategoryType(category, type_id) => {
                Ok(if (*category, *type_id) <= (node.type_category, node.type_id) {
                    Ordering::Less
                } else {
                    Ordering::Greater
                })
            }
            PoolComparator::Data(data) => data.compare_data(node),
            PoolComparator::After(data) => Ok(match data.compare_data(node)? {
                Ordering::Equal => Ordering::Greater,
                ord => ord,
            }),
            PoolComparator::Node(gnode) => Ok((*gnode).cmp(&node.gnode)),
        }
    }
}
