//! Node identifiers
//!
//! Every RDF term stored in a database is represented by a 64-bit node
//! identifier. Ordinary identifiers are allocated by the string pool; blank
//! nodes come from a separate counter and carry [`BLANK_NODE_BIT`].

/// A node identifier.
pub type NodeId = u64;

/// Wildcard in pattern queries. Never allocated.
pub const NONE: NodeId = 0;

/// Smallest valid node identifier.
pub const MIN_NODE: NodeId = 1;

/// Marks the blank node range.
pub const BLANK_NODE_BIT: NodeId = 1 << 62;

/// A quad of node identifiers in subject, predicate, object, graph order.
pub type Quad = [NodeId; 4];

/// Returns true if `node` lies in the blank node range.
pub fn is_blank(node: NodeId) -> bool {
    node & BLANK_NODE_BIT != 0
}

/// Builds the blank node identifier for an allocator counter.
pub fn blank_node(counter: u64) -> NodeId {
    counter | BLANK_NODE_BIT
}

/// Extracts the allocator counter from a blank node identifier.
pub fn blank_counter(node: NodeId) -> u64 {
    node & !BLANK_NODE_BIT
}
