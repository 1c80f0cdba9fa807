//! Index orderings

use crate::node::{NodeId, Quad, NONE};

/// Quad positions in pattern masks and index orders.
pub const SUBJECT: usize = 0;
pub const PREDICATE: usize = 1;
pub const OBJECT: usize = 2;
pub const GRAPH: usize = 3;

/// One of the six orderings the statement store keeps.
///
/// Together they give every combination of bound positions an index in
/// which the bound positions form a key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOrder {
    /// 0123
    Spog,
    /// 1203
    Posg,
    /// 2013
    Ospg,
    /// 3012
    Gspo,
    /// 3120
    Gpso,
    /// 3201
    Gosp,
}

impl IndexOrder {
    pub const ALL: [IndexOrder; 6] = [
        IndexOrder::Spog,
        IndexOrder::Posg,
        IndexOrder::Ospg,
        IndexOrder::Gspo,
        IndexOrder::Gpso,
        IndexOrder::Gosp,
    ];

    /// Quad position stored in each key slot.
    pub fn positions(self) -> [usize; 4] {
        match self {
            IndexOrder::Spog => [0, 1, 2, 3],
            IndexOrder::Posg => [1, 2, 0, 3],
            IndexOrder::Ospg => [2, 0, 1, 3],
            IndexOrder::Gspo => [3, 0, 1, 2],
            IndexOrder::Gpso => [3, 1, 2, 0],
            IndexOrder::Gosp => [3, 2, 0, 1],
        }
    }

    /// Slot of this order in [`IndexOrder::ALL`]
    pub fn slot(self) -> usize {
        match self {
            IndexOrder::Spog => 0,
            IndexOrder::Posg => 1,
            IndexOrder::Ospg => 2,
            IndexOrder::Gspo => 3,
            IndexOrder::Gpso => 4,
            IndexOrder::Gosp => 5,
        }
    }

    /// Index for a mask of bound positions (bit `i` set when position `i`
    /// is bound).
    pub fn for_mask(mask: u8) -> Self {
        match mask & 0x0f {
            0b0000 | 0b0001 | 0b0011 | 0b0111 | 0b1111 => IndexOrder::Spog,
            0b0010 | 0b0110 => IndexOrder::Posg,
            0b0100 | 0b0101 => IndexOrder::Ospg,
            0b1000 | 0b1001 | 0b1011 => IndexOrder::Gspo,
            0b1010 | 0b1110 => IndexOrder::Gpso,
            _ => IndexOrder::Gosp,
        }
    }

    /// Reorder a quad into key order.
    pub fn permute(self, quad: &Quad) -> Quad {
        let positions = self.positions();
        [
            quad[positions[0]],
            quad[positions[1]],
            quad[positions[2]],
            quad[positions[3]],
        ]
    }

    /// Inverse of [`IndexOrder::permute`].
    pub fn unpermute(self, key: &Quad) -> Quad {
        let mut quad = [NONE; 4];
        for (slot, position) in self.positions().iter().enumerate() {
            quad[*position] = key[slot];
        }
        quad
    }

    /// Short name used for column families and logs, e.g. `"0123"`.
    pub fn name(self) -> &'static str {
        match self {
            IndexOrder::Spog => "0123",
            IndexOrder::Posg => "1203",
            IndexOrder::Ospg => "2013",
            IndexOrder::Gspo => "3012",
            IndexOrder::Gpso => "3120",
            IndexOrder::Gosp => "3201",
        }
    }
}

/// Mask of the positions of `pattern` that are not [`NONE`].
pub fn bound_mask(pattern: &[NodeId; 4]) -> u8 {
    pattern
        .iter()
        .enumerate()
        .filter(|(_, node)| **node != NONE)
        .fold(0u8, |mask, (position, _)| mask | (1 << position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_positions_form_prefix() {
        for mask in 0u8..16 {
            let order = IndexOrder::for_mask(mask);
            let bound = mask.count_ones() as usize;
            for (slot, position) in order.positions().iter().enumerate() {
                let is_bound = mask & (1 << position) != 0;
                assert_eq!(is_bound, slot < bound, "mask {:04b} order {}", mask, order.name());
            }
        }
    }

    #[test]
    fn test_permute_roundtrip() {
        let quad = [1, 2, 3, 4];
        for order in IndexOrder::ALL {
            assert_eq!(order.unpermute(&order.permute(&quad)), quad);
        }
        assert_eq!(IndexOrder::Gpso.permute(&quad), [4, 2, 3, 1]);
    }
}
