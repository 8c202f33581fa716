//! Extensible bitmaps.
//!
//! A sparse set of small integers stored as an ascending list of fixed-size
//! word nodes. Only nodes with at least one set bit are kept, so a policy
//! with thousands of types but few attributes per type stays small.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Number of bits held by a single node
pub const MAPSIZE: u32 = u64::BITS;

/// One word of an extensible bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EbitmapNode {
    /// First bit covered by this node, always a multiple of [`MAPSIZE`]
    start_bit: u32,
    /// Membership word, bit `i` flags `start_bit + i`
    map: u64,
}

impl EbitmapNode {
    /// Test a bit; bits outside this node's range are reported unset
    #[must_use]
    pub const fn get_bit(&self, bit: u32) -> bool {
        if bit < self.start_bit || bit - self.start_bit >= MAPSIZE {
            return false;
        }
        (self.map >> (bit - self.start_bit)) & 1 == 1
    }
}

/// Sparse node-based bitmap
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ebitmap {
    nodes: Vec<EbitmapNode>,
}

impl Ebitmap {
    /// Create an empty bitmap
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Check whether no bit is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending order
    #[must_use]
    pub fn nodes(&self) -> &[EbitmapNode] {
        &self.nodes
    }

    /// Number of set bits
    #[must_use]
    pub fn cardinality(&self) -> u32 {
        self.nodes.iter().map(|n| n.map.count_ones()).sum()
    }

    /// Test a bit
    #[must_use]
    pub fn get_bit(&self, bit: u32) -> bool {
        let start = node_start(bit);
        self.nodes
            .binary_search_by_key(&start, |n| n.start_bit)
            .map(|i| self.nodes[i].get_bit(bit))
            .unwrap_or(false)
    }

    /// Set or clear a bit
    pub fn set_bit(&mut self, bit: u32, value: bool) {
        let start = node_start(bit);
        let mask = 1u64 << (bit - start);

        match self.nodes.binary_search_by_key(&start, |n| n.start_bit) {
            Ok(i) => {
                if value {
                    self.nodes[i].map |= mask;
                } else {
                    self.nodes[i].map &= !mask;
                    if self.nodes[i].map == 0 {
                        self.nodes.remove(i);
                    }
                }
            }
            Err(i) => {
                if value {
                    self.nodes.insert(
                        i,
                        EbitmapNode {
                            start_bit: start,
                            map: mask,
                        },
                    );
                }
            }
        }
    }

    /// Walk every bit position covered by a node, set or not
    ///
    /// Callers test membership with [`EbitmapNode::get_bit`]; a node only
    /// guarantees that at least one of its positions is set.
    #[must_use]
    pub fn positions(&self) -> Positions<'_> {
        Positions {
            nodes: self.nodes.iter(),
            current: None,
            offset: 0,
        }
    }

    /// Set bits in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.positions()
            .filter(|(node, bit)| node.get_bit(*bit))
            .map(|(_, bit)| bit)
    }

    /// Check node structure after decoding
    ///
    /// # Errors
    ///
    /// Returns error if nodes are unaligned, empty or out of order
    pub fn validate(&self) -> CoreResult<()> {
        let mut previous: Option<u32> = None;
        for node in &self.nodes {
            if node.start_bit % MAPSIZE != 0 {
                return Err(CoreError::InvalidBitmap {
                    reason: format!("node start {} is not aligned", node.start_bit),
                });
            }
            if node.map == 0 {
                return Err(CoreError::InvalidBitmap {
                    reason: format!("node at {} is empty", node.start_bit),
                });
            }
            if previous.is_some_and(|p| p >= node.start_bit) {
                return Err(CoreError::InvalidBitmap {
                    reason: format!("node at {} is out of order", node.start_bit),
                });
            }
            previous = Some(node.start_bit);
        }
        Ok(())
    }
}

impl FromIterator<u32> for Ebitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut map = Self::new();
        for bit in iter {
            map.set_bit(bit, true);
        }
        map
    }
}

/// Iterator over `(node, bit)` positions of an [`Ebitmap`]
pub struct Positions<'a> {
    nodes: std::slice::Iter<'a, EbitmapNode>,
    current: Option<&'a EbitmapNode>,
    offset: u32,
}

impl<'a> Iterator for Positions<'a> {
    type Item = (&'a EbitmapNode, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.current {
                if self.offset < MAPSIZE {
                    let bit = node.start_bit + self.offset;
                    self.offset += 1;
                    return Some((node, bit));
                }
            }
            self.current = Some(self.nodes.next()?);
            self.offset = 0;
        }
    }
}

const fn node_start(bit: u32) -> u32 {
    bit - bit % MAPSIZE
}
