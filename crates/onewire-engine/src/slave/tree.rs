//! Binary decision tree over the ROM codes of the attached keys.
//!
//! Each branch node is the first bit position, counting from bit 0, where
//! the keys below it disagree. Leaves hold exactly one key each. The hub
//! walks the tree during Search-ROM to know when to answer with a
//! collision (`0, 0`) and whose bits to send in between.

use heapless::Vec;

use crate::rom::RomCode;

/// Upper bound on keys served by one hub.
pub const HUB_DEVICE_LIMIT: usize = 8;
/// A full binary tree with `HUB_DEVICE_LIMIT` leaves.
pub const TREE_CAPACITY: usize = 2 * HUB_DEVICE_LIMIT - 1;

/// `bit_position` of a leaf.
pub const LEAF: u8 = 128;
/// Child index meaning "no node".
pub const NO_NODE: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TreeNode {
    /// ROM bit this node splits on, or [`LEAF`].
    pub bit_position: u8,
    /// Device slot whose bits are sent while this node is current.
    pub device: u8,
    pub on_zero: u8,
    pub on_one: u8,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.bit_position == LEAF
    }
}

/// Bit set of device slots.
pub type SlotMask = u32;

/// ROM per hub slot, `None` for a free slot.
pub type SlotTable = [Option<RomCode>; HUB_DEVICE_LIMIT];

#[derive(Debug, Clone, Default)]
pub struct DiscriminationTree {
    nodes: Vec<TreeNode, TREE_CAPACITY>,
}

impl DiscriminationTree {
    /// Build from the slot table; `None` entries are skipped.
    pub fn build(slots: &SlotTable) -> Self {
        let mut tree = Self::default();
        let mask = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(0, |m, (i, _)| m | (1 << i));
        tree.grow(slots, 0, mask);
        tree
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.first()
    }

    pub fn node(&self, index: u8) -> Option<&TreeNode> {
        self.nodes.get(index as usize)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Device slots bound to leaves, in node order.
    pub fn leaves(&self) -> impl Iterator<Item = u8> + '_ {
        self.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.device)
    }

    fn grow(
        &mut self,
        slots: &SlotTable,
        mut position: u8,
        mask: SlotMask,
    ) -> u8 {
        if mask == 0 {
            return NO_NODE;
        }
        let first = mask.trailing_zeros() as u8;

        while position < 64 {
            let (ones, zeros) = split(slots, mask, position);
            if ones != 0 && zeros != 0 {
                let index = self.push(TreeNode {
                    bit_position: position,
                    device: first,
                    on_zero: NO_NODE,
                    on_one: NO_NODE,
                });
                let on_one = self.grow(slots, position + 1, ones);
                let on_zero = self.grow(slots, position + 1, zeros);
                if let Some(node) = self.nodes.get_mut(index as usize) {
                    node.on_one = on_one;
                    node.on_zero = on_zero;
                }
                return index;
            }
            position += 1;
        }

        self.push(TreeNode {
            bit_position: LEAF,
            device: first,
            on_zero: NO_NODE,
            on_one: NO_NODE,
        })
    }

    fn push(&mut self, node: TreeNode) -> u8 {
        let index = self.nodes.len() as u8;
        // n leaves never need more than 2n - 1 nodes.
        let _ = self.nodes.push(node);
        index
    }
}

fn split(
    slots: &SlotTable,
    mask: SlotMask,
    position: u8,
) -> (SlotMask, SlotMask) {
    let mut ones = 0;
    let mut zeros = 0;
    for (i, rom) in slots.iter().enumerate() {
        let bit = 1 << i;
        if mask & bit == 0 {
            continue;
        }
        if let Some(rom) = rom {
            if rom.bit(position) {
                ones |= bit;
            } else {
                zeros |= bit;
            }
        }
    }
    (ones, zeros)
}
