// Copyright 2023 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! The bit-packed trie node.
//!
//! A node is twelve octets: a logical 64-bit *index word* and a 32-bit
//! auxiliary word, stored as three 32-bit words so that arrays of
//! nodes carry no padding. For a branch, the index word packs
//!
//! * bit 0: the branch tag (always set);
//! * bits 1..48: the bitmap of present twigs (bit 1 is
//!   [`SHIFT_NOBYTE`], bits 2..48 are octet shifts); and
//! * bits 48..64: the offset into the lookup key of the shift that
//!   selects a twig,
//!
//! and the auxiliary word is the twig-vector reference into the page
//! table. For a leaf, the index word is the value pointer (word
//! alignment keeps the tag bit clear) and the auxiliary word is the
//! byte offset from the value to the `*const Name` slot inside it, so
//! a leaf can recover its own key without spending a second pointer.

use std::fmt;

use crate::name::Name;

use super::key::{LookupKey, SHIFT_BRANCH, SHIFT_NOBYTE, SHIFT_OFFSET};

/// The number of twigs a branch can have: one per bitmap bit.
pub(super) const MAX_TWIGS: usize = (SHIFT_OFFSET - SHIFT_NOBYTE) as usize;

/// A twig-vector reference: `page_index * PAGE_SIZE + twig_offset`.
pub(super) type TwigRef = u32;

/// The value of the branch tag in the index word.
const BRANCH_TAG: u64 = 1 << SHIFT_BRANCH;

////////////////////////////////////////////////////////////////////////
// NODE REPRESENTATION                                                //
////////////////////////////////////////////////////////////////////////

/// One qp-trie node, branch or leaf.
///
/// `Node` is `Copy` and is freely copied out of pages during descent;
/// twelve octets is cheaper to move than to chase.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(C)]
pub(super) struct Node {
    words: [u32; 3],
}

impl Node {
    /// The all-zero node: a leaf with a null value pointer. A trie
    /// whose root is `EMPTY` contains nothing.
    pub(super) const EMPTY: Node = Node { words: [0; 3] };

    fn from_words(index: u64, aux: u32) -> Node {
        Node {
            words: [index as u32, (index >> 32) as u32, aux],
        }
    }

    /// The 64-bit index word, synthesized from the first two 32-bit
    /// words by little-endian concatenation.
    pub(super) fn index(&self) -> u64 {
        self.words[0] as u64 | (self.words[1] as u64) << 32
    }

    /// Creates a branch node with the given key offset, twig bitmap,
    /// and twig-vector reference. The bitmap is given already shifted
    /// into index-word positions (bits 1..48).
    pub(super) fn new_branch(offset: usize, bitmap: u64, twigs: TwigRef) -> Node {
        debug_assert_eq!(bitmap & !BITMAP_MASK, 0);
        Self::from_words(
            BRANCH_TAG | bitmap | (offset as u64) << SHIFT_OFFSET,
            twigs,
        )
    }

    /// Creates a leaf node. `val` must be word-aligned (so that the
    /// branch tag bit reads as zero) and non-null; `name_offset` is the
    /// byte offset of the `*const Name` slot within the value.
    pub(super) fn new_leaf(val: *const u8, name_offset: u32) -> Node {
        debug_assert!(!val.is_null());
        debug_assert_eq!(val as usize & BRANCH_TAG as usize, 0);
        Self::from_words(val as usize as u64, name_offset)
    }

    pub(super) fn is_branch(&self) -> bool {
        self.index() & BRANCH_TAG != 0
    }
}

/// The bitmap portion of a branch's index word.
const BITMAP_MASK: u64 = ((1 << SHIFT_OFFSET) - 1) & !BRANCH_TAG;

////////////////////////////////////////////////////////////////////////
// BRANCH ACCESS                                                      //
////////////////////////////////////////////////////////////////////////

impl Node {
    /// The offset of the key shift that selects this branch's twigs.
    pub(super) fn key_offset(&self) -> usize {
        (self.index() >> SHIFT_OFFSET) as usize
    }

    /// Which bitmap bit identifies the twig of this branch for `key`?
    pub(super) fn twig_bit(&self, key: &LookupKey) -> u8 {
        key.shift(self.key_offset())
    }

    /// Is the twig identified by `bit` present?
    pub(super) fn has_twig(&self, bit: u8) -> bool {
        self.index() & (1 << bit) != 0
    }

    /// The popcount of the bitmap below `bit`. Subtracting 2 from the
    /// mask both sets the lesser bits and clears the branch tag, which
    /// is not part of the bitmap.
    fn bitmap_weight(&self, bit: u8) -> u8 {
        debug_assert!(bit >= SHIFT_NOBYTE);
        (self.index() & ((1 << bit) - 2)).count_ones() as u8
    }

    /// The position of twig `bit` within the twig-vector.
    pub(super) fn twig_pos(&self, bit: u8) -> u8 {
        self.bitmap_weight(bit)
    }

    /// How many twigs this branch has. The offset field sits directly
    /// above the bitmap, so the weight below [`SHIFT_OFFSET`] is the
    /// whole bitmap's popcount.
    pub(super) fn twig_max(&self) -> u8 {
        self.bitmap_weight(SHIFT_OFFSET)
    }

    /// The reference to this branch's twig-vector.
    pub(super) fn twig_ref(&self) -> TwigRef {
        self.words[2]
    }

    /// This branch, redirected to a relocated twig-vector.
    pub(super) fn with_twig_ref(&self, twigs: TwigRef) -> Node {
        Self::from_words(self.index(), twigs)
    }

    /// This branch with an additional twig, in a new twig-vector.
    pub(super) fn grown(&self, bit: u8, twigs: TwigRef) -> Node {
        Self::from_words(self.index() | 1 << bit, twigs)
    }

    /// This branch with one fewer twig, in a new twig-vector.
    pub(super) fn shrunk(&self, bit: u8, twigs: TwigRef) -> Node {
        Self::from_words(self.index() & !(1 << bit), twigs)
    }
}

////////////////////////////////////////////////////////////////////////
// LEAF ACCESS                                                        //
////////////////////////////////////////////////////////////////////////

impl Node {
    /// The leaf's value pointer. Null only in the root node of an
    /// empty trie.
    pub(super) fn leaf_val(&self) -> *mut u8 {
        self.index() as usize as *mut u8
    }

    /// Recovers the domain name that keys this leaf, by reading the
    /// `*const Name` slot stored `name_offset` bytes into the value.
    ///
    /// # Safety
    ///
    /// The leaf must have been built by `QpTrie::add`, its value must
    /// still be live, and the caller's contract with `add` (the slot
    /// holds a pointer to the name, and both outlive the leaf) must
    /// hold. The returned lifetime is the caller's claim, not ours.
    pub(super) unsafe fn leaf_name<'a>(&self) -> &'a Name {
        let slot = self.leaf_val().add(self.words[2] as usize) as *const *const Name;
        &**slot
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_branch() {
            write!(
                f,
                "Branch {{ offset: {}, bitmap: {:#014x}, twigs: {} }}",
                self.key_offset(),
                self.index() & BITMAP_MASK,
                self.twig_ref(),
            )
        } else {
            write!(
                f,
                "Leaf {{ val: {:p}, name_offset: {} }}",
                self.leaf_val(),
                self.words[2],
            )
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    #[test]
    fn node_is_twelve_octets() {
        assert_eq!(mem::size_of::<Node>(), 12);
        assert_eq!(mem::align_of::<Node>(), 4);
    }

    #[test]
    fn empty_node_is_a_null_leaf() {
        assert!(!Node::EMPTY.is_branch());
        assert!(Node::EMPTY.leaf_val().is_null());
    }

    #[test]
    fn branch_fields_round_trip() {
        let bitmap = (1u64 << SHIFT_NOBYTE) | (1 << 0x13) | (1 << 0x2c);
        let n = Node::new_branch(511, bitmap, 0xdead_beef);
        assert!(n.is_branch());
        assert_eq!(n.key_offset(), 511);
        assert_eq!(n.twig_ref(), 0xdead_beef);
        assert_eq!(n.twig_max(), 3);
    }

    #[test]
    fn twig_positions_follow_the_bitmap() {
        let bitmap = (1u64 << SHIFT_NOBYTE) | (1 << 0x06) | (1 << 0x13) | (1 << 0x2f);
        let n = Node::new_branch(3, bitmap, 0);
        assert!(n.has_twig(SHIFT_NOBYTE));
        assert!(n.has_twig(0x06));
        assert!(!n.has_twig(0x07));
        assert_eq!(n.twig_pos(SHIFT_NOBYTE), 0);
        assert_eq!(n.twig_pos(0x06), 1);
        assert_eq!(n.twig_pos(0x13), 2);
        assert_eq!(n.twig_pos(0x2f), 3);
        // The position of an absent twig is where it would be inserted.
        assert_eq!(n.twig_pos(0x07), 2);
        assert_eq!(n.twig_max(), 4);
    }

    #[test]
    fn grown_and_shrunk_update_the_bitmap() {
        let bitmap = (1u64 << 0x06) | (1 << 0x13);
        let n = Node::new_branch(7, bitmap, 10);
        let grown = n.grown(0x2c, 20);
        assert_eq!(grown.twig_max(), 3);
        assert_eq!(grown.twig_ref(), 20);
        assert_eq!(grown.key_offset(), 7);
        let shrunk = grown.shrunk(0x06, 30);
        assert_eq!(shrunk.twig_max(), 2);
        assert!(!shrunk.has_twig(0x06));
        assert_eq!(shrunk.twig_ref(), 30);
    }

    #[test]
    fn leaf_recovers_its_name() {
        struct Value {
            _records: u64,
            name: *const Name,
        }

        let name: Name = "leaf.test.".parse().unwrap();
        let value = Value {
            _records: 42,
            name: &name,
        };
        let offset = &value.name as *const _ as usize - &value as *const _ as usize;
        let n = Node::new_leaf(&value as *const Value as *const u8, offset as u32);
        assert!(!n.is_branch());
        assert_eq!(n.leaf_val(), &value as *const Value as *mut u8);
        assert_eq!(unsafe { n.leaf_name() }, &name);
    }
}
