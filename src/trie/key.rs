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

//! Conversion of domain names into trie lookup keys.
//!
//! A lookup key is a sequence of *shifts*: small integers naming bit
//! positions in a branch node's index word. A domain name is converted
//! to a key by walking its labels from the rightmost (top-level) label
//! to the leftmost and passing each octet through [`BYTE_TO_SHIFTS`].
//! Octets from the common hostname alphabet map to a single shift;
//! any other octet expands to an escape shift followed by a second
//! shift identifying the escaped octet. Each label is terminated with
//! [`SHIFT_NOBYTE`], and the whole key ends with a second
//! `SHIFT_NOBYTE`, so that the end of the name is distinguishable from
//! the end of a label.
//!
//! The table is arranged so that comparing two keys shift-by-shift
//! gives exactly the canonical ordering of the underlying names
//! (labels right to left, ASCII letters folded to lowercase). The trie
//! leans on this everywhere: it never compares [`Name`]s during
//! descent, only key shifts.

use crate::name::Name;

/// The index-word bit that tags a node as a branch. Never present in a
/// key.
pub(super) const SHIFT_BRANCH: u8 = 0;

/// The shift emitted for a label boundary. It sorts before every octet
/// shift, which is what makes `a.example.` order before `ab.example.`.
pub(super) const SHIFT_NOBYTE: u8 = 1;

/// The first bit past the bitmap; the key byte offset is stored in the
/// index word from this bit upward.
pub(super) const SHIFT_OFFSET: u8 = 48;

/// The maximum length of a lookup key. A domain name can be up to 255
/// octets on the wire; each octet of a label expands to at most two
/// shifts, and each label boundary and the final terminator add one
/// more, so 512 is a comfortable bound (the true maximum is a few
/// less).
pub(super) const MAX_KEY_LEN: usize = 512;

/// Maps octets in a domain name to key shifts. The low 8 bits of an
/// entry are always emitted; the high 8 bits, when non-zero, are
/// emitted afterward as the escaped octet's identity. Uppercase ASCII
/// letters share entries with their lowercase counterparts, so keys
/// are case-folded by construction.
#[rustfmt::skip]
const BYTE_TO_SHIFTS: [u16; 256] = [
    0x0202, 0x0302, 0x0402, 0x0502, 0x0602, 0x0702, 0x0802, 0x0902,
    0x0a02, 0x0b02, 0x0c02, 0x0d02, 0x0e02, 0x0f02, 0x1002, 0x1102,
    0x1202, 0x1302, 0x1402, 0x1502, 0x1602, 0x1702, 0x1802, 0x1902,
    0x1a02, 0x1b02, 0x1c02, 0x1d02, 0x1e02, 0x1f02, 0x2002, 0x2102,
    0x2202, 0x2302, 0x2402, 0x2502, 0x2602, 0x2702, 0x2802, 0x2902,
    0x2a02, 0x2b02, 0x2c02, 0x2d02, 0x2e02, 0x0003, 0x0004, 0x0005,
    0x0006, 0x0007, 0x0008, 0x0009, 0x000a, 0x000b, 0x000c, 0x000d,
    0x000e, 0x000f, 0x0210, 0x0310, 0x0410, 0x0510, 0x0610, 0x0710,
    0x0810, 0x0013, 0x0014, 0x0015, 0x0016, 0x0017, 0x0018, 0x0019,
    0x001a, 0x001b, 0x001c, 0x001d, 0x001e, 0x001f, 0x0020, 0x0021,
    0x0022, 0x0023, 0x0024, 0x0025, 0x0026, 0x0027, 0x0028, 0x0029,
    0x002a, 0x002b, 0x002c, 0x0910, 0x0a10, 0x0b10, 0x0c10, 0x0011,
    0x0012, 0x0013, 0x0014, 0x0015, 0x0016, 0x0017, 0x0018, 0x0019,
    0x001a, 0x001b, 0x001c, 0x001d, 0x001e, 0x001f, 0x0020, 0x0021,
    0x0022, 0x0023, 0x0024, 0x0025, 0x0026, 0x0027, 0x0028, 0x0029,
    0x002a, 0x002b, 0x002c, 0x022d, 0x032d, 0x042d, 0x052d, 0x062d,
    0x072d, 0x082d, 0x092d, 0x0a2d, 0x0b2d, 0x0c2d, 0x0d2d, 0x0e2d,
    0x0f2d, 0x102d, 0x112d, 0x122d, 0x132d, 0x142d, 0x152d, 0x162d,
    0x172d, 0x182d, 0x192d, 0x1a2d, 0x1b2d, 0x1c2d, 0x1d2d, 0x1e2d,
    0x1f2d, 0x202d, 0x212d, 0x222d, 0x232d, 0x242d, 0x252d, 0x262d,
    0x272d, 0x282d, 0x292d, 0x2a2d, 0x2b2d, 0x2c2d, 0x2d2d, 0x2e2d,
    0x2f2d, 0x022e, 0x032e, 0x042e, 0x052e, 0x062e, 0x072e, 0x082e,
    0x092e, 0x0a2e, 0x0b2e, 0x0c2e, 0x0d2e, 0x0e2e, 0x0f2e, 0x102e,
    0x112e, 0x122e, 0x132e, 0x142e, 0x152e, 0x162e, 0x172e, 0x182e,
    0x192e, 0x1a2e, 0x1b2e, 0x1c2e, 0x1d2e, 0x1e2e, 0x1f2e, 0x202e,
    0x212e, 0x222e, 0x232e, 0x242e, 0x252e, 0x262e, 0x272e, 0x282e,
    0x292e, 0x2a2e, 0x2b2e, 0x2c2e, 0x2d2e, 0x2e2e, 0x2f2e, 0x022f,
    0x032f, 0x042f, 0x052f, 0x062f, 0x072f, 0x082f, 0x092f, 0x0a2f,
    0x0b2f, 0x0c2f, 0x0d2f, 0x0e2f, 0x0f2f, 0x102f, 0x112f, 0x122f,
    0x132f, 0x142f, 0x152f, 0x162f, 0x172f, 0x182f, 0x192f, 0x1a2f,
    0x1b2f, 0x1c2f, 0x1d2f, 0x1e2f, 0x1f2f, 0x202f, 0x212f, 0x222f,
    0x232f, 0x242f, 0x252f, 0x262f, 0x272f, 0x282f, 0x292f, 0x2a2f,
];

////////////////////////////////////////////////////////////////////////
// LOOKUP KEYS                                                        //
////////////////////////////////////////////////////////////////////////

/// A trie lookup key: the shift sequence for one domain name.
///
/// Keys are ephemeral. They live on the stack for the duration of a
/// single trie operation and are rebuilt from the leaf's name whenever
/// an operation needs to compare against an existing entry.
pub(super) struct LookupKey {
    len: usize,
    shifts: [u8; MAX_KEY_LEN],
}

impl LookupKey {
    /// Converts a domain name into a lookup key. Names do not need to
    /// be normalized to lowercase; the translation table folds case.
    pub(super) fn from_name(name: &Name) -> Self {
        let mut shifts = [0; MAX_KEY_LEN];
        let mut off = 0;
        // Work from the top-level label toward the leftmost label,
        // skipping the root label.
        for label in name.labels().rev().skip(1) {
            for &octet in label.octets() {
                let bits = BYTE_TO_SHIFTS[octet as usize];
                shifts[off] = bits as u8;
                off += 1;
                if bits >> 8 != 0 {
                    shifts[off] = (bits >> 8) as u8;
                    off += 1;
                }
            }
            shifts[off] = SHIFT_NOBYTE;
            off += 1;
        }
        // The terminator is a double NOBYTE; it is not counted in the
        // key length.
        shifts[off] = SHIFT_NOBYTE;
        LookupKey { len: off, shifts }
    }

    /// The number of shifts in the key, not counting the terminator.
    pub(super) fn len(&self) -> usize {
        self.len
    }

    /// The shift at position `off`. Positions past the end of the key
    /// read as [`SHIFT_NOBYTE`], matching the implicit infinite
    /// terminator.
    pub(super) fn shift(&self, off: usize) -> u8 {
        if off <= self.len {
            self.shifts[off]
        } else {
            SHIFT_NOBYTE
        }
    }

    /// Finds the first position at which two keys differ, or [`None`]
    /// if they are the same key. Two distinct names always differ at a
    /// position no later than the shorter key's terminator, so it
    /// suffices to scan through `self`'s terminator.
    pub(super) fn divergence(&self, other: &LookupKey) -> Option<usize> {
        (0..=self.len).find(|&off| self.shift(off) != other.shift(off))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> LookupKey {
        LookupKey::from_name(&text.parse().unwrap())
    }

    fn shifts(key: &LookupKey) -> &[u8] {
        &key.shifts[..key.len + 1]
    }

    #[test]
    fn common_characters_become_single_shifts() {
        let k = key("example.test.");
        assert_eq!(
            shifts(&k),
            &[
                0x26, 0x17, 0x25, 0x26, 1, // "test" then a label boundary
                0x17, 0x2a, 0x13, 0x1f, 0x22, 0x1e, 0x17, 1, // "example"
                1, // terminator
            ],
        );
        assert_eq!(k.len(), 13);
    }

    #[test]
    fn unusual_characters_become_escape_pairs() {
        let k = key("\\000.");
        assert_eq!(shifts(&k), &[0x02, 0x02, 1, 1]);
        let k = key("\\255.");
        assert_eq!(shifts(&k), &[0x2f, 0x2a, 1, 1]);
    }

    #[test]
    fn case_is_folded() {
        let upper = key("EXAMPLE.TEST.");
        let lower = key("example.test.");
        assert_eq!(shifts(&upper), shifts(&lower));
    }

    #[test]
    fn root_key_is_empty() {
        let k = key(".");
        assert_eq!(k.len(), 0);
        assert_eq!(k.shift(0), SHIFT_NOBYTE);
        assert_eq!(k.shift(100), SHIFT_NOBYTE);
    }

    #[test]
    fn divergence_finds_the_first_difference() {
        let a = key("a.example.");
        let b = key("b.example.");
        // The keys agree through "example" and its label boundary
        // (8 shifts) and differ at the first octet of the last label.
        assert_eq!(a.divergence(&b), Some(8));
        assert_eq!(a.divergence(&a), None);
    }

    #[test]
    fn shorter_name_diverges_at_its_terminator() {
        let short = key("b.");
        let long = key("a.b.");
        assert_eq!(short.divergence(&long), Some(2));
        assert_eq!(long.divergence(&short), Some(2));
    }

    #[test]
    fn key_order_matches_canonical_name_order() {
        // A canonically ordered list mixing case, escapes, label
        // structure, and the RFC 4034 § 6.1 example.
        let ordered = [
            ".",
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "\\001.z.example.",
            "*.z.example.",
            "\\200.z.example.",
            "za.example.",
            "exbmple.",
        ];
        for (i, a) in ordered.iter().enumerate() {
            for (j, b) in ordered.iter().enumerate() {
                let (ka, kb) = (key(a), key(b));
                let key_cmp = shifts(&ka).cmp(shifts(&kb));
                assert_eq!(
                    key_cmp,
                    i.cmp(&j),
                    "key order for {a} vs {b} does not match name order",
                );
            }
        }
    }

    #[test]
    fn maximum_length_name_fits() {
        // A 255-octet name whose labels consist entirely of escaped
        // octets produces the longest possible key.
        let mut octets = Vec::new();
        for _ in 0..3 {
            octets.push(63);
            octets.extend_from_slice(&[0xffu8; 63]);
        }
        octets.push(61);
        octets.extend_from_slice(&[0xffu8; 61]);
        octets.push(0);
        let name = Name::try_from_uncompressed_all(&octets).unwrap();
        assert_eq!(name.wire_repr().len(), 255);
        let k = LookupKey::from_name(&name);
        assert!(k.len() < MAX_KEY_LEN);
    }
}
