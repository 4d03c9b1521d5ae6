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

//! Implementation of the [`NameBuilder`] structure.

use std::convert::TryInto;

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// A facility to efficiently build [`Name`]s.
///
/// The `NameBuilder` constructs the on-the-wire representation and
/// label offset array for a [`Name`] using fixed-size internal buffers
/// that are long enough to accommodate any valid name. If the
/// `NameBuilder` is placed on the stack, then construction of a `Name`
/// (for instance, when parsing a textual representation) is fast,
/// requiring only one final heap allocation and copy when the name is
/// finished.
///
/// A new `NameBuilder` starts with a single null label. If the build is
/// finished at this point, the name of the DNS root is constructed.
/// Single octets can be added to the most recent label using
/// [`NameBuilder::try_push`]. A new label is started using
/// [`NameBuilder::next_label`]. If any call to these methods would
/// result in an invalid domain name, an error is returned. A `Name` is
/// finally constructed with the [`NameBuilder::finish`] method.
pub struct NameBuilder {
    wire_repr: ArrayVec<u8, MAX_WIRE_LEN>,
    label_offsets: ArrayVec<u8, MAX_N_LABELS>,
    label_start: usize,
    label_len: u8,
}

impl NameBuilder {
    /// Constructs a new `NameBuilder`, which initially contains a
    /// single null label.
    pub fn new() -> Self {
        Self {
            wire_repr: [0][..].try_into().unwrap(),
            label_offsets: [0][..].try_into().unwrap(),
            label_start: 0,
            label_len: 0,
        }
    }

    /// Determines whether the name currently stored in the
    /// `NameBuilder` is a fully qualified domain name—that is, whether
    /// it ends with the null label.
    pub fn is_fully_qualified(&self) -> bool {
        self.label_len == 0
    }

    /// Tries to add the given octet to the current label. This will
    /// fail if doing so would make the label or name too long. In the
    /// error case, the `NameBuilder`'s state remains unchanged.
    pub fn try_push(&mut self, octet: u8) -> Result<(), Error> {
        if self.label_len >= (MAX_LABEL_LEN as u8) {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_push(octet).is_ok() {
            self.label_len += 1;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Finishes the current label and starts a new one. If the current
    /// label is null, this fails, since only the last label in a domain
    /// name may be null. Likewise, if this makes the domain name too
    /// long, this fails. In the error case, the `NameBuilder`'s state
    /// remains unchanged.
    pub fn next_label(&mut self) -> Result<(), Error> {
        if self.is_fully_qualified() {
            Err(Error::NullNonTerminal)
        } else if self.wire_repr.is_full() {
            Err(Error::NameTooLong)
        } else {
            self.wire_repr[self.label_start] = self.label_len;
            self.label_start = self.wire_repr.len();
            self.label_len = 0;

            // The wire_repr push will not fail because we checked that
            // it is not full. The label_offsets push will not fail
            // because we're checking the validity of the name as we go;
            // in particular, if we reach this point, none of the
            // previous labels written is null. Therefore, we will not
            // have exceeded the maximum number of labels in a name.
            self.wire_repr.push(0);
            self.label_offsets.push(self.label_start as u8);
            Ok(())
        }
    }

    /// Finishes the construction of the domain name, returning the
    /// final [`Name`] and consuming the `NameBuilder`. Since the last
    /// label of a domain name must be null, this fails if that is not
    /// the case.
    pub fn finish(self) -> Result<Name, Error> {
        if !self.is_fully_qualified() {
            Err(Error::NonNullTerminal)
        } else {
            Ok(Name::from_parts(&self.label_offsets, &self.wire_repr))
        }
    }
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namebuilder_works() {
        let mut builder = NameBuilder::new();
        for c in b"example".iter() {
            builder.try_push(*c).unwrap();
        }
        builder.next_label().unwrap();
        for c in b"test".iter() {
            builder.try_push(*c).unwrap();
        }
        builder.next_label().unwrap();
        let name = builder.finish().unwrap();
        assert_eq!(name, "example.test.".parse().unwrap());
    }

    #[test]
    fn namebuilder_builds_the_root() {
        assert_eq!(NameBuilder::new().finish().unwrap(), Name::root());
    }

    #[test]
    fn finish_rejects_non_fqdn() {
        let mut builder = NameBuilder::new();
        builder.try_push(b'x').unwrap();
        assert_eq!(builder.finish(), Err(Error::NonNullTerminal));
    }

    #[test]
    fn is_fully_qualified_works() {
        let mut builder = NameBuilder::new();
        assert!(builder.is_fully_qualified());
        builder.try_push(b'x').unwrap();
        assert!(!builder.is_fully_qualified());
        builder.next_label().unwrap();
        assert!(builder.is_fully_qualified());
    }

    #[test]
    fn try_push_rejects_long_label() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_LABEL_LEN {
            builder.try_push(b'x').unwrap();
        }
        assert_eq!(builder.try_push(b'x'), Err(Error::LabelTooLong));
    }

    #[test]
    fn try_push_rejects_long_name() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_N_LABELS - 1 {
            builder.try_push(b'x').unwrap();
            builder.next_label().unwrap();
        }

        // We are now on the MAX_N_LABELS-th label. There is only space
        // for it to be the null label, so the next call should fail.
        assert_eq!(builder.try_push(b'x'), Err(Error::NameTooLong));
    }

    #[test]
    fn next_label_rejects_null_non_terminal() {
        let mut builder = NameBuilder::new();
        assert_eq!(builder.next_label(), Err(Error::NullNonTerminal));
    }

    #[test]
    fn next_label_rejects_long_name() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_N_LABELS - 2 {
            builder.try_push(b'x').unwrap();
            builder.next_label().unwrap();
        }

        // We now have three octets remaining (space for one label of
        // one character and the null label). So if we add a label of
        // length two, we won't be able to start a new label (no space
        // for its length octet).
        builder.try_push(b'x').unwrap();
        builder.try_push(b'x').unwrap();
        assert_eq!(builder.next_label(), Err(Error::NameTooLong));
    }
}
