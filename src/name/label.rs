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

//! Implementation of the [`Label`] type.

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{Error, MAX_LABEL_LEN};

////////////////////////////////////////////////////////////////////////
// LABELS                                                             //
////////////////////////////////////////////////////////////////////////

/// The label given to a node in the Domain Name System's tree
/// structure.
///
/// `Label` is essentially a wrapper over `[u8]` that can only be
/// constructed if the slice is a valid DNS label (that is, if it is no
/// more than 63 octets long).
///
/// Note that in accordance with [RFC 1034 § 3.1]:
///
/// * comparisons between `Label`s are case-insensitive assuming ASCII,
///   but
/// * case is preserved in the internal representation.
///
/// The ordering of `Label`s follows the DNSSEC canonical ordering of
/// domain names ([RFC 4034 § 6.1]): octets are compared as unsigned
/// values with ASCII letters folded to lowercase, and a label that is
/// a proper prefix of another sorts first.
///
/// [RFC 1034 § 3.1]: https://tools.ietf.org/html/rfc1034#section-3.1
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
#[repr(transparent)]
pub struct Label {
    octets: [u8],
}

#[allow(clippy::len_without_is_empty)] // Following DNS terminology, we have is_null().
impl Label {
    /// Wraps up a `&[u8]` as a `Label` without checking its length for
    /// validity. To be used only within the parent module, and only
    /// after performing the length check manually.
    pub(super) fn from_unchecked(octets: &[u8]) -> &Self {
        unsafe { &*(octets as *const [u8] as *const Label) }
    }

    /// Returns whether this `Label` is the null (zero-length) label.
    pub fn is_null(&self) -> bool {
        self.octets.is_empty()
    }

    /// Returns the number of octets in this `Label`.
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns the null (zero-length) `Label`.
    pub fn null() -> &'static Self {
        Self::from_unchecked(&[])
    }

    /// Returns the octets of this `Label`.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }
}

impl<'a> TryFrom<&'a [u8]> for &'a Label {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self, Self::Error> {
        if octets.len() > MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else {
            Ok(Label::from_unchecked(octets))
        }
    }
}

/// Infallible conversion from byte arrays. Arrays longer than 63 octets
/// are not valid labels, so this panics for them; the bound cannot
/// currently be expressed in the type system.
impl<'a, const N: usize> From<&'a [u8; N]> for &'a Label {
    fn from(octets: &'a [u8; N]) -> Self {
        assert!(N <= MAX_LABEL_LEN);
        Label::from_unchecked(octets)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        let own = self.octets.iter().map(u8::to_ascii_lowercase);
        let others = other.octets.iter().map(u8::to_ascii_lowercase);
        own.cmp(others)
    }
}

/// The [`Hash`] implementation folds ASCII letters to lowercase so that
/// it is consistent with the case-insensitive [`PartialEq`]
/// implementation.
impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.octets.len());
        for octet in &self.octets {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

/// Displays the `Label` in presentation format. The characters `.` and
/// `\` are escaped with a backslash, and octets outside the printable
/// ASCII range are written as `\DDD` escapes ([RFC 4343 § 2.1]).
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &octet in &self.octets {
            if octet == b'.' || octet == b'\\' {
                write!(f, "\\{}", octet as char)?;
            } else if (0x21..=0x7e).contains(&octet) {
                write!(f, "{}", octet as char)?;
            } else {
                write!(f, "\\{:03}", octet)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;
    use std::convert::TryFrom;

    use super::Label;
    use crate::name::Error;

    #[test]
    fn try_from_rejects_long_slices() {
        let too_long = [b'x'; 64];
        assert_eq!(<&Label>::try_from(&too_long[..]), Err(Error::LabelTooLong));
        assert!(<&Label>::try_from(&too_long[..63]).is_ok());
    }

    #[test]
    fn eq_is_case_insensitive() {
        let upper: &Label = b"EXAMPLE".into();
        let lower: &Label = b"example".into();
        let other: &Label = b"examples".into();
        assert_eq!(upper, lower);
        assert_ne!(lower, other);
    }

    #[test]
    fn cmp_implements_canonical_ordering() {
        // From the RFC 4034 § 6.1 example ordering: Z sorts between
        // yljkjljk and zABC once case is folded.
        let a: &Label = b"yljkjljk".into();
        let b: &Label = b"Z".into();
        let c: &Label = b"zABC".into();
        assert_eq!(a.cmp(b), Ordering::Less);
        assert_eq!(b.cmp(c), Ordering::Less);

        // A proper prefix sorts first.
        let short: &Label = b"ab".into();
        let long: &Label = b"aba".into();
        assert_eq!(short.cmp(long), Ordering::Less);
    }

    #[test]
    fn display_escapes() {
        let plain: &Label = b"example".into();
        assert_eq!(plain.to_string(), "example");
        let tricky: &Label = b"a.b\\c".into();
        assert_eq!(tricky.to_string(), "a\\.b\\\\c");
        let unprintable: &Label = b"\x00\x7f".into();
        assert_eq!(unprintable.to_string(), "\\000\\127");
    }

    #[test]
    fn null_label_is_null() {
        assert!(Label::null().is_null());
        assert_eq!(Label::null().len(), 0);
    }
}
