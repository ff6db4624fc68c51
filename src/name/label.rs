// Copyright 2021 Matthew Ingwersen.
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

use std::fmt;
use std::hash::{Hash, Hasher};

use super::{Error, MAX_LABEL_LEN};

/// The label given to a node in the Domain Name System's tree
/// structure.
///
/// `Label` is a wrapper over `[u8]` that can only be constructed if the
/// slice is a valid DNS label (no more than 63 octets long). In
/// accordance with [RFC 1034 § 3.1], comparisons between `Label`s are
/// ASCII-case-insensitive, while case is preserved in the octets.
///
/// [RFC 1034 § 3.1]: https://tools.ietf.org/html/rfc1034#section-3.1
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
        // SAFETY: Label is a repr(transparent) wrapper around [u8].
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

/// Periods and backslashes are escaped with a backslash, and octets
/// that are not ASCII graphic characters are escaped `\xyz` (three
/// decimal digits), per RFC 1035 § 5.1 and RFC 4343 § 2.1.
impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &octet in self.octets() {
            match octet {
                b'.' => f.write_str("\\.")?,
                b'\\' => f.write_str("\\\\")?,
                _ if octet.is_ascii_graphic() => write!(f, "{}", octet as char)?,
                _ => write!(f, "\\{:03}", octet)?,
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

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.octets().eq_ignore_ascii_case(other.octets())
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with the case-insensitive PartialEq above.
        state.write_usize(self.len());
        for octet in self.octets() {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn label(octets: &[u8]) -> &Label {
        <&Label>::try_from(octets).unwrap()
    }

    fn hash_of(label: &Label) -> u64 {
        let mut hasher = DefaultHasher::new();
        label.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn try_from_rejects_long_labels() {
        let long = [b'x'; MAX_LABEL_LEN + 1];
        assert_eq!(
            <&Label>::try_from(&long[..]).map(Label::len),
            Err(Error::LabelTooLong)
        );
        assert_eq!(label(&long[..MAX_LABEL_LEN]).len(), MAX_LABEL_LEN);
    }

    #[test]
    fn eq_and_hash_ignore_case() {
        assert_eq!(label(b"XboxLive"), label(b"xboxlive"));
        assert_eq!(hash_of(label(b"XboxLive")), hash_of(label(b"xboxlive")));
        assert_ne!(label(b"xbox"), label(b"xboxlive"));
    }

    #[test]
    fn display_escapes_special_octets() {
        assert_eq!(label(b"a.b\\c\x07").to_string(), "a\\.b\\\\c\\007");
    }
}
