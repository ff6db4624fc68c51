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

//! Implementation of data structures related to domain names.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::ops::Index;
use std::str::FromStr;

mod builder;
mod error;
mod label;
mod wire;
use builder::NameBuilder;
pub use error::Error;
pub use label::Label;

/// The maximum number of labels in a domain name.
const MAX_N_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A structure to represent a domain name.
///
/// `Name`s can be constructed in several ways:
///
/// * through the [`FromStr`] implementation, which accepts both
///   fully-qualified (`xboxlive.com.`) and relative (`xboxlive.com`)
///   spellings and treats them identically; and
/// * from compressed on-the-wire names through
///   [`Name::try_from_compressed`].
///
/// Internally, a `Name` stores a single heap buffer holding, in order,
/// the offset of each label in the on-the-wire representation and then
/// the on-the-wire representation itself, as defined in
/// [RFC 1035 § 3.1]. This follows the layout used by the [NSD]
/// authoritative nameserver, and keeps a name to one allocation.
///
/// Comparisons between `Name`s are ASCII-case-insensitive, but case is
/// preserved, so that a reply can echo the query name exactly as the
/// client spelled it.
///
/// [NSD]: https://www.nlnetlabs.nl/projects/nsd/about/
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
#[derive(Clone)]
pub struct Name {
    n_labels: u8,
    data: Box<[u8]>,
}

/// Private helpers.
impl Name {
    /// Assembles a `Name` from label offsets and an on-the-wire
    /// representation. Callers within this module must have validated
    /// both.
    fn from_parts(label_offsets: &[u8], wire_repr: &[u8]) -> Self {
        let mut data = Vec::with_capacity(label_offsets.len() + wire_repr.len());
        data.extend_from_slice(label_offsets);
        data.extend_from_slice(wire_repr);
        Self {
            n_labels: label_offsets.len() as u8,
            data: data.into_boxed_slice(),
        }
    }

    /// Returns the offset of label `n` in the `Name`'s on-the-wire
    /// representation.
    fn label_offset(&self, n: usize) -> usize {
        self.label_offsets()[n] as usize
    }

    fn label_offsets(&self) -> &[u8] {
        &self.data[0..self.len()]
    }
}

////////////////////////////////////////////////////////////////////////
// NAME PUBLIC API                                                    //
////////////////////////////////////////////////////////////////////////

#[allow(clippy::len_without_is_empty)] // A domain name is never empty!
impl Name {
    /// Returns whether this `Name` is equal to or a subdomain of
    /// `other`. Put differently: whether the labels of `other` are a
    /// trailing subsequence of the labels of this `Name`.
    pub fn eq_or_subdomain_of(&self, other: &Name) -> bool {
        self.len() >= other.len()
            && self
                .labels()
                .rev()
                .zip(other.labels().rev())
                .all(|(a, b)| a == b)
    }

    /// Returns whether the `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.n_labels == 1
    }

    /// Returns an iterator over labels in this `Name`.
    pub fn labels(&self) -> Labels<'_> {
        Labels::new(self)
    }

    /// Returns the number of labels in this `Name`, including the null
    /// label.
    pub fn len(&self) -> usize {
        self.n_labels as usize
    }

    /// Returns a `Name` representing the DNS root, `.`.
    pub fn root() -> Self {
        Self::from_parts(&[0], &[0])
    }

    /// Tries to parse a compressed name present at index `start` of the
    /// provided buffer. Pointers are followed; indices given in
    /// pointers are treated as equivalent to indices in `octets` (so
    /// generally one will pass an entire DNS message in `octets`). On
    /// success, the new `Name` is returned along with the number of
    /// contiguous octets read at `start`, which is the number of octets
    /// to skip to reach the next field of the message.
    pub fn try_from_compressed(octets: &[u8], start: usize) -> Result<(Self, usize), Error> {
        wire::parse_compressed_name(octets, start)
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name`.
    pub fn wire_repr(&self) -> &[u8] {
        &self.data[self.len()..]
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name` starting with the `n`-th label. If `n == self.len()`,
    /// this returns an empty slice; if `n > self.len()`, this panics.
    pub fn wire_repr_from(&self, n: usize) -> &[u8] {
        if n == self.len() {
            &[]
        } else {
            &self.wire_repr()[self.label_offset(n)..]
        }
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// first `n` labels of the `Name`. This will panic if
    /// `n > self.len()`.
    pub fn wire_repr_to(&self, n: usize) -> &[u8] {
        if n == self.len() {
            self.wire_repr()
        } else {
            &self.wire_repr()[0..self.label_offset(n)]
        }
    }
}

impl Index<usize> for Name {
    type Output = Label;

    fn index(&self, index: usize) -> &Self::Output {
        let offset = self.label_offset(index);
        let len = self.wire_repr()[offset] as usize;
        let start = offset + 1;
        let end = start + len;
        Label::from_unchecked(&self.wire_repr()[start..end])
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels().filter(|label| !label.is_null()) {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.labels().zip(other.labels()).all(|(a, b)| a == b)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels() {
            label.hash(state);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A NAME'S LABELS                                     //
////////////////////////////////////////////////////////////////////////

/// An iterator over the [`Label`]s in a [`Name`].
///
/// To use this iterator, construct one from a [`Name`] using
/// [`Name::labels`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    name: &'a Name,
    front: usize,
    back: usize,
}

impl Labels<'_> {
    fn new(name: &Name) -> Labels<'_> {
        Labels {
            name,
            front: 0,
            back: name.len(),
        }
    }
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a Label;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            let this_one = self.front;
            self.front += 1;
            Some(&self.name[this_one])
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Labels<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back > self.front {
            self.back -= 1;
            Some(&self.name[self.back])
        } else {
            None
        }
    }
}

impl ExactSizeIterator for Labels<'_> {}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a [`Name`]. The passed
/// string must be strictly ASCII. Escape sequences as defined by
/// [RFC 4343 § 2.1] are supported.
///
/// Zone data handed to us by providers spells names without the
/// trailing dot, so a relative name is completed with the null label
/// rather than rejected.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Name::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut builder = NameBuilder::new();

        // NOTE: to check that the string is ASCII, it suffices to check
        // that each octet is ASCII as we go. This is because all
        // multi-byte characters start with an octet that is not ASCII.
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                builder.push_octet(value)?;
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                builder.end_label()?;
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                builder.push_octet(octet)?;
                remaining_octets = &remaining_octets[1..];
            }
        }

        if !builder.in_null_label() {
            builder.end_label()?;
        }
        builder.finish()
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    match remaining_octets {
        [] => Err(Error::InvalidEscape),
        [a, b, c, ..] if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() => {
            let value = [a, b, c]
                .iter()
                .fold(0usize, |acc, digit| 10 * acc + (**digit - b'0') as usize);
            u8::try_from(value)
                .map(|value| (value, 3))
                .or(Err(Error::InvalidEscape))
        }
        [first, ..] if first.is_ascii_digit() => Err(Error::InvalidEscape),
        [first, ..] => Ok((*first, 1)),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn root_has_expected_characteristics() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.len(), 1);
        assert_eq!(root.label_offsets(), &[0]);
        assert_eq!(root.wire_repr(), &[0]);
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn relative_and_fully_qualified_spellings_are_equal() {
        let relative: Name = "xboxlive.com".parse().unwrap();
        let absolute: Name = "xboxlive.com.".parse().unwrap();
        assert_eq!(relative, absolute);
        assert_eq!(relative.wire_repr(), b"\x08xboxlive\x03com\x00");
        assert_eq!(relative.to_string(), "xboxlive.com.");
    }

    #[test]
    fn comparison_ignores_case_but_preserves_it() {
        let upper: Name = "XBOXLIVE.Com".parse().unwrap();
        let lower: Name = "xboxlive.com".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "XBOXLIVE.Com.");

        let mut set = HashSet::new();
        set.insert(upper);
        assert!(set.contains(&lower));
    }

    #[test]
    fn labels_iterator_works() {
        let name: Name = "a.b.example.test.".parse().unwrap();
        let labels: Vec<&[u8]> = name.labels().map(Label::octets).collect();
        assert_eq!(labels, [&b"a"[..], b"b", b"example", b"test", b""]);
        assert_eq!(name.labels().rev().nth(1).map(Label::octets), Some(&b"test"[..]));
    }

    #[test]
    fn eq_or_subdomain_of_works() {
        let subdomain: Name = "subdomain.example.test.".parse().unwrap();
        let domain: Name = "example.test.".parse().unwrap();
        let tld: Name = "test.".parse().unwrap();
        let root = Name::root();
        assert!(subdomain.eq_or_subdomain_of(&subdomain));
        assert!(subdomain.eq_or_subdomain_of(&domain));
        assert!(subdomain.eq_or_subdomain_of(&tld));
        assert!(subdomain.eq_or_subdomain_of(&root));
        assert!(!domain.eq_or_subdomain_of(&subdomain));
        assert!(domain.eq_or_subdomain_of(&domain));
        assert!(!tld.eq_or_subdomain_of(&domain));
        assert!(!root.eq_or_subdomain_of(&tld));
        assert!(root.eq_or_subdomain_of(&root));

        let other_test: Name = "other.test.".parse().unwrap();
        let example_com: Name = "example.com.".parse().unwrap();
        assert!(!domain.eq_or_subdomain_of(&other_test));
        assert!(!domain.eq_or_subdomain_of(&example_com));
    }

    #[test]
    fn eq_or_subdomain_of_compares_whole_labels() {
        let name: Name = "myexample.test".parse().unwrap();
        let zone: Name = "example.test".parse().unwrap();
        assert!(!name.eq_or_subdomain_of(&zone));
    }

    #[test]
    fn wire_repr_from_and_to_work() {
        let name: Name = "a.bb.ccc.".parse().unwrap();
        assert_eq!(name.wire_repr_from(0), b"\x01a\x02bb\x03ccc\x00");
        assert_eq!(name.wire_repr_from(2), b"\x03ccc\x00");
        assert_eq!(name.wire_repr_from(4), b"");
        assert_eq!(name.wire_repr_to(0), b"");
        assert_eq!(name.wire_repr_to(2), b"\x01a\x02bb");
        assert_eq!(name.wire_repr_to(4), b"\x01a\x02bb\x03ccc\x00");
    }

    #[test]
    fn fromstr_rejects_empty() {
        assert_eq!("".parse::<Name>(), Err(Error::StrEmpty));
    }

    #[test]
    fn fromstr_rejects_non_ascii() {
        assert_eq!("✈.aero.".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_rejects_long_label() {
        assert_eq!(
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx.".parse::<Name>(),
            Err(Error::LabelTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_long_name() {
        let long = "x.".repeat(128);
        assert_eq!(long.parse::<Name>(), Err(Error::NameTooLong));
    }

    #[test]
    fn fromstr_rejects_null_non_terminal() {
        assert_eq!("a.b..c.".parse::<Name>(), Err(Error::NullNonTerminal));
        assert_eq!(".com".parse::<Name>(), Err(Error::NullNonTerminal));
    }

    #[test]
    fn fromstr_escaping_works() {
        let escaped: Name = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(escaped.wire_repr(), b"\x01\x00\x02\\.\x00");
        assert_eq!(escaped.to_string(), "\\000.\\\\\\..");
    }

    #[test]
    fn fromstr_rejects_invalid_escapes() {
        assert_eq!("\\00".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\00x.".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\256.".parse::<Name>(), Err(Error::InvalidEscape));
    }
}
