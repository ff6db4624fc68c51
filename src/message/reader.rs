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

//! Implementation of the [`Reader`] type to read incoming DNS queries.

use std::convert::TryFrom;
use std::fmt;

use super::constants::*;
use super::{Opcode, Question, Rcode};
use crate::name::{self, Name};

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// reading the message data.
///
/// A `Reader` is constructed using its [`TryFrom`] implementation. Any
/// underlying buffer for a reader must contain at least a full DNS
/// message header of 12 octets; otherwise the construction will fail.
///
/// Header fields can be read at any time. Questions are read with
/// [`Reader::read_question`], which advances a cursor that starts at
/// the first octet after the header. We never need to read the
/// answer, authority, or additional sections of a query, so no method
/// is provided for them.
#[derive(Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        self.header_u16(ID_OFFSET)
    }

    /// Returns whether the QR (query response) bit is set.
    pub fn qr(&self) -> bool {
        QR.get(self.octets)
    }

    /// Returns the message's opcode.
    pub fn opcode(&self) -> Opcode {
        ((self.octets[OPCODE_OCTET] & OPCODE_MASK) >> OPCODE_SHIFT).into()
    }

    /// Returns whether the AA (authoritative answer) bit is set.
    pub fn aa(&self) -> bool {
        AA.get(self.octets)
    }

    /// Returns whether the TC (truncation) bit is set.
    pub fn tc(&self) -> bool {
        TC.get(self.octets)
    }

    /// Returns whether the RD (recursion desired) bit is set.
    pub fn rd(&self) -> bool {
        RD.get(self.octets)
    }

    /// Returns whether the RA (recursion available) bit is set.
    pub fn ra(&self) -> bool {
        RA.get(self.octets)
    }

    /// Returns the RCODE of the message.
    pub fn rcode(&self) -> Rcode {
        (self.octets[RCODE_OCTET] & RCODE_MASK).into()
    }

    /// Returns the number of questions in the message.
    pub fn qdcount(&self) -> u16 {
        self.header_u16(QDCOUNT_OFFSET)
    }

    /// Returns the number of answers in the message.
    pub fn ancount(&self) -> u16 {
        self.header_u16(ANCOUNT_OFFSET)
    }

    /// Returns the number of authority records in the message.
    pub fn nscount(&self) -> u16 {
        self.header_u16(NSCOUNT_OFFSET)
    }

    /// Returns the number of additional records in the message.
    pub fn arcount(&self) -> u16 {
        self.header_u16(ARCOUNT_OFFSET)
    }

    /// Reads a [`Question`] starting at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_question(&mut self) -> Result<Question> {
        let (qname, qname_len) =
            Name::try_from_compressed(self.octets, self.cursor).map_err(Error::InvalidQname)?;
        let qname_end = self.cursor + qname_len;
        let qtype = read_u16(self.octets, qname_end)?.into();
        let qclass = read_u16(self.octets, qname_end + 2)?.into();
        self.cursor = qname_end + 4;
        Ok(Question {
            qname,
            qtype,
            qclass,
        })
    }

    /// Returns whether the `Reader`'s cursor has reached the end of the
    /// message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }

    fn header_u16(&self, start: usize) -> u16 {
        u16::from_be_bytes([self.octets[start], self.octets[start + 1]])
    }
}

impl<'a> TryFrom<&'a [u8]> for Reader<'a> {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self> {
        if octets.len() >= HEADER_SIZE {
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
            })
        } else {
            Err(Error::HeaderTooShort)
        }
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("id", &self.id())
            .field("qr", &self.qr())
            .field("opcode", &self.opcode())
            .field("aa", &self.aa())
            .field("tc", &self.tc())
            .field("rd", &self.rd())
            .field("ra", &self.ra())
            .field("rcode", &self.rcode())
            .field("qdcount", &self.qdcount())
            .field("ancount", &self.ancount())
            .field("nscount", &self.nscount())
            .field("arcount", &self.arcount())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Reads a network-byte-order `u16` at index `start` of `octets`.
fn read_u16(octets: &[u8], start: usize) -> Result<u16> {
    match octets.get(start..start + 2) {
        Some(&[high, low]) => Ok(u16::from_be_bytes([high, low])),
        _ => Err(Error::UnexpectedEomInField),
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a DNS message or [`Question`] could not be
/// read.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    HeaderTooShort,
    UnexpectedEomInField,
    InvalidQname(name::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::HeaderTooShort => f.write_str("header too short"),
            Self::UnexpectedEomInField => f.write_str("unexpected end of message in field"),
            Self::InvalidQname(err) => write!(f, "invalid QNAME: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Reader`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::{Qclass, Qtype};
    use super::*;
    use crate::rr::Kind;

    /// A query for xboxlive.com. IN A with RD set, as sent by a stock
    /// resolver library.
    const XBOXLIVE_A_QUERY: &[u8] =
        b"\x4a\x21\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x08xboxlive\
          \x03com\x00\x00\x01\x00\x01";

    #[test]
    fn reader_works() {
        let mut reader = Reader::try_from(XBOXLIVE_A_QUERY).unwrap();

        assert_eq!(reader.id(), 0x4a21);
        assert!(!reader.qr());
        assert_eq!(reader.opcode(), Opcode::QUERY);
        assert!(!reader.aa());
        assert!(!reader.tc());
        assert!(reader.rd());
        assert!(!reader.ra());
        assert_eq!(reader.rcode(), Rcode::NOERROR);
        assert_eq!(reader.qdcount(), 1);
        assert_eq!(reader.ancount(), 0);
        assert_eq!(reader.nscount(), 0);
        assert_eq!(reader.arcount(), 0);

        let question = reader.read_question().unwrap();
        assert_eq!(question.qname, "xboxlive.com.".parse().unwrap());
        assert_eq!(question.qtype, Qtype::from(Kind::A));
        assert_eq!(question.qclass, Qclass::IN);
        assert!(reader.at_eom());
    }

    #[test]
    fn reader_constructor_rejects_short_message() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Reader::try_from(buf.as_slice()), Err(Error::HeaderTooShort));
        }
    }

    #[test]
    fn read_question_rejects_truncated_fields() {
        let truncated = &XBOXLIVE_A_QUERY[..XBOXLIVE_A_QUERY.len() - 1];
        let mut reader = Reader::try_from(truncated).unwrap();
        assert_eq!(reader.read_question(), Err(Error::UnexpectedEomInField));
        assert!(!reader.at_eom());

        let no_qtype = &XBOXLIVE_A_QUERY[..XBOXLIVE_A_QUERY.len() - 4];
        let mut reader = Reader::try_from(no_qtype).unwrap();
        assert_eq!(reader.read_question(), Err(Error::UnexpectedEomInField));
    }

    #[test]
    fn read_question_rejects_bad_qname() {
        let mut message = XBOXLIVE_A_QUERY[..HEADER_SIZE].to_vec();
        message.extend_from_slice(b"\x08xbox");
        let mut reader = Reader::try_from(message.as_slice()).unwrap();
        assert!(matches!(
            reader.read_question(),
            Err(Error::InvalidQname(_))
        ));
    }
}
