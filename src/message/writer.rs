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

//! Implementation of the [`Writer`] type to write on-the-wire DNS
//! responses.

use std::convert::TryFrom;
use std::fmt;

use arrayvec::ArrayVec;

use super::constants::*;
use super::{Opcode, Question, Rcode};
use crate::name::Name;
use crate::rr::{Answer, Rdata};

/// The CLASS value written for every answer. We only serve class IN.
const CLASS_IN: u16 = 1;

/// The maximum number of label positions a [`Writer`] remembers as
/// compression targets. Names written after the table fills up are
/// still compressed against earlier names; they just can't serve as
/// targets themselves.
const MAX_COMPRESSION_TARGETS: usize = 128;

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer that serializes a DNS response into it.
///
/// A `Writer` is constructed using [`Writer::new`] (to set a message
/// size limit different from the underlying buffer size) or with its
/// [`TryFrom`] implementation (which sets the limit equal to the buffer
/// length). The limit must be able to accommodate a full DNS message
/// header of 12 octets. The header is initially zeroed.
///
/// Header fields can be set at any time. The question must be added
/// with [`Writer::add_question`] before any answers are added with
/// [`Writer::add_answer`]; otherwise [`Error::OutOfOrder`] is returned.
/// Each addition is atomic: if there is not enough room before the
/// limit, [`Error::Truncation`] is returned and the message is left as
/// it was.
///
/// Domain names are compressed as described in [RFC 1035 § 4.1.4].
/// Compression is case-preserving: a suffix is only replaced by a
/// pointer to a prior occurrence spelled exactly the same way, so every
/// name reaches the client as it was given to the `Writer`.
///
/// [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4
pub struct Writer<'a> {
    octets: &'a mut [u8],
    cursor: usize,
    limit: usize,
    rr_start: usize,
    qdcount: u16,
    ancount: u16,
    targets: ArrayVec<u16, MAX_COMPRESSION_TARGETS>,
}

impl<'a> Writer<'a> {
    /// Creates a new `Writer` from the underlying buffer `octets`. The
    /// message size is limited to `limit` or `octets.len()` (whichever
    /// is smaller). If that is too small to hold a full DNS message
    /// header of 12 octets, then this will fail.
    pub fn new(octets: &'a mut [u8], limit: usize) -> Result<Self> {
        let limit = limit.min(octets.len());
        if limit < HEADER_SIZE {
            Err(Error::Truncation)
        } else {
            octets[0..HEADER_SIZE].fill(0);
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
                limit,
                rr_start: HEADER_SIZE,
                qdcount: 0,
                ancount: 0,
                targets: ArrayVec::new(),
            })
        }
    }

    /// Returns the current 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.octets[ID_OFFSET], self.octets[ID_OFFSET + 1]])
    }

    /// Sets the 16-bit ID of the message.
    pub fn set_id(&mut self, id: u16) {
        self.write(ID_OFFSET, &id.to_be_bytes());
    }

    /// Returns the current value of the QR (query response) bit.
    pub fn qr(&self) -> bool {
        QR.get(self.octets)
    }

    /// Sets or clears the QR (query response) bit.
    pub fn set_qr(&mut self, qr: bool) {
        QR.set(self.octets, qr);
    }

    /// Returns the message's current opcode.
    pub fn opcode(&self) -> Opcode {
        ((self.octets[OPCODE_OCTET] & OPCODE_MASK) >> OPCODE_SHIFT).into()
    }

    /// Sets the message's opcode.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.octets[OPCODE_OCTET] &= !OPCODE_MASK;
        self.octets[OPCODE_OCTET] |= (u8::from(opcode) << OPCODE_SHIFT) & OPCODE_MASK;
    }

    /// Returns the current value of the AA (authoritative answer) bit.
    pub fn aa(&self) -> bool {
        AA.get(self.octets)
    }

    /// Sets or clears the AA (authoritative answer) bit.
    pub fn set_aa(&mut self, aa: bool) {
        AA.set(self.octets, aa);
    }

    /// Returns the current value of the TC (truncation) bit.
    pub fn tc(&self) -> bool {
        TC.get(self.octets)
    }

    /// Sets or clears the TC (truncation) bit.
    pub fn set_tc(&mut self, tc: bool) {
        TC.set(self.octets, tc);
    }

    /// Returns the current value of the RD (recursion desired) bit.
    pub fn rd(&self) -> bool {
        RD.get(self.octets)
    }

    /// Sets or clears the RD (recursion desired) bit.
    pub fn set_rd(&mut self, rd: bool) {
        RD.set(self.octets, rd);
    }

    /// Returns the current value of the RA (recursion available) bit.
    pub fn ra(&self) -> bool {
        RA.get(self.octets)
    }

    /// Sets or clears the RA (recursion available) bit.
    pub fn set_ra(&mut self, ra: bool) {
        RA.set(self.octets, ra);
    }

    /// Returns the message's current RCODE.
    pub fn rcode(&self) -> Rcode {
        (self.octets[RCODE_OCTET] & RCODE_MASK).into()
    }

    /// Sets the message's RCODE.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.octets[RCODE_OCTET] &= !RCODE_MASK;
        self.octets[RCODE_OCTET] |= u8::from(rcode) & RCODE_MASK;
    }

    /// Returns the current number of questions in the message.
    pub fn qdcount(&self) -> u16 {
        self.qdcount
    }

    /// Returns the current number of answers in the message.
    pub fn ancount(&self) -> u16 {
        self.ancount
    }

    /// Adds a question to message. This must be used before any
    /// answers are added.
    pub fn add_question(&mut self, question: &Question) -> Result<()> {
        if self.ancount > 0 {
            Err(Error::OutOfOrder)
        } else if let Some(new_qdcount) = self.qdcount.checked_add(1) {
            self.with_rollback(|this| {
                this.write_name(&question.qname)?;
                this.try_push(&u16::from(question.qtype).to_be_bytes())?;
                this.try_push(&u16::from(question.qclass).to_be_bytes())
            })?;
            self.qdcount = new_qdcount;
            self.rr_start = self.cursor;
            Ok(())
        } else {
            Err(Error::CountOverflow)
        }
    }

    /// Adds an answer record (of class IN) to the message.
    pub fn add_answer(&mut self, answer: &Answer) -> Result<()> {
        let new_ancount = self.ancount.checked_add(1).ok_or(Error::CountOverflow)?;
        self.with_rollback(|this| {
            this.write_name(answer.owner)?;
            this.try_push(&answer.kind().code().to_be_bytes())?;
            this.try_push(&CLASS_IN.to_be_bytes())?;
            this.try_push(&u32::from(answer.ttl).to_be_bytes())?;

            // RDLENGTH depends on compression, so it is filled in after
            // the RDATA has been written.
            let rdlength_start = this.cursor;
            this.try_push(&[0, 0])?;
            this.write_rdata(answer.rdata)?;
            let rdlength = this.cursor - rdlength_start - 2;
            this.write(rdlength_start, &(rdlength as u16).to_be_bytes());
            Ok(())
        })?;
        self.ancount = new_ancount;
        Ok(())
    }

    /// Removes any answers previously added to the message, keeping the
    /// header and the question.
    pub fn clear_answers(&mut self) {
        self.ancount = 0;
        self.cursor = self.rr_start;
        let rr_start = self.rr_start;
        self.targets.retain(|target| (*target as usize) < rr_start);
    }

    /// Finishes writing the message. The final length of the message
    /// is returned.
    pub fn finish(mut self) -> usize {
        self.write(QDCOUNT_OFFSET, &self.qdcount.to_be_bytes());
        self.write(ANCOUNT_OFFSET, &self.ancount.to_be_bytes());
        self.write(NSCOUNT_OFFSET, &[0, 0]);
        self.write(ARCOUNT_OFFSET, &[0, 0]);
        self.cursor
    }

    /// Executes `f(self)`, returning the result and rolling back the
    /// cursor and compression state to the current values first if the
    /// result is an error.
    fn with_rollback<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_cursor = self.cursor;
        let saved_n_targets = self.targets.len();
        let result = f(self);
        if result.is_err() {
            self.cursor = saved_cursor;
            self.targets.truncate(saved_n_targets);
        }
        result
    }

    /// Writes the RDATA of an answer at the current cursor. Names in
    /// CNAME, MX, NS, and SOA RDATA are compressed (RFC 3597 § 4).
    fn write_rdata(&mut self, rdata: &Rdata) -> Result<()> {
        match rdata {
            Rdata::A(address) => self.try_push(&address.octets()),
            Rdata::Aaaa(address) => self.try_push(&address.octets()),
            Rdata::Cname(name) | Rdata::Ns(name) => self.write_name(name),
            Rdata::Mx {
                preference,
                exchange,
            } => {
                self.try_push(&preference.to_be_bytes())?;
                self.write_name(exchange)
            }
            Rdata::Soa(soa) => {
                self.write_name(&soa.mname)?;
                self.write_name(&soa.rname)?;
                let timers = soa.timers;
                for value in [
                    timers.serial,
                    timers.refresh,
                    timers.retry,
                    timers.expire,
                    timers.minimum,
                ] {
                    self.try_push(&value.to_be_bytes())?;
                }
                Ok(())
            }
            Rdata::Txt(text) => {
                for string in text.character_strings() {
                    self.try_push(&[string.len() as u8])?;
                    self.try_push(string)?;
                }
                Ok(())
            }
        }
    }

    /// Writes a domain name at the current cursor, replacing its
    /// longest suffix already present in the message with a pointer.
    fn write_name(&mut self, name: &Name) -> Result<()> {
        let start = self.cursor;

        // The null label is never worth a pointer.
        let n_labels = name.len() - 1;
        for i in 0..n_labels {
            if let Some(target) = self.find_target(name.wire_repr_from(i)) {
                self.try_push(name.wire_repr_to(i))?;
                self.try_push(&(0xc000 | target).to_be_bytes())?;
                self.remember_targets(start, name, i);
                return Ok(());
            }
        }

        self.try_push(name.wire_repr())?;
        self.remember_targets(start, name, n_labels);
        Ok(())
    }

    /// Looks for a remembered label position at which the message
    /// spells out `suffix` (an uncompressed on-the-wire name).
    fn find_target(&self, suffix: &[u8]) -> Option<u16> {
        self.targets
            .iter()
            .copied()
            .find(|target| self.spells_at(*target as usize, suffix))
    }

    /// Returns whether the (possibly compressed) name at `position`
    /// matches the uncompressed name `expected` exactly.
    fn spells_at(&self, mut position: usize, mut expected: &[u8]) -> bool {
        loop {
            let len = self.octets[position];
            if len & 0xc0 == 0xc0 {
                // The pointers we write always point backward, so this
                // cannot loop forever.
                position = (((len & 0x3f) as usize) << 8) | self.octets[position + 1] as usize;
                continue;
            }
            let label_end = position + 1 + len as usize;
            match expected.get(0..1 + len as usize) {
                Some(label) if label == &self.octets[position..label_end] => {
                    if len == 0 {
                        return expected.len() == 1;
                    }
                    expected = &expected[label.len()..];
                    position = label_end;
                }
                _ => return false,
            }
        }
    }

    /// Records the positions of the first `n` labels of `name`, just
    /// written at `start`, as compression targets.
    fn remember_targets(&mut self, start: usize, name: &Name, n: usize) {
        for i in 0..n {
            let position = start + name.wire_repr_to(i).len();
            if position > POINTER_MAX || self.targets.try_push(position as u16).is_err() {
                break;
            }
        }
    }

    /// Tries to write `data` to the underlying buffer at the current
    /// cursor, failing if there is not sufficient space.
    fn try_push(&mut self, data: &[u8]) -> Result<()> {
        if self.limit - self.cursor >= data.len() {
            self.write(self.cursor, data);
            self.cursor += data.len();
            Ok(())
        } else {
            Err(Error::Truncation)
        }
    }

    /// Writes `data` to the underlying buffer at `position`. Note that
    /// this performs no bounds checking.
    fn write(&mut self, position: usize, data: &[u8]) {
        self.octets[position..position + data.len()].copy_from_slice(data);
    }
}

impl<'a> TryFrom<&'a mut [u8]> for Writer<'a> {
    type Error = Error;

    fn try_from(octets: &'a mut [u8]) -> Result<Self> {
        let limit = octets.len();
        Self::new(octets, limit)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a [`Writer`] operation could not be
/// performed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// Adding the question or answer would overflow the corresponding
    /// 16-bit counter in the DNS header.
    CountOverflow,

    /// There is not enough room left before the size limit.
    Truncation,

    /// A question was added after an answer.
    OutOfOrder,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::CountOverflow => f.write_str("record count would overflow"),
            Self::Truncation => f.write_str("message would be truncated"),
            Self::OutOfOrder => f.write_str("question serialized after an answer"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Writer`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
