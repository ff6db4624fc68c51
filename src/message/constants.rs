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

//! Layout of the DNS message header.

/// The length of the fixed header that starts every message.
pub const HEADER_SIZE: usize = 12;

// Offsets of the 16-bit header fields.
pub const ID_OFFSET: usize = 0;
pub const QDCOUNT_OFFSET: usize = 4;
pub const ANCOUNT_OFFSET: usize = 6;
pub const NSCOUNT_OFFSET: usize = 8;
pub const ARCOUNT_OFFSET: usize = 10;

// The opcode and RCODE share header octets with the flags.
pub const OPCODE_OCTET: usize = 2;
pub const OPCODE_MASK: u8 = 0x78;
pub const OPCODE_SHIFT: usize = 3;
pub const RCODE_OCTET: usize = 3;
pub const RCODE_MASK: u8 = 0x0f;

/// The largest message offset a compression pointer can hold.
pub const POINTER_MAX: usize = 0x3fff;

/// A single-bit header flag.
#[derive(Clone, Copy, Debug)]
pub struct Flag {
    octet: usize,
    mask: u8,
}

impl Flag {
    /// Reads the flag from `header`, which must be at least
    /// [`HEADER_SIZE`] octets long.
    pub fn get(self, header: &[u8]) -> bool {
        header[self.octet] & self.mask != 0
    }

    /// Sets or clears the flag in `header`, which must be at least
    /// [`HEADER_SIZE`] octets long.
    pub fn set(self, header: &mut [u8], value: bool) {
        if value {
            header[self.octet] |= self.mask;
        } else {
            header[self.octet] &= !self.mask;
        }
    }
}

pub const QR: Flag = Flag {
    octet: 2,
    mask: 0x80,
};
pub const AA: Flag = Flag {
    octet: 2,
    mask: 0x04,
};
pub const TC: Flag = Flag {
    octet: 2,
    mask: 0x02,
};
pub const RD: Flag = Flag {
    octet: 2,
    mask: 0x01,
};
pub const RA: Flag = Flag {
    octet: 3,
    mask: 0x80,
};
