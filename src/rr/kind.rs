// Copyright 2022 Matthew Ingwersen.
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

//! Provides the [`Kind`] enumeration of the record types we serve.

use std::fmt;
use std::str::FromStr;

use super::Ttl;
use crate::util::Caseless;

////////////////////////////////////////////////////////////////////////
// RECORD KINDS                                                       //
////////////////////////////////////////////////////////////////////////

/// The RR types that records in a [`ZoneTable`](crate::zone::ZoneTable)
/// may have.
///
/// This is a closed set. Every kind has a fixed RR type code, which is
/// used both on the wire and to match incoming query types, and a fixed
/// payload shape (see [`Rdata`](super::Rdata)).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Soa,
    Txt,
}

impl Kind {
    /// All kinds, in RR type code order.
    pub const ALL: [Kind; 7] = [
        Kind::A,
        Kind::Ns,
        Kind::Cname,
        Kind::Soa,
        Kind::Mx,
        Kind::Txt,
        Kind::Aaaa,
    ];

    /// Returns the RR type code of this kind.
    pub const fn code(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Soa => 6,
            Self::Mx => 15,
            Self::Txt => 16,
            Self::Aaaa => 28,
        }
    }

    /// Returns the kind with the given RR type code, if we support it.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Returns the TTL that a record of this kind receives when none is
    /// given explicitly: one day for NS and SOA records, which change
    /// rarely, and five minutes for everything else.
    pub const fn default_ttl(self) -> Ttl {
        match self {
            Self::Ns | Self::Soa => Ttl::ONE_DAY,
            _ => Ttl::FIVE_MINUTES,
        }
    }

    /// Returns the mnemonic for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Mx => "MX",
            Self::Ns => "NS",
            Self::Soa => "SOA",
            Self::Txt => "TXT",
        }
    }
}

impl FromStr for Kind {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| Caseless(kind.as_str()) == Caseless(text))
            .ok_or("unsupported record type")
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(Kind::from_code(12), None);
    }

    #[test]
    fn default_ttls_follow_kind() {
        assert_eq!(u32::from(Kind::Ns.default_ttl()), 86400);
        assert_eq!(u32::from(Kind::Soa.default_ttl()), 86400);
        for kind in [Kind::A, Kind::Aaaa, Kind::Cname, Kind::Mx, Kind::Txt] {
            assert_eq!(u32::from(kind.default_ttl()), 300);
        }
    }

    #[test]
    fn parses_mnemonics_case_insensitively() {
        assert_eq!("aaaa".parse::<Kind>(), Ok(Kind::Aaaa));
        assert_eq!("Cname".parse::<Kind>(), Ok(Kind::Cname));
        assert!("PTR".parse::<Kind>().is_err());
    }
}
