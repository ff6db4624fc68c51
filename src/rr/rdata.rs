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

//! Provides the [`Rdata`] enumeration of record payloads.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::{Kind, Soa};
use crate::name::Name;

/// The maximum length of a single <character-string>.
const MAX_CHARACTER_STRING_LEN: usize = 255;

////////////////////////////////////////////////////////////////////////
// RDATA                                                              //
////////////////////////////////////////////////////////////////////////

/// The payload of a record. There is one variant per [`Kind`], so the
/// kind of a record is always that of its payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rdata {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(Name),
    Mx { preference: u16, exchange: Name },
    Ns(Name),
    Soa(Soa),
    Txt(Text),
}

impl Rdata {
    pub fn kind(&self) -> Kind {
        match self {
            Self::A(_) => Kind::A,
            Self::Aaaa(_) => Kind::Aaaa,
            Self::Cname(_) => Kind::Cname,
            Self::Mx { .. } => Kind::Mx,
            Self::Ns(_) => Kind::Ns,
            Self::Soa(_) => Kind::Soa,
            Self::Txt(_) => Kind::Txt,
        }
    }
}

/// Displays the RDATA in zone-file presentation format.
impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::A(address) => address.fmt(f),
            Self::Aaaa(address) => address.fmt(f),
            Self::Cname(name) | Self::Ns(name) => name.fmt(f),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            Self::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname,
                soa.rname,
                soa.timers.serial,
                soa.timers.refresh,
                soa.timers.retry,
                soa.timers.expire,
                soa.timers.minimum,
            ),
            Self::Txt(text) => text.fmt(f),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TXT DATA                                                           //
////////////////////////////////////////////////////////////////////////

/// The text of a TXT record.
///
/// On the wire, TXT RDATA is a sequence of <character-string>s of at
/// most 255 octets each. Longer text is split across as many
/// <character-string>s as needed, and empty text is sent as a single
/// empty <character-string>.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Text(Box<[u8]>);

impl Text {
    pub fn octets(&self) -> &[u8] {
        &self.0
    }

    /// Returns the <character-string>s this text is sent as.
    pub fn character_strings(&self) -> impl Iterator<Item = &[u8]> {
        let empty: &[u8] = &[];
        self.0
            .chunks(MAX_CHARACTER_STRING_LEN)
            .chain(self.0.is_empty().then_some(empty))
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().into())
    }
}

impl From<Vec<u8>> for Text {
    fn from(octets: Vec<u8>) -> Self {
        Self(octets.into_boxed_slice())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, string) in self.character_strings().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str("\"")?;
            for &octet in string {
                match octet {
                    b'"' | b'\\' => write!(f, "\\{}", octet as char)?,
                    b' ' => f.write_str(" ")?,
                    _ if octet.is_ascii_graphic() => write!(f, "{}", octet as char)?,
                    _ => write!(f, "\\{:03}", octet)?,
                }
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::SoaDefaults;

    #[test]
    fn kind_follows_variant() {
        let ns = Rdata::Ns("ns1.insignia.live".parse().unwrap());
        assert_eq!(ns.kind(), Kind::Ns);
        assert_eq!(Rdata::Txt("hello".into()).kind(), Kind::Txt);
    }

    #[test]
    fn long_text_is_split() {
        let text = Text::from(vec![b'x'; 300]);
        let lengths: Vec<usize> = text.character_strings().map(<[u8]>::len).collect();
        assert_eq!(lengths, [255, 45]);
    }

    #[test]
    fn empty_text_is_one_empty_string() {
        let text = Text::from("");
        let empty: &[u8] = &[];
        assert_eq!(text.character_strings().collect::<Vec<_>>(), [empty]);
        assert_eq!(text.to_string(), "\"\"");
    }

    #[test]
    fn display_uses_presentation_format() {
        let mx = Rdata::Mx {
            preference: 10,
            exchange: "mail.insignia.live".parse().unwrap(),
        };
        assert_eq!(mx.to_string(), "10 mail.insignia.live.");

        let soa = Rdata::Soa(Soa {
            mname: "ns1.insignia.live".parse().unwrap(),
            rname: "hostmaster.insignia.live".parse().unwrap(),
            timers: SoaDefaults::with_serial(7).timers(),
        });
        assert_eq!(
            soa.to_string(),
            "ns1.insignia.live. hostmaster.insignia.live. 7 3600 10800 86400 3600"
        );

        let txt = Rdata::Txt("say \"hi\"".into());
        assert_eq!(txt.to_string(), "\"say \\\"hi\\\"\"");
    }
}
