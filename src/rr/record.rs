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

//! Provides the [`Record`] and [`Answer`] structures.

use std::fmt;

use super::{Kind, Rdata, Soa, SoaDefaults, Ttl};
use crate::message::Qtype;
use crate::name::Name;

////////////////////////////////////////////////////////////////////////
// RECORDS                                                            //
////////////////////////////////////////////////////////////////////////

/// One authoritative record stored under a zone name.
///
/// A `Record` does not carry its own owner name unless it was given an
/// override; it answers under whatever name the caller supplies to
/// [`Record::to_answer`]. The TTL is settled when the record is
/// constructed and never changes afterward.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    owner: Option<Name>,
    ttl: Ttl,
    rdata: Rdata,
}

impl Record {
    /// Creates a new `Record`. When `ttl` is `None`, the default for the
    /// RDATA's kind is used (see [`Kind::default_ttl`]).
    pub fn new(rdata: Rdata, ttl: Option<Ttl>) -> Self {
        let ttl = ttl.unwrap_or_else(|| rdata.kind().default_ttl());
        Self {
            owner: None,
            ttl,
            rdata,
        }
    }

    /// Creates an SOA `Record` from just its MNAME and RNAME, filling in
    /// the serial and timers from `defaults`.
    pub fn soa(mname: Name, rname: Name, defaults: &SoaDefaults, ttl: Option<Ttl>) -> Self {
        let soa = Soa {
            mname,
            rname,
            timers: defaults.timers(),
        };
        Self::new(Rdata::Soa(soa), ttl)
    }

    /// Makes the record answer under `owner` instead of the name it is
    /// looked up by.
    pub fn with_owner(mut self, owner: Name) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn kind(&self) -> Kind {
        self.rdata.kind()
    }

    pub fn owner(&self) -> Option<&Name> {
        self.owner.as_ref()
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn rdata(&self) -> &Rdata {
        &self.rdata
    }

    /// Returns whether this record applies to a query of type `qtype`:
    /// either the query asks for `ANY` or for exactly this record's
    /// kind.
    pub fn matches(&self, qtype: Qtype) -> bool {
        qtype == Qtype::ANY || qtype == Qtype::from(self.kind())
    }

    pub fn is_soa(&self) -> bool {
        self.kind() == Kind::Soa
    }

    /// Produces the answer RR for this record, owned by the override if
    /// there is one and by `name` otherwise.
    pub fn to_answer<'a>(&'a self, name: &'a Name) -> Answer<'a> {
        Answer {
            owner: self.owner.as_ref().unwrap_or(name),
            ttl: self.ttl,
            rdata: &self.rdata,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.rdata)
    }
}

////////////////////////////////////////////////////////////////////////
// ANSWERS                                                            //
////////////////////////////////////////////////////////////////////////

/// A concrete resource record produced in response to a query. It
/// borrows from the [`Record`] it came from and from the name it is
/// owned by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Answer<'a> {
    pub owner: &'a Name,
    pub ttl: Ttl,
    pub rdata: &'a Rdata,
}

impl Answer<'_> {
    pub fn kind(&self) -> Kind {
        self.rdata.kind()
    }
}

/// Displays the answer as a zone-file line (the class is always IN).
impl fmt::Display for Answer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {}",
            self.owner,
            self.ttl,
            self.kind(),
            self.rdata
        )
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
