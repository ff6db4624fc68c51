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

//! SOA timer fields and their synthesized defaults.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::name::Name;

/// The RDATA of an SOA record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Soa {
    pub mname: Name,
    pub rname: Name,
    pub timers: SoaTimers,
}

/// The five 32-bit integer fields that trail an SOA record's names.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SoaTimers {
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// The values given to SOA records that are configured with only their
/// MNAME and RNAME.
///
/// The serial is the number of whole seconds between the Unix epoch and
/// server startup, so every SOA record synthesized during one run
/// shares it and it increases on every restart. The instant is passed
/// in rather than read here so that tables can be built with a fixed
/// clock.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SoaDefaults {
    serial: u32,
}

impl SoaDefaults {
    pub const REFRESH: u32 = 3600;
    pub const RETRY: u32 = 10800;
    pub const EXPIRE: u32 = 86400;
    pub const MINIMUM: u32 = 3600;

    /// Derives the defaults from the instant the server started. An
    /// instant before the epoch yields serial zero.
    pub fn from_start_time(start: SystemTime) -> Self {
        let seconds = start
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());

        // Serial numbers use RFC 1982 arithmetic, so wrapping is fine.
        Self::with_serial(seconds as u32)
    }

    pub const fn with_serial(serial: u32) -> Self {
        Self { serial }
    }

    pub const fn serial(&self) -> u32 {
        self.serial
    }

    pub const fn timers(&self) -> SoaTimers {
        SoaTimers {
            serial: self.serial,
            refresh: Self::REFRESH,
            retry: Self::RETRY,
            expire: Self::EXPIRE,
            minimum: Self::MINIMUM,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
