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

//! An authoritative DNS server for the Insignia network.
//!
//! Zone data is published by the Insignia service as a JSON list of
//! name-to-address entries. This crate turns that list into an
//! immutable [`ZoneTable`](zone::ZoneTable) and answers DNS queries
//! from it:
//!
//! * A query for a name in the table is answered with that name's
//!   records of the requested type (or all of them for `ANY`).
//! * Any other query is answered with the SOA record of the first zone,
//!   in table order, that the name falls under and that has one.
//! * Anything else gets an empty answer.
//!
//! The [`resolver`] module implements that lookup. The [`server`]
//! module wraps it in DNS message handling, and the [`io`] module
//! serves it over UDP and TCP.

pub mod io;
pub mod message;
pub mod name;
pub mod resolver;
pub mod rr;
pub mod server;
pub mod thread;
mod util;
pub mod zone;
