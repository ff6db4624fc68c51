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

//! Resolution of pointer entries to addresses.

use std::io;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use log::debug;

use super::{EntryKind, Error, ZoneEntry};

/// Something that can look up the IPv4 address of a hostname.
pub trait HostResolver {
    fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr>;
}

/// A [`HostResolver`] that asks the operating system's resolver and
/// takes the first IPv4 address it returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHostResolver;

impl HostResolver for SystemHostResolver {
    fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr> {
        (host, 0)
            .to_socket_addrs()?
            .find_map(|address| match address.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no IPv4 address found"))
    }
}

/// Replaces the value of every pointer entry with the address its
/// target resolves to. Address entries pass through untouched, and
/// order is preserved. The first failure aborts the whole operation.
pub fn resolve_pointers<R>(entries: Vec<ZoneEntry>, resolver: &R) -> Result<Vec<ZoneEntry>, Error>
where
    R: HostResolver + ?Sized,
{
    entries
        .into_iter()
        .map(|entry| match entry.kind {
            EntryKind::Address => Ok(entry),
            EntryKind::Pointer => {
                let address = resolver.resolve_ipv4(&entry.value).map_err(|error| {
                    Error::Unresolvable {
                        name: entry.name.clone(),
                        host: entry.value.clone(),
                        error,
                    }
                })?;
                debug!("Resolved {} via {} to {}", entry.name, entry.value, address);
                Ok(ZoneEntry {
                    value: address.to_string(),
                    ..entry
                })
            }
        })
        .collect()
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
