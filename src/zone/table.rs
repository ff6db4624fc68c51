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

//! Implementation of the [`ZoneTable`] structure.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::slice;

use super::{Error, ZoneEntry};
use crate::name::Name;
use crate::rr::{Rdata, Record};

////////////////////////////////////////////////////////////////////////
// ZONES                                                              //
////////////////////////////////////////////////////////////////////////

/// A domain name together with the records stored under it, in the
/// order they were added. A `Zone` in a [`ZoneTable`] always has at
/// least one record.
#[derive(Clone, Debug)]
pub struct Zone {
    name: Name,
    records: Vec<Record>,
}

impl Zone {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the first SOA record of the zone, if it has one.
    pub fn soa(&self) -> Option<&Record> {
        self.records.iter().find(|record| record.is_soa())
    }
}

////////////////////////////////////////////////////////////////////////
// ZONE TABLES                                                        //
////////////////////////////////////////////////////////////////////////

/// The immutable set of zones a server answers from.
///
/// Zones are kept in the order their names first appeared during
/// construction, and that order is significant: it decides which zone
/// provides the SOA record for names that have no zone of their own
/// (see [`Resolver`](crate::resolver::Resolver)). A name index sits
/// alongside the ordered list for exact lookups.
#[derive(Clone, Debug, Default)]
pub struct ZoneTable {
    zones: Vec<Zone>,
    index: HashMap<Name, usize>,
}

impl ZoneTable {
    /// Builds a table from provider entries, one A record per entry.
    /// Pointer entries must already have been resolved (see
    /// [`resolve_pointers`](super::resolve_pointers)). If any entry is
    /// invalid, no table is produced.
    pub fn build<I>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = ZoneEntry>,
    {
        let mut builder = ZoneTableBuilder::new();
        for entry in entries {
            builder.add_entry(&entry)?;
        }
        Ok(builder.finish())
    }

    /// Returns the zone named exactly `name`.
    pub fn get(&self, name: &Name) -> Option<&Zone> {
        self.index.get(name).map(|&i| &self.zones[i])
    }

    /// Iterates over the zones in construction order.
    pub fn zones(&self) -> slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Returns the total number of records across all zones.
    pub fn record_count(&self) -> usize {
        self.zones.iter().map(|zone| zone.records.len()).sum()
    }
}

////////////////////////////////////////////////////////////////////////
// ZONE TABLE CONSTRUCTION                                            //
////////////////////////////////////////////////////////////////////////

/// Accumulates records into a [`ZoneTable`].
///
/// Records added under a name that is already present are appended to
/// that zone; a new name starts a new zone at the end of the table.
#[derive(Default)]
pub struct ZoneTableBuilder {
    table: ZoneTable,
}

impl ZoneTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` to the zone `name`.
    pub fn add_record(&mut self, name: Name, record: Record) {
        let table = &mut self.table;
        match table.index.get(&name) {
            Some(&i) => table.zones[i].records.push(record),
            None => {
                table.index.insert(name.clone(), table.zones.len());
                table.zones.push(Zone {
                    name,
                    records: vec![record],
                });
            }
        }
    }

    /// Validates a resolved provider entry and appends the A record it
    /// describes.
    pub fn add_entry(&mut self, entry: &ZoneEntry) -> Result<(), Error> {
        let name: Name = entry.name.parse().map_err(|error| Error::InvalidName {
            name: entry.name.clone(),
            error,
        })?;
        let address: Ipv4Addr = entry.value.parse().map_err(|_| Error::InvalidAddress {
            name: entry.name.clone(),
            value: entry.value.clone(),
        })?;
        self.add_record(name, Record::new(Rdata::A(address), None));
        Ok(())
    }

    pub fn finish(self) -> ZoneTable {
        self.table
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
