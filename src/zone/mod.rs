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

//! Zone data: provider entries, their resolution, and the
//! [`ZoneTable`] built from them.
//!
//! Zone data arrives from the provider as a JSON list of entries (see
//! [`parse_entries`]). Pointer entries are resolved to addresses with
//! [`resolve_pointers`], and the result is handed to
//! [`ZoneTable::build`]. Additional records of any kind can be placed
//! in a table through a [`ZoneTableBuilder`].

mod entry;
mod error;
mod pointer;
mod table;
pub use entry::{parse_entries, EntryKind, ZoneEntry};
pub use error::Error;
pub use pointer::{resolve_pointers, HostResolver, SystemHostResolver};
pub use table::{Zone, ZoneTable, ZoneTableBuilder};
