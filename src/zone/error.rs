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

//! Implementation of the [`Error`] type for zone-data errors.

use std::fmt;
use std::io;

use crate::name;

/// Errors that arise while turning provider zone data into a
/// [`ZoneTable`](super::ZoneTable). Any of these aborts construction of
/// the table.
#[derive(Debug)]
pub enum Error {
    /// The entry list was not a JSON array of `{type, name, value}`
    /// objects.
    Syntax(serde_json::Error),

    /// An entry's name is not a valid domain name.
    InvalidName { name: String, error: name::Error },

    /// An entry's value is not an IPv4 address. For pointer entries
    /// this means the pointer was never resolved.
    InvalidAddress { name: String, value: String },

    /// A pointer entry's target host could not be resolved to an IPv4
    /// address.
    Unresolvable {
        name: String,
        host: String,
        error: io::Error,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Syntax(_) => f.write_str("zone data is malformed"),
            Self::InvalidName { name, .. } => write!(f, "invalid domain name {:?}", name),
            Self::InvalidAddress { name, value } => {
                write!(f, "value {:?} for {} is not an IPv4 address", value, name)
            }
            Self::Unresolvable { name, host, .. } => {
                write!(f, "failed to resolve {} (target of {})", host, name)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax(error) => Some(error),
            Self::InvalidName { error, .. } => Some(error),
            Self::InvalidAddress { .. } => None,
            Self::Unresolvable { error, .. } => Some(error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Syntax(error)
    }
}
