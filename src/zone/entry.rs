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

//! Zone entries as published by the zone-data provider.

use serde::Deserialize;

use super::Error;

/// The two kinds of provider entry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
pub enum EntryKind {
    /// The value is a literal IPv4 address.
    #[serde(rename = "a")]
    Address,

    /// The value is a hostname whose IPv4 address the name should take.
    #[serde(rename = "p")]
    Pointer,
}

/// A single provider entry, mapping `name` to an IPv4 address either
/// directly or by way of another host.
///
/// In JSON, entries look like
/// `{"type": "a", "name": "xboxlive.com", "value": "10.0.0.1"}`.
/// Unknown fields are ignored.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
pub struct ZoneEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    pub value: String,
}

impl ZoneEntry {
    pub fn address(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Address,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn pointer(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Pointer,
            name: name.into(),
            value: host.into(),
        }
    }
}

/// Parses the provider's JSON entry list. Every entry must carry a
/// `type` of `"a"` or `"p"`, a `name`, and a `value`; otherwise the
/// whole list is rejected.
pub fn parse_entries(text: &str) -> Result<Vec<ZoneEntry>, Error> {
    Ok(serde_json::from_str(text)?)
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entries_accepts_both_kinds_in_order() {
        let text = r#"[
            {"type": "a", "name": "xboxlive.com", "value": "10.0.0.1"},
            {"type": "p", "name": "macs.part.xboxlive.com", "value": "macs.insig.uk", "note": "x"}
        ]"#;
        assert_eq!(
            parse_entries(text).unwrap(),
            [
                ZoneEntry::address("xboxlive.com", "10.0.0.1"),
                ZoneEntry::pointer("macs.part.xboxlive.com", "macs.insig.uk"),
            ]
        );
    }

    #[test]
    fn parse_entries_rejects_missing_fields() {
        let text = r#"[{"type": "a", "name": "xboxlive.com"}]"#;
        assert!(matches!(parse_entries(text), Err(Error::Syntax(_))));
    }

    #[test]
    fn parse_entries_rejects_unknown_kind() {
        let text = r#"[{"type": "x", "name": "xboxlive.com", "value": "10.0.0.1"}]"#;
        assert!(matches!(parse_entries(text), Err(Error::Syntax(_))));
    }

    #[test]
    fn parse_entries_rejects_non_json() {
        assert!(matches!(
            parse_entries("<html>Bad Gateway</html>"),
            Err(Error::Syntax(_))
        ));
    }
}
