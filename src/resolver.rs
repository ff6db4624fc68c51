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

//! Implementation of the [`Resolver`] structure.

use std::sync::Arc;

use crate::message::Qtype;
use crate::name::Name;
use crate::rr::Answer;
use crate::zone::ZoneTable;

/// Answers queries from a [`ZoneTable`].
///
/// Resolution is a pure function of the table and the query. The table
/// is shared read-only, so a `Resolver` may be used from any number of
/// threads at once.
#[derive(Clone, Debug)]
pub struct Resolver {
    table: Arc<ZoneTable>,
}

impl Resolver {
    pub fn new(table: Arc<ZoneTable>) -> Self {
        Self { table }
    }

    /// Resolves a query for `qname` and `qtype`.
    ///
    /// If a zone is named exactly `qname`, the answers are that zone's
    /// records that match `qtype`, in stored order, each owned by its
    /// override or else by `qname`. That may well be no answers at all.
    ///
    /// Otherwise the zones are scanned in construction order, and the
    /// first zone that `qname` falls under *and* that has an SOA record
    /// answers with that one SOA record, owned by the zone's name.
    /// Zones without an SOA record are passed over. Note that the first
    /// such zone wins, not the closest one: with `com` added before
    /// `example.com`, a query for `www.example.com` gets the SOA record
    /// of `com`.
    pub fn resolve<'a>(&'a self, qname: &'a Name, qtype: Qtype) -> Vec<Answer<'a>> {
        if let Some(zone) = self.table.get(qname) {
            return zone
                .records()
                .iter()
                .filter(|record| record.matches(qtype))
                .map(|record| record.to_answer(qname))
                .collect();
        }

        self.table
            .zones()
            .filter(|zone| qname.eq_or_subdomain_of(zone.name()))
            .find_map(|zone| zone.soa().map(|soa| soa.to_answer(zone.name())))
            .into_iter()
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Kind, Rdata, Record, SoaDefaults};
    use crate::zone::{ZoneEntry, ZoneTableBuilder};
    use std::net::Ipv4Addr;

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    fn a(address: [u8; 4]) -> Record {
        Record::new(Rdata::A(Ipv4Addr::from(address)), None)
    }

    fn soa(zone: &str) -> Record {
        Record::soa(
            name(&format!("ns1.{}", zone)),
            name(&format!("hostmaster.{}", zone)),
            &SoaDefaults::with_serial(1_600_000_000),
            None,
        )
    }

    fn resolver(zones: Vec<(&str, Vec<Record>)>) -> Resolver {
        let mut builder = ZoneTableBuilder::new();
        for (zone, records) in zones {
            for record in records {
                builder.add_record(name(zone), record);
            }
        }
        Resolver::new(Arc::new(builder.finish()))
    }

    fn kinds(answers: &[Answer]) -> Vec<Kind> {
        answers.iter().map(Answer::kind).collect()
    }

    #[test]
    fn exact_match_selects_only_requested_kind() {
        let resolver = resolver(vec![(
            "example.com",
            vec![a([192, 0, 2, 1]), Record::new(Rdata::Txt("hello".into()), None)],
        )]);
        let qname = name("example.com");

        let answers = resolver.resolve(&qname, Qtype::from(Kind::A));
        assert_eq!(kinds(&answers), [Kind::A]);
        assert_eq!(answers[0].rdata, &Rdata::A(Ipv4Addr::new(192, 0, 2, 1)));

        assert!(resolver.resolve(&qname, Qtype::from(Kind::Mx)).is_empty());
        assert!(resolver.resolve(&qname, Qtype::AXFR).is_empty());

        let answers = resolver.resolve(&qname, Qtype::ANY);
        assert_eq!(kinds(&answers), [Kind::A, Kind::Txt]);
    }

    #[test]
    fn exact_match_keeps_record_order() {
        let resolver = resolver(vec![(
            "example.com",
            vec![a([192, 0, 2, 2]), a([192, 0, 2, 1]), a([192, 0, 2, 3])],
        )]);
        let qname = name("example.com");
        let rendered: Vec<String> = resolver
            .resolve(&qname, Qtype::from(Kind::A))
            .iter()
            .map(|answer| answer.rdata.to_string())
            .collect();
        assert_eq!(rendered, ["192.0.2.2", "192.0.2.1", "192.0.2.3"]);
    }

    #[test]
    fn exact_match_answers_under_query_spelling() {
        let resolver = resolver(vec![("example.com", vec![a([192, 0, 2, 1])])]);
        let qname = name("EXAMPLE.com");
        let answers = resolver.resolve(&qname, Qtype::ANY);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].owner.to_string(), "EXAMPLE.com.");
    }

    #[test]
    fn exact_match_uses_owner_override() {
        let overridden = a([192, 0, 2, 1]).with_owner(name("other.example.com"));
        let resolver = resolver(vec![("example.com", vec![overridden])]);
        let qname = name("example.com");
        let answers = resolver.resolve(&qname, Qtype::ANY);
        assert_eq!(answers[0].owner, &name("other.example.com"));
    }

    #[test]
    fn exact_match_does_not_fall_back() {
        let resolver = resolver(vec![
            ("com", vec![soa("com")]),
            ("example.com", vec![a([192, 0, 2, 1])]),
        ]);
        let qname = name("example.com");
        assert!(resolver.resolve(&qname, Qtype::from(Kind::Mx)).is_empty());
    }

    #[test]
    fn fallback_uses_first_constructed_suffix_zone() {
        let resolver = resolver(vec![
            ("com", vec![soa("com")]),
            ("example.com", vec![a([192, 0, 2, 1]), soa("example.com")]),
        ]);
        let qname = name("www.example.com");
        let answers = resolver.resolve(&qname, Qtype::from(Kind::A));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].kind(), Kind::Soa);
        assert_eq!(answers[0].owner, &name("com"));
        assert_eq!(u32::from(answers[0].ttl), 86400);
        assert!(answers[0].rdata.to_string().starts_with("ns1.com. hostmaster.com. 1600000000 "));
    }

    #[test]
    fn fallback_uses_later_zone_when_it_comes_first() {
        let resolver = resolver(vec![
            ("example.com", vec![soa("example.com")]),
            ("com", vec![soa("com")]),
        ]);
        let qname = name("www.example.com");
        let answers = resolver.resolve(&qname, Qtype::ANY);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].owner, &name("example.com"));
    }

    #[test]
    fn fallback_skips_suffix_zone_without_soa() {
        let resolver = resolver(vec![
            ("net", vec![a([192, 0, 2, 1])]),
            ("example.net", vec![a([192, 0, 2, 2])]),
        ]);
        let qname = name("sub.net");
        assert!(resolver.resolve(&qname, Qtype::from(Kind::A)).is_empty());
    }

    #[test]
    fn fallback_continues_past_zone_without_soa() {
        let resolver = resolver(vec![
            ("example.net", vec![a([192, 0, 2, 2])]),
            ("net", vec![a([192, 0, 2, 1]), soa("net")]),
        ]);
        let qname = name("www.example.net");
        let answers = resolver.resolve(&qname, Qtype::from(Kind::A));
        assert_eq!(kinds(&answers), [Kind::Soa]);
        assert_eq!(answers[0].owner, &name("net"));
    }

    #[test]
    fn unrelated_name_gets_no_answers() {
        let resolver = resolver(vec![("com", vec![soa("com")])]);
        let qname = name("insignia.live");
        assert!(resolver.resolve(&qname, Qtype::ANY).is_empty());
    }

    #[test]
    fn resolution_is_repeatable() {
        let resolver = resolver(vec![
            ("com", vec![soa("com")]),
            ("example.com", vec![a([192, 0, 2, 1]), a([192, 0, 2, 2])]),
        ]);
        for qname in ["example.com", "www.example.com", "example.org"] {
            let qname = name(qname);
            let first = resolver.resolve(&qname, Qtype::ANY);
            let second = resolver.resolve(&qname, Qtype::ANY);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn resolves_tables_built_from_entries() {
        let table = ZoneTable::build([
            ZoneEntry::address("xboxlive.com", "10.0.0.1"),
            ZoneEntry::address("macs.part.xboxlive.com", "10.0.0.2"),
        ])
        .unwrap();
        let resolver = Resolver::new(Arc::new(table));
        let qname = name("macs.part.xboxlive.com");
        let answers = resolver.resolve(&qname, Qtype::from(Kind::A));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].to_string(), "macs.part.xboxlive.com. 300 IN A 10.0.0.2");

        let qname = name("tgs.part.xboxlive.com");
        assert!(resolver.resolve(&qname, Qtype::from(Kind::A)).is_empty());
    }
}
