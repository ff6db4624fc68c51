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

//! Handling of DNS QUERY messages.

use log::info;

use super::{Context, ProcessingError, ProcessingResult, Server, Transport};
use crate::message::{Question, Rcode, Writer};
use crate::rr::Answer;

impl Server {
    /// Handles a DNS message with opcode QUERY.
    pub(super) fn handle_query(&self, context: &mut Context) {
        // If there is no question, then that's a FORMERR.
        let question = match context.question {
            Some(ref q) => q,
            None => {
                context.response.set_rcode(Rcode::FORMERR);
                return;
            }
        };

        info!(
            "Received query from {}: {}",
            context.received_info.source, question
        );

        // Every record we hold is of class IN.
        if !question.qclass.includes_in() {
            context.response.set_rcode(Rcode::REFUSED);
            return;
        }

        let answers = self.resolver.resolve(&question.qname, question.qtype);
        log_answers(question, &answers);

        match add_answers(&mut context.response, &answers) {
            Ok(()) => (),
            Err(ProcessingError::ServFail) => {
                context.response.set_aa(false);
                context.response.set_rcode(Rcode::SERVFAIL);
                context.response.clear_answers();
            }
            Err(ProcessingError::Truncation) => {
                context.response.clear_answers();
                if context.received_info.transport == Transport::Tcp {
                    // We can't ask the client to retry over TCP, since
                    // we are already over TCP.
                    context.response.set_aa(false);
                    context.response.set_rcode(Rcode::SERVFAIL);
                } else {
                    context.response.set_tc(true);
                }
            }
        }
    }
}

fn add_answers(response: &mut Writer, answers: &[Answer]) -> ProcessingResult<()> {
    for answer in answers {
        response.add_answer(answer)?;
    }
    Ok(())
}

fn log_answers(question: &Question, answers: &[Answer]) {
    if answers.is_empty() {
        info!("No DNS match: {} {}", question.qname, question.qtype);
    }
    for answer in answers {
        info!("DNS match: {} > {}", question.qname, answer);
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use super::super::{ReceivedInfo, Response, UDP_PAYLOAD_SIZE};
    use super::*;
    use crate::message::{Opcode, Reader};
    use crate::name::Name;
    use crate::resolver::Resolver;
    use crate::rr::{Rdata, Record, SoaDefaults, Text};
    use crate::zone::ZoneTableBuilder;

    /// A query for xboxlive.com. IN A with RD set.
    const XBOXLIVE_A_QUERY: &[u8] =
        b"\x4a\x21\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x08xboxlive\
          \x03com\x00\x00\x01\x00\x01";

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    fn server(records: Vec<(&str, Record)>) -> Server {
        let mut builder = ZoneTableBuilder::new();
        for (owner, record) in records {
            builder.add_record(name(owner), record);
        }
        Server::new(Resolver::new(Arc::new(builder.finish())))
    }

    fn xboxlive_server() -> Server {
        let defaults = SoaDefaults::with_serial(1);
        server(vec![
            (
                "xboxlive.com",
                Record::new(Rdata::A(Ipv4Addr::new(10, 0, 0, 1)), None),
            ),
            (
                "live.com",
                Record::soa(name("ns1.live.com"), name("admin.live.com"), &defaults, None),
            ),
        ])
    }

    fn query(server: &Server, message: &[u8], transport: Transport) -> Option<Vec<u8>> {
        let mut buf = vec![0; u16::MAX as usize];
        let info = ReceivedInfo::new(Ipv4Addr::LOCALHOST.into(), transport);
        match server.handle_message(message, info, &mut buf) {
            Response::Single(len) => Some(buf[..len].to_vec()),
            Response::None => None,
        }
    }

    /// Replaces the QNAME of `XBOXLIVE_A_QUERY` and sets its QTYPE and
    /// QCLASS.
    fn make_query(qname: &str, qtype: u16, qclass: u16) -> Vec<u8> {
        let mut message = XBOXLIVE_A_QUERY[..12].to_vec();
        message.extend_from_slice(name(qname).wire_repr());
        message.extend_from_slice(&qtype.to_be_bytes());
        message.extend_from_slice(&qclass.to_be_bytes());
        message
    }

    #[test]
    fn exact_match_is_answered() {
        let response = query(&xboxlive_server(), XBOXLIVE_A_QUERY, Transport::Udp).unwrap();
        assert_eq!(
            response,
            b"\x4a\x21\x85\x80\x00\x01\x00\x01\x00\x00\x00\x00\
              \x08xboxlive\x03com\x00\x00\x01\x00\x01\
              \xc0\x0c\x00\x01\x00\x01\x00\x00\x01\x2c\x00\x04\x0a\x00\x00\x01"
        );
    }

    #[test]
    fn suffix_zone_soa_is_answered() {
        let message = make_query("Login.Live.com", 1, 1);
        let response = query(&xboxlive_server(), &message, Transport::Udp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NOERROR);
        assert!(reader.aa());
        assert_eq!(reader.ancount(), 1);

        // The SOA is owned by the zone as it was spelled when the table
        // was built. Only "com" matches the question's spelling, so only
        // that suffix is compressed.
        let qname_len = name("Login.Live.com").wire_repr().len();
        let answer_start = 12 + qname_len + 4;
        assert_eq!(
            &response[answer_start..answer_start + 15],
            b"\x04live\xc0\x17\x00\x06\x00\x01\x00\x01\x51\x80"
        );
    }

    #[test]
    fn no_match_is_empty_noerror() {
        let message = make_query("example.org", 1, 1);
        let response = query(&xboxlive_server(), &message, Transport::Udp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::NOERROR);
        assert!(reader.qr() && reader.aa() && reader.ra() && reader.rd());
        assert_eq!(reader.qdcount(), 1);
        assert_eq!(reader.ancount(), 0);
    }

    #[test]
    fn qclass_any_is_answered() {
        let message = make_query("xboxlive.com", 1, 255);
        let response = query(&xboxlive_server(), &message, Transport::Udp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.ancount(), 1);
    }

    #[test]
    fn qclass_chaos_is_refused() {
        let message = make_query("xboxlive.com", 1, 3);
        let response = query(&xboxlive_server(), &message, Transport::Udp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::REFUSED);
        assert_eq!(reader.ancount(), 0);
    }

    #[test]
    fn missing_question_is_formerr() {
        let message = b"\x4a\x21\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00";
        let response = query(&xboxlive_server(), message, Transport::Udp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::FORMERR);
        assert_eq!(reader.qdcount(), 0);
    }

    #[test]
    fn malformed_question_is_formerr() {
        let response = query(
            &xboxlive_server(),
            &XBOXLIVE_A_QUERY[..XBOXLIVE_A_QUERY.len() - 2],
            Transport::Udp,
        )
        .unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::FORMERR);
    }

    #[test]
    fn ignored_messages_get_no_response() {
        let server = xboxlive_server();

        // Too short to hold a header.
        assert_eq!(query(&server, &XBOXLIVE_A_QUERY[..11], Transport::Udp), None);

        // QR set.
        let mut response = XBOXLIVE_A_QUERY.to_vec();
        response[2] |= 0x80;
        assert_eq!(query(&server, &response, Transport::Udp), None);

        // QDCOUNT > 1.
        let mut two_questions = XBOXLIVE_A_QUERY.to_vec();
        two_questions[5] = 2;
        assert_eq!(query(&server, &two_questions, Transport::Udp), None);
    }

    #[test]
    fn other_opcodes_are_not_implemented() {
        let mut notify = XBOXLIVE_A_QUERY.to_vec();
        notify[2] = u8::from(Opcode::NOTIFY) << 3;
        let response = query(&xboxlive_server(), &notify, Transport::Udp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.opcode(), Opcode::NOTIFY);
        assert_eq!(reader.rcode(), Rcode::NOTIMP);
        assert!(!reader.rd());
    }

    #[test]
    fn oversized_udp_answer_sets_tc() {
        let long_text = Text::from(vec![b'x'; 600]);
        let server = server(vec![(
            "xboxlive.com",
            Record::new(Rdata::Txt(long_text), None),
        )]);
        let message = make_query("xboxlive.com", 16, 1);
        let response = query(&server, &message, Transport::Udp).unwrap();
        assert!(response.len() <= UDP_PAYLOAD_SIZE);
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert!(reader.tc());
        assert_eq!(reader.rcode(), Rcode::NOERROR);
        assert_eq!(reader.ancount(), 0);

        // The same answer fits over TCP.
        let response = query(&server, &message, Transport::Tcp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert!(!reader.tc());
        assert_eq!(reader.ancount(), 1);
    }

    #[test]
    fn oversized_tcp_answer_is_servfail() {
        let records: Vec<_> = (0..300)
            .map(|_| {
                let text = Text::from(vec![b'x'; 250]);
                ("xboxlive.com", Record::new(Rdata::Txt(text), None))
            })
            .collect();
        let server = server(records);
        let message = make_query("xboxlive.com", 16, 1);
        let response = query(&server, &message, Transport::Tcp).unwrap();
        let reader = Reader::try_from(response.as_slice()).unwrap();
        assert_eq!(reader.rcode(), Rcode::SERVFAIL);
        assert!(!reader.aa());
        assert_eq!(reader.ancount(), 0);
    }
}
