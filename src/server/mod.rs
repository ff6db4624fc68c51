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

//! The processing logic of the DNS server.
//!
//! The [`Server`] structure is the heart of this module; see its
//! documentation for details.

use std::convert::TryFrom;
use std::net::{IpAddr, Ipv4Addr};

use log::debug;

use crate::message::{writer, Opcode, Question, Rcode, Reader, Writer};
use crate::resolver::Resolver;

mod query;

/// The maximum size of a DNS message sent over UDP without EDNS
/// ([RFC 1035 § 4.2.1]).
///
/// [RFC 1035 § 4.2.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.1
pub const UDP_PAYLOAD_SIZE: usize = 512;

////////////////////////////////////////////////////////////////////////
// SERVER PUBLIC API AND CORE MESSAGE-HANDLING LOGIC                  //
////////////////////////////////////////////////////////////////////////

/// A DNS server, abstracted from any underlying network I/O provider.
///
/// The [`Server`] structure turns one received DNS message into (at
/// most) one response through the [`Server::handle_message`] method.
/// An underlying network I/O provider is responsible for receiving
/// messages from the network and then sending the responses that the
/// [`Server`] produces.
///
/// Answers come from a [`Resolver`]. Every response that is sent
/// echoes the question, has the QR, AA, and RA bits set, and copies
/// the ID, opcode, and RD bit of the query.
pub struct Server {
    resolver: Resolver,
}

impl Server {
    /// Creates a new `Server` that will answer from `resolver`.
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Handles a received DNS message. This is the API through which
    /// I/O providers submit messages.
    ///
    /// `received_buf` contains the message received, and
    /// `received_info` provides additional information about it (see
    /// [`ReceivedInfo`]). `response_buf` is a buffer into which a
    /// response message may be serialized. For UDP transport it must be
    /// at least [`UDP_PAYLOAD_SIZE`] octets long, and for TCP transport
    /// it must be at least 65,535 octets long; otherwise this method
    /// will panic.
    ///
    /// A [`Response`] is returned, signifying whether a response is to
    /// be sent and, if so, how long the response message written into
    /// `response_buf` is.
    pub fn handle_message(
        &self,
        received_buf: &[u8],
        received_info: ReceivedInfo,
        response_buf: &mut [u8],
    ) -> Response {
        let response_size_limit = match received_info.transport {
            Transport::Tcp => u16::MAX as usize,
            Transport::Udp => UDP_PAYLOAD_SIZE,
        };
        if response_buf.len() < response_size_limit {
            panic!("the response buffer is not large enough");
        }

        // Ignore messages that do not contain a full DNS header, as
        // well as messages that are responses.
        let received = match Reader::try_from(received_buf) {
            Ok(r) if !r.qr() => r,
            _ => {
                debug!("Ignoring message from {}", received_info.source);
                return Response::None;
            }
        };

        // Start the response by copying information from the received
        // message. RA is set on every reply, even though we never
        // recurse; the clients we serve expect it.
        let mut response = match Writer::new(response_buf, response_size_limit) {
            Ok(w) => w,
            Err(_) => return Response::None,
        };
        response.set_id(received.id());
        response.set_qr(true);
        response.set_opcode(received.opcode());
        response.set_aa(true);
        response.set_ra(true);
        if received.opcode() == Opcode::QUERY {
            response.set_rd(received.rd());
        }

        let mut context = Context::new(received, received_info, response);
        self.handle_message_with_context(&mut context);

        if context.send_response {
            Response::Single(context.response.finish())
        } else {
            Response::None
        }
    }

    /// Handles a received DNS message once a [`Context`] has been
    /// constructed. This reads the question (if any) and then
    /// dispatches on the opcode.
    fn handle_message_with_context(&self, context: &mut Context) {
        // Most current implementations ignore messages with
        // QDCOUNT > 1, so we'll do the same.
        context.question = match context.received.qdcount() {
            0 => None,
            1 => match context.received.read_question() {
                Ok(question) => {
                    if context.response.add_question(&question).is_err() {
                        context.response.set_rcode(Rcode::SERVFAIL);
                        return;
                    }
                    Some(question)
                }
                Err(e) => {
                    debug!(
                        "Malformed question from {}: {}",
                        context.received_info.source, e
                    );
                    context.response.set_rcode(Rcode::FORMERR);
                    return;
                }
            },
            _ => {
                context.send_response = false;
                return;
            }
        };

        match context.received.opcode() {
            Opcode::QUERY => self.handle_query(context),
            _ => context.response.set_rcode(Rcode::NOTIMP),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// HELPER TYPES FOR SERVER PUBLIC API                                 //
////////////////////////////////////////////////////////////////////////

/// Information about a received DNS message.
#[derive(Clone, Copy, Debug)]
pub struct ReceivedInfo {
    source: IpAddr,
    transport: Transport,
}

impl ReceivedInfo {
    /// Creates a new `ReceivedInfo`. IPv4-mapped IPv6 source addresses
    /// are canonicalized to IPv4.
    pub fn new(source: IpAddr, transport: Transport) -> Self {
        let source = match source {
            IpAddr::V6(ipv6) => match ipv6.octets() {
                [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, a, b, c, d] => {
                    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
                }
                _ => source,
            },
            IpAddr::V4(_) => source,
        };
        Self { source, transport }
    }

    /// Returns the address the message came from.
    pub fn source(&self) -> IpAddr {
        self.source
    }
}

/// The transport over which a DNS message was received.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// The result of [`Server::handle_message`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Response {
    /// A response of the given length has been written and should be
    /// sent.
    Single(usize),

    /// No response should be sent.
    None,
}

////////////////////////////////////////////////////////////////////////
// MESSAGE-HANDLING CONTEXT                                           //
////////////////////////////////////////////////////////////////////////

/// State kept while handling a single received message.
struct Context<'b> {
    received: Reader<'b>,
    received_info: ReceivedInfo,
    question: Option<Question>,
    response: Writer<'b>,
    send_response: bool,
}

impl<'b> Context<'b> {
    fn new(received: Reader<'b>, received_info: ReceivedInfo, response: Writer<'b>) -> Self {
        Self {
            received,
            received_info,
            question: None,
            response,
            send_response: true,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error that stops answer processing.
#[derive(Debug, Eq, PartialEq)]
enum ProcessingError {
    ServFail,
    Truncation,
}

impl From<writer::Error> for ProcessingError {
    fn from(writer_error: writer::Error) -> Self {
        match writer_error {
            writer::Error::Truncation => Self::Truncation,
            _ => Self::ServFail,
        }
    }
}

type ProcessingResult<T> = Result<T, ProcessingError>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
