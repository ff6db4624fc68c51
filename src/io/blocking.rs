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

//! Implementation of the blocking I/O provider.

// NOTE: I/O errors generally end the task. For the TCP accept loop and
// the UDP workers, the thread is then respawned (after a delay if the
// last respawn was recent). For a TCP connection, the connection is
// closed. Failed UDP *sends* are only logged, so that we keep serving
// as long as receiving works.

use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, warn};

use super::socket::{TcpListener, SUPPORTS_POLL_ACCEPT};
use crate::server::{ReceivedInfo, Response, Server, Transport, UDP_PAYLOAD_SIZE};
use crate::thread::ThreadGroup;

/// A blocking I/O provider.
///
/// This provider serves UDP and TCP on the same address with blocking
/// socket calls. Each UDP worker thread runs its own receive/answer
/// loop on the shared socket. TCP listener threads accept connections
/// and hand each one to a one-shot thread of its own, up to a
/// configured number of simultaneous connections.
///
/// # Graceful shutdown
///
/// To stop the provider, shut down the [`ThreadGroup`] it was started
/// in (see [`BlockingIoProvider::start`]). Threads notice within about
/// a second. This needs `poll_accept` support from the target (see
/// [`super::socket`]), which
/// [`BlockingIoProvider::SUPPORTS_GRACEFUL_SHUTDOWN`] reports.
pub struct BlockingIoProvider {
    config: BlockingIoConfig,
    tcp_listener: Arc<TcpListener>,
    udp_socket: Arc<UdpSocket>,
}

/// Configuration options for the [`BlockingIoProvider`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockingIoConfig {
    /// The number of UDP worker threads.
    pub udp_workers: usize,

    /// The number of threads accepting TCP connections.
    pub tcp_listeners: usize,

    /// The maximum number of TCP connections served at once. Further
    /// connections are closed right after they are accepted.
    pub max_tcp_connections: usize,
}

impl Default for BlockingIoConfig {
    fn default() -> Self {
        Self {
            udp_workers: 2,
            tcp_listeners: 1,
            max_tcp_connections: 64,
        }
    }
}

impl BlockingIoProvider {
    /// Whether the `BlockingIoProvider` supports graceful shutdown on
    /// the target system.
    pub const SUPPORTS_GRACEFUL_SHUTDOWN: bool = SUPPORTS_POLL_ACCEPT;

    /// Creates a new `BlockingIoProvider`. This binds the UDP socket and
    /// then a TCP listener on the same address and port (so port 0
    /// yields one ephemeral port for both), but does not start serving.
    pub fn bind(config: BlockingIoConfig, addr: SocketAddr) -> io::Result<Self> {
        let udp_socket = UdpSocket::bind(addr)?;
        udp_socket.set_read_timeout(Some(CHECK_FOR_SHUTDOWN_TIMEOUT))?;
        let tcp_listener = TcpListener::bind(udp_socket.local_addr()?)?;
        Ok(Self {
            config,
            tcp_listener: Arc::new(tcp_listener),
            udp_socket: Arc::new(udp_socket),
        })
    }

    /// Returns the address the provider is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.udp_socket.local_addr()
    }

    /// Starts serving on the provided [`ThreadGroup`].
    pub fn start(
        self,
        server: &Arc<Server>,
        group: &Arc<ThreadGroup>,
    ) -> Result<(), crate::thread::Error> {
        let slots = Arc::new(ConnectionSlots::new(self.config.max_tcp_connections));
        for i in 0..self.config.tcp_listeners {
            let group_clone = group.clone();
            let server = server.clone();
            let listener = self.tcp_listener.clone();
            let slots = slots.clone();
            let task = move || {
                log_io_errors(run_tcp_listener(&group_clone, &server, &listener, &slots));
            };
            group.start_respawnable(format!("tcp listener {i}"), task)?;
        }

        for i in 0..self.config.udp_workers {
            let group_clone = group.clone();
            let server = server.clone();
            let socket = self.udp_socket.clone();
            let task = move || {
                log_io_errors(run_udp_worker(&group_clone, &server, &socket));
            };
            group.start_respawnable(format!("udp worker {i}"), task)?;
        }

        Ok(())
    }
}

/// The longest a TCP accept or UDP receive blocks before its thread
/// checks for group shutdown again.
const CHECK_FOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a TCP client may take to send one complete DNS message
/// before we close the connection.
const READ_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

////////////////////////////////////////////////////////////////////////
// TCP                                                                //
////////////////////////////////////////////////////////////////////////

/// Counts the TCP connections being served.
struct ConnectionSlots {
    in_use: AtomicUsize,
    max: usize,
}

/// One taken [`ConnectionSlots`] entry, released on drop.
struct ConnectionSlot(Arc<ConnectionSlots>);

impl ConnectionSlots {
    fn new(max: usize) -> Self {
        Self {
            in_use: AtomicUsize::new(0),
            max,
        }
    }

    fn try_take(self: &Arc<Self>) -> Option<ConnectionSlot> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| ConnectionSlot(self.clone()))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The TCP listener/accept loop.
fn run_tcp_listener(
    group: &Arc<ThreadGroup>,
    server: &Arc<Server>,
    listener: &TcpListener,
    slots: &Arc<ConnectionSlots>,
) -> io::Result<()> {
    loop {
        if group.is_shutting_down() {
            return Ok(());
        }

        // poll_accept returns false on timeout or interruption, and
        // always true where it isn't supported (accept then blocks).
        if !listener.poll_accept(CHECK_FOR_SHUTDOWN_TIMEOUT)? {
            continue;
        }

        // Accept as many new connections as are available.
        loop {
            let (client, client_addr) = match retry_if_interrupted(|| listener.accept()) {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            };
            let slot = match slots.try_take() {
                Some(slot) => slot,
                None => {
                    warn!(
                        "Closing TCP connection from {}: too many connections",
                        client_addr
                    );
                    continue;
                }
            };
            let group_clone = group.clone();
            let server = server.clone();
            let task = move || {
                log_io_errors(handle_tcp_connection(
                    &group_clone,
                    &server,
                    client,
                    client_addr.ip(),
                ));
                drop(slot);
            };
            match group.start_oneshot(format!("tcp {client_addr}"), task) {
                Ok(()) => (),
                Err(crate::thread::Error::ShuttingDown) => return Ok(()),
                Err(crate::thread::Error::Io(e)) => return Err(e),
            }
        }
    }
}

/// Serves one TCP connection: two-octet length-prefixed messages, which
/// may be pipelined.
fn handle_tcp_connection(
    group: &ThreadGroup,
    server: &Server,
    mut socket: TcpStream,
    client_ip: IpAddr,
) -> io::Result<()> {
    let mut received_buf = vec![0; 2 + u16::MAX as usize];
    let mut response_buf = vec![0; 2 + u16::MAX as usize];
    let mut n_read = 0;

    loop {
        let deadline = Instant::now() + READ_MESSAGE_TIMEOUT;

        // Read until a whole message is buffered. With pipelining, one
        // may already be there from the previous read.
        let received_len = loop {
            if n_read >= 2 {
                let len = u16::from_be_bytes([received_buf[0], received_buf[1]]) as usize;
                if n_read >= len + 2 {
                    break len;
                }
            }

            let timeout = match deadline.checked_duration_since(Instant::now()) {
                Some(t) if !t.is_zero() => t,
                _ => return Ok(()),
            };
            socket.set_read_timeout(Some(timeout))?;
            let n_read_this_time = match socket.read(&mut received_buf[n_read..]) {
                Ok(0) => return Ok(()), // Client closed its side.
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            n_read += n_read_this_time;
        };

        match server.handle_message(
            &received_buf[2..received_len + 2],
            ReceivedInfo::new(client_ip, Transport::Tcp),
            &mut response_buf[2..],
        ) {
            Response::Single(response_len) => {
                response_buf[0..2].copy_from_slice(&(response_len as u16).to_be_bytes());
                socket.write_all(&response_buf[0..2 + response_len])?;
            }

            // Something was badly malformed, so close the connection.
            Response::None => return Ok(()),
        }

        if group.is_shutting_down() {
            return Ok(());
        }

        // Any leftover data is the start of the next message.
        received_buf.copy_within(received_len + 2..n_read, 0);
        n_read -= received_len + 2;
    }
}

////////////////////////////////////////////////////////////////////////
// UDP                                                                //
////////////////////////////////////////////////////////////////////////

/// The UDP receive/handle/send loop.
fn run_udp_worker(group: &ThreadGroup, server: &Server, socket: &UdpSocket) -> io::Result<()> {
    // Queries larger than 512 octets are not expected without EDNS,
    // but we still read them whole rather than misparse a prefix.
    let mut received_buf = vec![0; u16::MAX as usize];
    let mut response_buf = vec![0; UDP_PAYLOAD_SIZE];

    loop {
        if group.is_shutting_down() {
            return Ok(());
        }

        // Timeouts and interruptions go back to the shutdown check.
        let (received_len, src) = match socket.recv_from(&mut received_buf) {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        match server.handle_message(
            &received_buf[0..received_len],
            ReceivedInfo::new(src.ip(), Transport::Udp),
            &mut response_buf,
        ) {
            Response::Single(response_len) => {
                log_io_errors(retry_if_interrupted(|| {
                    socket.send_to(&response_buf[0..response_len], src)
                }));
            }
            Response::None => (),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// HELPERS                                                            //
////////////////////////////////////////////////////////////////////////

/// Executes `f`, retrying the operation if it is interrupted.
fn retry_if_interrupted<F, R>(mut f: F) -> io::Result<R>
where
    F: FnMut() -> io::Result<R>,
{
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Logs errors if a task exits with an I/O error.
fn log_io_errors<T>(result: io::Result<T>) {
    if let Err(e) = result {
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("anonymous thread");
        error!("I/O error in thread {}: {}", thread_name, e);
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(all(test, unix))]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::resolver::Resolver;
    use crate::rr::{Rdata, Record};
    use crate::zone::ZoneTableBuilder;

    /// A query for xboxlive.com. IN A with RD set.
    const QUERY: &[u8] = b"\x4a\x21\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x08xboxlive\
                           \x03com\x00\x00\x01\x00\x01";

    fn start_provider(config: BlockingIoConfig) -> (Arc<ThreadGroup>, SocketAddr) {
        let mut builder = ZoneTableBuilder::new();
        builder.add_record(
            "xboxlive.com".parse().unwrap(),
            Record::new(Rdata::A(Ipv4Addr::new(10, 0, 0, 1)), None),
        );
        let server = Arc::new(Server::new(Resolver::new(Arc::new(builder.finish()))));
        let provider = BlockingIoProvider::bind(config, (Ipv4Addr::LOCALHOST, 0).into()).unwrap();
        let addr = provider.local_addr().unwrap();
        let group = ThreadGroup::new();
        provider.start(&server, &group).unwrap();
        (group, addr)
    }

    fn check_answer(response: &[u8]) {
        assert_eq!(&response[0..2], b"\x4a\x21");
        assert_eq!(&response[6..8], b"\x00\x01");
        assert_eq!(&response[response.len() - 4..], b"\x0a\x00\x00\x01");
    }

    #[test]
    fn serves_udp_and_pipelined_tcp() {
        let (group, addr) = start_provider(BlockingIoConfig::default());

        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.send_to(QUERY, addr).unwrap();
        let mut buf = [0; 512];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        check_answer(&buf[..len]);

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut framed = (QUERY.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(QUERY);
        let twice = [framed.as_slice(), framed.as_slice()].concat();
        stream.write_all(&twice).unwrap();
        for _ in 0..2 {
            let mut len_buf = [0; 2];
            stream.read_exact(&mut len_buf).unwrap();
            let mut response = vec![0; u16::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut response).unwrap();
            check_answer(&response);
        }
        drop(stream);

        group.shut_down();
        group.await_shutdown();
    }

    #[test]
    fn connection_slots_are_limited_and_released() {
        let slots = Arc::new(ConnectionSlots::new(1));
        let first = slots.try_take();
        assert!(first.is_some());
        assert!(slots.try_take().is_none());
        drop(first);
        assert!(slots.try_take().is_some());
    }
}
