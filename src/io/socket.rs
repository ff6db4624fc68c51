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

//! Provides target-specific socket support when available.
//!
//! The Rust standard library cannot `accept` on a listening TCP socket
//! with a timeout. Without one, a thread blocked in `accept` never gets
//! to notice that its [`ThreadGroup`](crate::thread::ThreadGroup) is
//! shutting down. Where the target allows it, [`TcpListener`] builds a
//! `poll_accept` method on top of the `poll` system call instead; this
//! is currently the case on **Unix** targets. Elsewhere `poll_accept`
//! always reports a pending connection and `accept` simply blocks.

use std::io;
use std::net::{self, SocketAddr, TcpStream};
use std::time::Duration;

/// Whether [`TcpListener::poll_accept`] can wait with a timeout on this
/// target.
pub const SUPPORTS_POLL_ACCEPT: bool = cfg!(unix);

/// A listening TCP socket.
pub(crate) struct TcpListener(net::TcpListener);

impl TcpListener {
    /// Creates a new listener bound to the provided address. Where
    /// [`SUPPORTS_POLL_ACCEPT`] holds, the listener is put in
    /// non-blocking mode, so that [`TcpListener::accept`] reports
    /// [`io::ErrorKind::WouldBlock`] once the backlog is drained.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = net::TcpListener::bind(addr)?;
        if SUPPORTS_POLL_ACCEPT {
            listener.set_nonblocking(true)?;
        }
        Ok(Self(listener))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.0.local_addr()
    }

    /// Accepts a new connection. The returned stream is always in
    /// blocking mode.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.0.accept()?;

        // On some systems, the socket inherits nonblocking status from
        // the listener.
        if SUPPORTS_POLL_ACCEPT {
            stream.set_nonblocking(false)?;
        }
        Ok((stream, peer))
    }

    /// Blocks until a new connection is available, `timeout` expires,
    /// or the call is interrupted. Returns whether a new connection is
    /// available.
    #[cfg(unix)]
    pub fn poll_accept(&self, timeout: Duration) -> io::Result<bool> {
        use std::os::unix::io::AsRawFd;

        use nix::errno::Errno;
        use nix::poll::{poll, PollFd, PollFlags};

        let millis = timeout.as_millis().try_into().unwrap_or(i32::MAX);
        let mut poll_fds = [PollFd::new(self.0.as_raw_fd(), PollFlags::POLLIN)];
        match poll(&mut poll_fds, millis) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Always reports a pending connection; see the module
    /// documentation.
    #[cfg(not(unix))]
    pub fn poll_accept(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(all(test, unix))]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn poll_accept_times_out_and_wakes() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0).into()).unwrap();
        assert!(!listener.poll_accept(Duration::from_millis(10)).unwrap());

        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        assert!(listener.poll_accept(Duration::from_secs(5)).unwrap());
        let (_stream, peer) = listener.accept().unwrap();
        assert!(peer.ip().is_loopback());

        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
