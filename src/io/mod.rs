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

//! Network I/O for running a [`Server`](crate::server::Server).
//!
//! A [`Server`](crate::server::Server) only turns received messages
//! into responses. The provider here owns the sockets and threads that
//! receive queries from the network, hand them to the server, and send
//! back what it produces.

mod blocking;
pub mod socket;

pub use blocking::{BlockingIoConfig, BlockingIoProvider};
