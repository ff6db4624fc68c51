// Copyright 2021 Matthew Ingwersen.
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

//! Implements the startup banner and the host details it shows.

use std::env::consts::OS;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Returns a friendly name for the operating system we are running on.
pub fn platform() -> &'static str {
    match OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        other => other,
    }
}

/// Discovers the IP address this host uses to reach other machines on
/// the network, falling back to the loopback address.
///
/// "Connecting" a UDP socket sends nothing; it just makes the operating
/// system choose a source address, which we then read back.
pub fn local_ip() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Formats an address the way consoles ask for it: IPv4 addresses get
/// every octet zero-padded to three digits. Other addresses are shown
/// as they are.
pub fn format_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(ip) => {
            let [a, b, c, d] = ip.octets();
            format!("{:03}.{:03}.{:03}.{:03}", a, b, c, d)
        }
        IpAddr::V6(ip) => ip.to_string(),
    }
}

/// Returns the welcome banner, which tells the user what to enter in
/// their console's DNS settings.
pub fn welcome(ip: IpAddr) -> String {
    format!(
        "+===============================+\n\
         |      Insignia DNS Server      |\n\
         |         Version {:<14}|\n\
         +===============================+\n\
         \n\
         == Welcome to insigniaDNS! ==\n\
         This server will allow you to connect to Insignia when your \
         Internet Service Provider does not work with custom DNS.\n\
         \n\
         == How To Use ==\n\
         First, make sure that your console is connected to the same \
         network as this computer.\n\
         \n\
         Then, put these settings in for DNS on your console:\n\
         ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~\n\
         Primary DNS:   {}\n\
         Secondary DNS: {}\n\
         ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~\n\
         \n\
         == Getting Help ==\n\
         Need help? Visit our Discord server or check out \
         https://support.insignia.live\n",
        version(),
        format_ip(ip),
        format_ip(SECONDARY_DNS),
    )
}

/// The secondary DNS server we tell consoles to use.
const SECONDARY_DNS: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));

fn version() -> String {
    format!(
        "{}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
    )
}

/// Returns hints about what the server needs from the platform, if
/// there are any for the one we are running on.
pub fn platform_hints() -> Option<&'static str> {
    match platform() {
        "Linux" | "macOS" => Some(
            "Please note that you will have to run this as root or with \
             permissions to bind to port 53. If you aren't seeing any \
             requests, check that this is the case first with lsof -i:53 \
             (requires lsof). To run as root, prefix the command with 'sudo'.",
        ),
        "Windows" => Some(
            "Please note that you may have to allow this application through \
             the firewall. If so, a popup will appear in a moment. If you are \
             not seeing any requests, make sure you have allowed this \
             application through the firewall.",
        ),
        _ => None,
    }
}
