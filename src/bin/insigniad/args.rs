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

//! Implements command-line argument parsing.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The insigniaDNS authoritative DNS server
#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the server
    Run(RunArgs),
}

#[derive(Debug, ClapArgs)]
pub struct RunArgs {
    /// Set the configuration file to use
    #[arg(
        long,
        conflicts_with_all = ["bind", "ip", "port", "zones_url", "zones_file"],
        value_name = "FILE"
    )]
    pub config: Option<PathBuf>,

    /// Set the server bind IP address and port
    #[arg(long, value_name = "IP:PORT")]
    pub bind: Option<SocketAddr>,

    /// Set the server bind IP address [default: the detected local IP]
    #[arg(long, conflicts_with = "bind", value_name = "IP")]
    pub ip: Option<IpAddr>,

    /// Set the server port [default: 53]
    #[arg(long, conflicts_with = "bind", value_name = "PORT")]
    pub port: Option<u16>,

    /// Fetch zone data from this URL
    #[arg(long, conflicts_with = "zones_file", value_name = "URL")]
    pub zones_url: Option<String>,

    /// Read zone data from this JSON file instead of fetching it
    #[arg(long, value_name = "FILE")]
    pub zones_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_interface_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn run_accepts_no_options() {
        let args = Args::try_parse_from(["insigniad", "run"]).unwrap();
        let Command::Run(run_args) = args.command;
        assert!(run_args.config.is_none());
        assert!(run_args.bind.is_none());
        assert!(run_args.zones_url.is_none());
    }

    #[test]
    fn run_parses_bind_options() {
        let args = Args::try_parse_from([
            "insigniad",
            "run",
            "--ip",
            "192.168.1.20",
            "--port",
            "5353",
            "--zones-file",
            "zones.json",
        ])
        .unwrap();
        let Command::Run(run_args) = args.command;
        assert_eq!(run_args.ip, Some("192.168.1.20".parse().unwrap()));
        assert_eq!(run_args.port, Some(5353));
        assert_eq!(run_args.zones_file, Some(PathBuf::from("zones.json")));
    }

    #[test]
    fn run_rejects_conflicting_options() {
        assert!(Args::try_parse_from([
            "insigniad",
            "run",
            "--config",
            "insigniad.toml",
            "--port",
            "53"
        ])
        .is_err());
        assert!(Args::try_parse_from([
            "insigniad",
            "run",
            "--bind",
            "127.0.0.1:53",
            "--ip",
            "127.0.0.1"
        ])
        .is_err());
        assert!(Args::try_parse_from([
            "insigniad",
            "run",
            "--zones-url",
            "http://localhost/zones.json",
            "--zones-file",
            "zones.json"
        ])
        .is_err());
    }
}
