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

//! Implements the `run` command (i.e., running the server).

use std::fmt::Write;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info, warn};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use insignia_dns::io::BlockingIoProvider;
use insignia_dns::resolver::Resolver;
use insignia_dns::rr::SoaDefaults;
use insignia_dns::server::Server;
use insignia_dns::thread::ThreadGroup;

use crate::args::RunArgs;
use crate::banner;
use crate::config::{self, DEFAULT_PORT};
use crate::zones;

/// Runs the server.
pub fn run(args: RunArgs) {
    env_logger::init_from_env(Env::new().default_filter_or("info"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed to run:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        if is_permission_error(&e) {
            message.push_str(
                "\nPermission error: Check that you are running this as an administrator or root.",
            );
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
    info!("Exiting with success.");
}

fn try_running(run_args: RunArgs) -> Result<()> {
    // Every SOA record synthesized during this run takes its serial
    // from this one reading of the clock.
    let soa_defaults = SoaDefaults::from_start_time(SystemTime::now());

    // Get the configuration, either from the file system or from the
    // command line arguments, as appropriate.
    let config = if let Some(ref config_path) = run_args.config {
        info!("Loading the configuration from {}.", config_path.display());
        config::load_from_path(config_path).context("failed to load the configuration")?
    } else {
        config::load_from_args(run_args)
    };
    let bind = config
        .bind
        .unwrap_or_else(|| SocketAddr::new(banner::local_ip(), DEFAULT_PORT));

    println!("{}", banner::welcome(bind.ip()));
    info!(
        "insigniaDNS v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );

    // Load the zone data before binding: the provider may be slow or
    // unreachable, and there is nothing to serve without it.
    let table = zones::load(&config, &soa_defaults).context("unable to load DNS data")?;
    let server = Arc::new(Server::new(Resolver::new(Arc::new(table))));

    info!("Detected operating system: {}", banner::platform());
    if let Some(hints) = banner::platform_hints() {
        info!("{}", hints);
    }

    let io_provider = BlockingIoProvider::bind((&config.io).into(), bind)
        .with_context(|| format!("failed to bind sockets on {}", bind))?;

    // Set up signal handling.
    let mut signals = set_up_signal_handling().context("failed to set up signal handling")?;

    // Start the I/O provider.
    let thread_group = ThreadGroup::new();
    io_provider
        .start(&server, &thread_group)
        .context("failed to start the I/O provider")?;
    info!("insigniaDNS is ready. Now waiting for DNS requests from your console...");

    // Wait for a termination signal.
    signals.wait();

    // Shut down the server.
    if BlockingIoProvider::SUPPORTS_GRACEFUL_SHUTDOWN {
        thread_group.shut_down();
        thread_group.await_shutdown();
        info!("Shutdown complete.");
    } else {
        warn!("Graceful shutdown is not supported on this target.");
    }
    Ok(())
}

const TERM_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

#[cfg(not(unix))]
/// How often the termination flag is checked on targets without a
/// signal iterator.
const TERMINATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Waits for the first termination signal.
struct TerminationSignals {
    #[cfg(unix)]
    signals: Signals,
    #[cfg(not(unix))]
    terminating: Arc<AtomicBool>,
}

fn set_up_signal_handling() -> Result<TerminationSignals> {
    let already_terminating = Arc::new(AtomicBool::new(false));

    // This sets up signal handlers to exit immediately if a second
    // termination signal arrives before the process finishes shutting
    // down gracefully.
    for sig in TERM_SIGNALS {
        signal_hook::flag::register_conditional_shutdown(sig, 1, already_terminating.clone())?;
        signal_hook::flag::register(sig, already_terminating.clone())?;
    }

    Ok(TerminationSignals {
        #[cfg(unix)]
        signals: Signals::new(TERM_SIGNALS)?,
        #[cfg(not(unix))]
        terminating: already_terminating,
    })
}

impl TerminationSignals {
    #[cfg(unix)]
    fn wait(&mut self) {
        if let Some(signal) = self.signals.forever().next() {
            let name = match signal {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                _ => unreachable!(),
            };
            info!("Received {}; shutting down.", name);
        }
    }

    // signal-hook has no signal iterator on Windows, so we poll the
    // flag instead.
    #[cfg(not(unix))]
    fn wait(&mut self) {
        wait_for_flag(&self.terminating, TERMINATION_POLL_INTERVAL);
        info!("Received a termination signal; shutting down.");
    }
}

/// Blocks until `flag` is set, checking it every `interval`.
#[cfg_attr(unix, allow(dead_code))]
fn wait_for_flag(flag: &AtomicBool, interval: Duration) {
    while !flag.load(Ordering::SeqCst) {
        thread::sleep(interval);
    }
}

/// Determines whether an error was caused by a lack of privileges,
/// which usually means port 53 could not be bound.
fn is_permission_error(e: &anyhow::Error) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|io_error| io_error.kind() == io::ErrorKind::PermissionDenied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn wait_for_flag_returns_once_set() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = {
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
        };
        let start = Instant::now();
        wait_for_flag(&flag, Duration::from_millis(5));
        assert!(flag.load(Ordering::SeqCst));
        assert!(start.elapsed() >= Duration::from_millis(50));
        setter.join().unwrap();
    }

    #[test]
    fn wait_for_flag_does_not_block_when_already_set() {
        let flag = AtomicBool::new(true);
        let start = Instant::now();
        wait_for_flag(&flag, Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn permission_errors_are_detected_through_context() {
        let denied = anyhow::Error::new(io::Error::from(io::ErrorKind::PermissionDenied))
            .context("failed to bind sockets on 0.0.0.0:53");
        assert!(is_permission_error(&denied));

        let in_use = anyhow::Error::new(io::Error::from(io::ErrorKind::AddrInUse))
            .context("failed to bind sockets on 0.0.0.0:53");
        assert!(!is_permission_error(&in_use));
    }
}
