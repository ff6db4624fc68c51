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

//! Implements the server configuration file.

use std::fmt::{self, Write};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use paste::paste;
use serde::{de, Deserialize};

use insignia_dns::io::BlockingIoConfig;
use insignia_dns::name::Name;
use insignia_dns::rr::{Kind, Rdata, Record, Soa, SoaDefaults, SoaTimers, Ttl};
use insignia_dns::zone::ZoneEntry;

use crate::args::RunArgs;
use crate::banner;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the server configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let dir = match path.as_ref().parent() {
        Some(p) => p,
        None => return Err(anyhow!("the configuration file path has no parent")),
    };
    let raw_config = fs::read(path.as_ref()).context("failed to read the configuration file")?;
    let mut config: Config =
        toml::from_slice(&raw_config).context("failed to parse the configuration file")?;
    config
        .source
        .location()
        .context("invalid [source] section")?;

    // A zone data file path is interpreted relative to the
    // configuration file's directory.
    if let Some(ref mut zones_path) = config.source.path {
        if zones_path.is_relative() {
            *zones_path = dir.join(&*zones_path);
        }
    }

    log_config_summary(&config);
    Ok(config)
}

/// Loads the server configuration from the parsed command line
/// arguments given by `args`.
pub fn load_from_args(args: RunArgs) -> Config {
    let bind = args.bind.or_else(|| {
        if args.ip.is_none() && args.port.is_none() {
            None
        } else {
            let ip = args.ip.unwrap_or_else(banner::local_ip);
            Some(SocketAddr::new(ip, args.port.unwrap_or(DEFAULT_PORT)))
        }
    });

    let config = Config {
        bind,
        io: IoConfig::default(),
        source: SourceConfig {
            url: args.zones_url,
            path: args.zones_file,
            timeout: default_timeout(),
        },
        supplemental: default_supplemental(),
        records: Vec::new(),
    };
    log_config_summary(&config);
    config
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        // Don't compute the message if it will never be printed.
        return;
    }

    let mut message = String::from("Configuration loaded:\nBind address:   ");
    match config.bind {
        Some(bind) => write!(message, "{}", bind).unwrap(),
        None => write!(message, "detected local IP, port {}", DEFAULT_PORT).unwrap(),
    }
    match config.source.location() {
        Ok(location) => write!(message, "\nZone data:      {}", location).unwrap(),
        Err(_) => message.push_str("\nZone data:      invalid"),
    }
    write!(
        message,
        "\nI/O:            {} UDP worker(s), {} TCP listener(s), \
         {} TCP connection(s) max\n\
         Supplemental:   {} entr{}\n\
         Static records: {}",
        config.io.udp_workers,
        config.io.tcp_listeners,
        config.io.max_tcp_connections,
        config.supplemental.len(),
        if config.supplemental.len() == 1 { "y" } else { "ies" },
        config.records.len(),
    )
    .unwrap();
    for record in &config.records {
        write!(message, "\n  {} {}", record.name.0, record.kind.0).unwrap();
    }
    debug!("{}", message);
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The address to serve on. When absent, the server binds port 53
    /// on the detected local IP address.
    pub bind: Option<SocketAddr>,
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default = "default_supplemental")]
    pub supplemental: Vec<ZoneEntry>,
    #[serde(default)]
    pub records: Vec<RecordConfig>,
}

pub const DEFAULT_PORT: u16 = 53;

/// Entries served in addition to whatever the provider publishes.
fn default_supplemental() -> Vec<ZoneEntry> {
    vec![
        ZoneEntry::pointer("macs.part.xboxlive.com", "macs.insig.uk"),
        ZoneEntry::pointer("as.part.xboxlive.com", "as.insig.uk"),
        ZoneEntry::pointer("tgs.part.xboxlive.com", "tgs.insig.uk"),
        ZoneEntry::pointer("xds.part.xboxlive.com", "xds.xboxlive.com"),
        ZoneEntry::pointer("insignia.part.live", "insignia.live"),
    ]
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: I/O                                         //
////////////////////////////////////////////////////////////////////////

/// Configuration for the
/// [`BlockingIoProvider`](insignia_dns::io::BlockingIoProvider). This
/// mirrors [`BlockingIoConfig`] and can be converted into one; its
/// purpose is to make the configuration deserializable and to provide
/// defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    #[serde(default = "default_udp_workers")]
    pub udp_workers: usize,
    #[serde(default = "default_tcp_listeners")]
    pub tcp_listeners: usize,
    #[serde(default = "default_max_tcp_connections")]
    pub max_tcp_connections: usize,
}

fn default_udp_workers() -> usize {
    BlockingIoConfig::default().udp_workers
}

fn default_tcp_listeners() -> usize {
    BlockingIoConfig::default().tcp_listeners
}

fn default_max_tcp_connections() -> usize {
    BlockingIoConfig::default().max_tcp_connections
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            udp_workers: default_udp_workers(),
            tcp_listeners: default_tcp_listeners(),
            max_tcp_connections: default_max_tcp_connections(),
        }
    }
}

impl From<&IoConfig> for BlockingIoConfig {
    fn from(toml_config: &IoConfig) -> Self {
        Self {
            udp_workers: toml_config.udp_workers,
            tcp_listeners: toml_config.tcp_listeners,
            max_tcp_connections: toml_config.max_tcp_connections,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: ZONE DATA SOURCE                            //
////////////////////////////////////////////////////////////////////////

/// Where the provider's zone data comes from. At most one of `url` and
/// `path` may be set; with neither, the data is fetched from
/// [`DEFAULT_ZONES_URL`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub url: Option<String>,
    pub path: Option<PathBuf>,

    /// The HTTP request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

pub const DEFAULT_ZONES_URL: &str = "https://insignia.live/dns_zones.json";

fn default_timeout() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            timeout: default_timeout(),
        }
    }
}

impl SourceConfig {
    pub fn location(&self) -> Result<ZoneLocation> {
        match (&self.url, &self.path) {
            (Some(_), Some(_)) => bail!("only one of url and path may be given"),
            (Some(url), None) => Ok(ZoneLocation::Url(url)),
            (None, Some(path)) => Ok(ZoneLocation::Path(path)),
            (None, None) => Ok(ZoneLocation::Url(DEFAULT_ZONES_URL)),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// The resolved location of the zone data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ZoneLocation<'a> {
    Url(&'a str),
    Path(&'a Path),
}

impl fmt::Display for ZoneLocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: STATIC RECORDS                              //
////////////////////////////////////////////////////////////////////////

/// A record configured directly in the configuration file.
///
/// Which of the optional fields are required depends on `type`:
///
/// | `type`        | fields                                        |
/// |---------------|-----------------------------------------------|
/// | `A`, `AAAA`   | `address`                                     |
/// | `CNAME`, `NS` | `target`                                      |
/// | `MX`          | `preference`, `exchange`                      |
/// | `SOA`         | `mname`, `rname`, optionally all five timers  |
/// | `TXT`         | `text`                                        |
///
/// Any other field is rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordConfig {
    pub name: ConfigName,
    #[serde(rename = "type")]
    pub kind: ConfigKind,
    pub ttl: Option<u32>,
    pub owner: Option<ConfigName>,

    pub address: Option<IpAddr>,
    pub target: Option<ConfigName>,
    pub preference: Option<u16>,
    pub exchange: Option<ConfigName>,
    pub mname: Option<ConfigName>,
    pub rname: Option<ConfigName>,
    pub serial: Option<u32>,
    pub refresh: Option<u32>,
    pub retry: Option<u32>,
    pub expire: Option<u32>,
    pub minimum: Option<u32>,
    pub text: Option<String>,
}

/// The largest TTL a record may be configured with (RFC 2181 § 8).
const MAX_TTL: u32 = i32::MAX as u32;

const TIMER_FIELDS: [&str; 5] = ["serial", "refresh", "retry", "expire", "minimum"];

impl RecordConfig {
    /// Converts the configuration into the name it is stored under and
    /// the [`Record`] itself. SOA records without timers take theirs
    /// from `defaults`.
    pub fn to_record(&self, defaults: &SoaDefaults) -> Result<(Name, Record)> {
        let kind = self.kind.0;
        self.check_fields(kind)?;
        let ttl = match self.ttl {
            Some(ttl) if ttl > MAX_TTL => bail!("ttl {} exceeds the maximum of {}", ttl, MAX_TTL),
            ttl => ttl.map(Ttl::from),
        };

        let record = match kind {
            Kind::A => match self.require(self.address, "address")? {
                IpAddr::V4(address) => Record::new(Rdata::A(address), ttl),
                IpAddr::V6(_) => bail!("an A record needs an IPv4 address"),
            },
            Kind::Aaaa => match self.require(self.address, "address")? {
                IpAddr::V6(address) => Record::new(Rdata::Aaaa(address), ttl),
                IpAddr::V4(_) => bail!("an AAAA record needs an IPv6 address"),
            },
            Kind::Cname => {
                let target = self.require(self.target.clone(), "target")?;
                Record::new(Rdata::Cname(target.0), ttl)
            }
            Kind::Ns => {
                let target = self.require(self.target.clone(), "target")?;
                Record::new(Rdata::Ns(target.0), ttl)
            }
            Kind::Mx => Record::new(
                Rdata::Mx {
                    preference: self.require(self.preference, "preference")?,
                    exchange: self.require(self.exchange.clone(), "exchange")?.0,
                },
                ttl,
            ),
            Kind::Soa => {
                let mname = self.require(self.mname.clone(), "mname")?.0;
                let rname = self.require(self.rname.clone(), "rname")?.0;
                match (
                    self.serial,
                    self.refresh,
                    self.retry,
                    self.expire,
                    self.minimum,
                ) {
                    (None, None, None, None, None) => Record::soa(mname, rname, defaults, ttl),
                    (Some(serial), Some(refresh), Some(retry), Some(expire), Some(minimum)) => {
                        let timers = SoaTimers {
                            serial,
                            refresh,
                            retry,
                            expire,
                            minimum,
                        };
                        let soa = Soa {
                            mname,
                            rname,
                            timers,
                        };
                        Record::new(Rdata::Soa(soa), ttl)
                    }
                    _ => bail!(
                        "an SOA record needs either none or all of {}",
                        TIMER_FIELDS.join(", ")
                    ),
                }
            }
            Kind::Txt => {
                let text = self.require(self.text.as_deref(), "text")?;
                Record::new(Rdata::Txt(text.into()), ttl)
            }
        };

        let record = match self.owner {
            Some(ref owner) => record.with_owner(owner.0.clone()),
            None => record,
        };
        Ok((self.name.0.clone(), record))
    }

    fn require<T>(&self, value: Option<T>, field: &str) -> Result<T> {
        value.ok_or_else(|| anyhow!("a {} record needs the {} field", self.kind.0, field))
    }

    /// Rejects fields that do not belong to records of `kind`.
    fn check_fields(&self, kind: Kind) -> Result<()> {
        let allowed: &[&str] = match kind {
            Kind::A | Kind::Aaaa => &["address"],
            Kind::Cname | Kind::Ns => &["target"],
            Kind::Mx => &["preference", "exchange"],
            Kind::Soa => &[
                "mname", "rname", "serial", "refresh", "retry", "expire", "minimum",
            ],
            Kind::Txt => &["text"],
        };
        let present = [
            ("address", self.address.is_some()),
            ("target", self.target.is_some()),
            ("preference", self.preference.is_some()),
            ("exchange", self.exchange.is_some()),
            ("mname", self.mname.is_some()),
            ("rname", self.rname.is_some()),
            ("serial", self.serial.is_some()),
            ("refresh", self.refresh.is_some()),
            ("retry", self.retry.is_some()),
            ("expire", self.expire.is_some()),
            ("minimum", self.minimum.is_some()),
            ("text", self.text.is_some()),
        ];
        match present
            .into_iter()
            .find(|(field, set)| *set && !allowed.contains(field))
        {
            Some((field, _)) => bail!("the {} field does not apply to {} records", field, kind),
            None => Ok(()),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS OVER LIBRARY TYPES FOR SERDE                              //
////////////////////////////////////////////////////////////////////////

/// Generates a deserializable `ConfigX` structure wrapping an `X` type
/// from [`insignia_dns`], using its [`FromStr`](std::str::FromStr)
/// implementation.
macro_rules! make_serde_wrapper {
    ($wrapper:ident, $over:ty, $description:literal) => {
        /// A macro-generated deserializable wrapper over an
        /// [`insignia_dns`] type.
        #[derive(Clone, Debug)]
        pub struct $wrapper(pub $over);

        impl<'de> Deserialize<'de> for $wrapper {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str(paste! { [<$wrapper Visitor>] })
            }
        }

        paste! {
            /// A macro-generated [`Visitor`](de::Visitor).
            #[derive(Debug)]
            struct [<$wrapper Visitor>];
        }

        impl<'de> de::Visitor<'de> for paste! { [<$wrapper Visitor>] } {
            type Value = $wrapper;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($description)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse()
                    .map($wrapper)
                    .map_err(|e| E::custom(format!("invalid {}: {}", $description, e)))
            }
        }
    };
}

make_serde_wrapper!(ConfigName, Name, "domain name");
make_serde_wrapper!(ConfigKind, Kind, "record type");

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use insignia_dns::zone::EntryKind;

    fn parse(text: &str) -> Config {
        toml::from_str(text).unwrap()
    }

    fn record(text: &str) -> Result<(Name, Record)> {
        let config: RecordConfig = toml::from_str(text).unwrap();
        config.to_record(&SoaDefaults::with_serial(1_600_000_000))
    }

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse("");
        assert_eq!(config.bind, None);
        assert_eq!(config.io.udp_workers, 2);
        assert_eq!(config.io.tcp_listeners, 1);
        assert_eq!(config.io.max_tcp_connections, 64);
        assert_eq!(
            config.source.location().unwrap(),
            ZoneLocation::Url(DEFAULT_ZONES_URL)
        );
        assert_eq!(config.source.timeout(), Duration::from_secs(30));
        assert!(config.records.is_empty());

        let names: Vec<&str> = config
            .supplemental
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "macs.part.xboxlive.com",
                "as.part.xboxlive.com",
                "tgs.part.xboxlive.com",
                "xds.part.xboxlive.com",
                "insignia.part.live",
            ]
        );
        assert!(config
            .supplemental
            .iter()
            .all(|entry| entry.kind == EntryKind::Pointer));
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"
            bind = "192.168.1.20:53"

            [io]
            udp_workers = 4

            [source]
            path = "zones.json"

            [[supplemental]]
            type = "a"
            name = "extra.xboxlive.com"
            value = "10.0.0.9"

            [[records]]
            name = "xboxlive.com"
            type = "SOA"
            mname = "ns1.insignia.live"
            rname = "admin.insignia.live"
            "#,
        );
        assert_eq!(config.bind, Some("192.168.1.20:53".parse().unwrap()));
        assert_eq!(config.io.udp_workers, 4);
        assert_eq!(config.io.tcp_listeners, 1);
        assert_eq!(
            config.source.location().unwrap(),
            ZoneLocation::Path(Path::new("zones.json"))
        );
        assert_eq!(
            config.supplemental,
            [ZoneEntry::address("extra.xboxlive.com", "10.0.0.9")]
        );
        assert_eq!(config.records.len(), 1);
        assert_eq!(config.records[0].kind.0, Kind::Soa);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("port = 53").is_err());
        assert!(toml::from_str::<Config>("[io]\ntcp_workers = 3").is_err());
        assert!(toml::from_str::<Config>("[source]\nhost = \"insignia.live\"").is_err());
    }

    #[test]
    fn source_rejects_url_and_path_together() {
        let config = parse(
            r#"
            [source]
            url = "https://insignia.live/dns_zones.json"
            path = "zones.json"
            "#,
        );
        assert!(config.source.location().is_err());
    }

    #[test]
    fn invalid_names_and_types_are_rejected() {
        assert!(toml::from_str::<RecordConfig>(
            "name = \"bad..name\"\ntype = \"A\"\naddress = \"10.0.0.1\""
        )
        .is_err());
        assert!(toml::from_str::<RecordConfig>(
            "name = \"xboxlive.com\"\ntype = \"SRV\"\naddress = \"10.0.0.1\""
        )
        .is_err());
    }

    #[test]
    fn address_records_convert() {
        let (owner, a) = record("name = \"xboxlive.com\"\ntype = \"a\"\naddress = \"10.0.0.1\"")
            .unwrap();
        assert_eq!(owner, name("xboxlive.com"));
        assert_eq!(a.rdata(), &Rdata::A("10.0.0.1".parse().unwrap()));
        assert_eq!(a.ttl(), Ttl::FIVE_MINUTES);

        let (_, aaaa) =
            record("name = \"xboxlive.com\"\ntype = \"AAAA\"\naddress = \"2001:db8::1\"\nttl = 60")
                .unwrap();
        assert_eq!(aaaa.rdata(), &Rdata::Aaaa("2001:db8::1".parse().unwrap()));
        assert_eq!(aaaa.ttl(), Ttl::from(60));

        assert!(record("name = \"xboxlive.com\"\ntype = \"A\"\naddress = \"2001:db8::1\"").is_err());
        assert!(record("name = \"xboxlive.com\"\ntype = \"AAAA\"\naddress = \"10.0.0.1\"").is_err());
    }

    #[test]
    fn oversized_ttls_are_rejected() {
        let (_, a) = record(
            "name = \"xboxlive.com\"\ntype = \"A\"\naddress = \"10.0.0.1\"\nttl = 2147483647",
        )
        .unwrap();
        assert_eq!(a.ttl(), Ttl::from(2_147_483_647));

        assert!(record(
            "name = \"xboxlive.com\"\ntype = \"A\"\naddress = \"10.0.0.1\"\nttl = 2147483648"
        )
        .is_err());
    }

    #[test]
    fn soa_records_synthesize_timers() {
        let (_, soa) = record(
            "name = \"live\"\ntype = \"SOA\"\nmname = \"ns1.insignia.live\"\nrname = \"admin.insignia.live\"",
        )
        .unwrap();
        let Rdata::Soa(soa_data) = soa.rdata() else {
            panic!("not an SOA record");
        };
        assert_eq!(soa_data.timers.serial, 1_600_000_000);
        assert_eq!(soa_data.timers.refresh, SoaDefaults::REFRESH);
        assert_eq!(soa_data.timers.minimum, SoaDefaults::MINIMUM);
        assert_eq!(soa.ttl(), Ttl::ONE_DAY);
    }

    #[test]
    fn soa_records_take_all_or_no_timers() {
        let (_, soa) = record(
            "name = \"live\"\ntype = \"SOA\"\nmname = \"ns1.insignia.live\"\n\
             rname = \"admin.insignia.live\"\nserial = 7\nrefresh = 1\n\
             retry = 2\nexpire = 3\nminimum = 4",
        )
        .unwrap();
        let Rdata::Soa(soa_data) = soa.rdata() else {
            panic!("not an SOA record");
        };
        assert_eq!(
            soa_data.timers,
            SoaTimers {
                serial: 7,
                refresh: 1,
                retry: 2,
                expire: 3,
                minimum: 4,
            }
        );

        assert!(record(
            "name = \"live\"\ntype = \"SOA\"\nmname = \"ns1.insignia.live\"\n\
             rname = \"admin.insignia.live\"\nserial = 7"
        )
        .is_err());
    }

    #[test]
    fn owner_override_is_applied() {
        let (owner, cname) = record(
            "name = \"www.insignia.live\"\ntype = \"CNAME\"\ntarget = \"insignia.live\"\n\
             owner = \"alias.insignia.live\"",
        )
        .unwrap();
        assert_eq!(owner, name("www.insignia.live"));
        assert_eq!(cname.owner(), Some(&name("alias.insignia.live")));
    }

    #[test]
    fn missing_and_foreign_fields_are_rejected() {
        assert!(record("name = \"insignia.live\"\ntype = \"MX\"\npreference = 10").is_err());
        assert!(record(
            "name = \"insignia.live\"\ntype = \"TXT\"\ntext = \"hello\"\naddress = \"10.0.0.1\""
        )
        .is_err());

        let (_, mx) = record(
            "name = \"insignia.live\"\ntype = \"MX\"\npreference = 10\nexchange = \"mail.insignia.live\"",
        )
        .unwrap();
        assert_eq!(
            mx.rdata(),
            &Rdata::Mx {
                preference: 10,
                exchange: name("mail.insignia.live"),
            }
        );
    }
}
