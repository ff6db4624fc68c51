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

//! Implements zone loading.

use std::fs;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use insignia_dns::rr::SoaDefaults;
use insignia_dns::zone::{
    parse_entries, resolve_pointers, SystemHostResolver, ZoneEntry, ZoneTable, ZoneTableBuilder,
};

use crate::banner;
use crate::config::{Config, RecordConfig, ZoneLocation};

/// Loads the zone data described by `config` and builds the table to
/// serve. Any failure along the way is fatal.
pub fn load(config: &Config, defaults: &SoaDefaults) -> Result<ZoneTable> {
    let location = config.source.location()?;
    info!("Loading zone data from {}.", location);
    let text = match location {
        ZoneLocation::Url(url) => fetch(url, config.source.timeout())?,
        ZoneLocation::Path(path) => {
            fs::read_to_string(path).context("failed to read the zone data file")?
        }
    };

    let mut entries = parse_entries(&text).context(
        "invalid response from the zone data provider; check that you can visit insignia.live",
    )?;
    debug!(
        "Received {} entries; adding {} supplemental entries.",
        entries.len(),
        config.supplemental.len(),
    );
    entries.extend(config.supplemental.iter().cloned());
    let entries = resolve_pointers(entries, &SystemHostResolver)
        .context("failed to resolve pointer entries")?;

    let table = build_table(&config.records, &entries, defaults)?;
    info!(
        "DNS information loaded successfully: {} names, {} records.",
        table.len(),
        table.record_count(),
    );
    Ok(table)
}

/// Fetches the provider's entry list over HTTP.
fn fetch(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .build()
        .context("failed to create the HTTP client")?;

    match client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
    {
        Ok(text) => Ok(text),
        Err(e) if e.is_timeout() => Err(anyhow!(e).context(
            "the connection to the zone data provider timed out; are you connected to the Internet?",
        )),
        Err(e) => Err(anyhow!(e).context("failed to fetch the zone data")),
    }
}

/// The `User-Agent` we identify ourselves with to the provider.
fn user_agent() -> String {
    format!(
        "insigniaDNS/{}.{} ({})",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        banner::platform(),
    )
}

/// Builds the table from the statically configured records, followed
/// by the resolved provider entries.
fn build_table(
    records: &[RecordConfig],
    entries: &[ZoneEntry],
    defaults: &SoaDefaults,
) -> Result<ZoneTable> {
    let mut builder = ZoneTableBuilder::new();
    for record_config in records {
        let (name, record) = record_config
            .to_record(defaults)
            .with_context(|| format!("invalid static record for {}", record_config.name.0))?;
        builder.add_record(name, record);
    }
    for entry in entries {
        builder.add_entry(entry)?;
    }
    Ok(builder.finish())
}
