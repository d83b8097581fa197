//! Named device directory.
//!
//! A JSON object mapping aliases to bus addresses:
//!
//! ```json
//! {
//!   "synth": { "addr": "lan[128.149.22.44]:gpib0,19", "info": "signal generator" },
//!   "pm-1":  { "addr": "lan[137.228.236.90]:hpib,11", "info": "power meter K1" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gpibprims_binding::Address;
use serde::{Deserialize, Serialize};

use crate::exit::{address_error, io_error, CliError, CliResult, DATA_INVALID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

#[derive(Debug, Default)]
pub struct Directory {
    entries: BTreeMap<String, DeviceEntry>,
}

impl Directory {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        Self::from_json(&text).map_err(|err| {
            CliError::new(err.code, format!("{}: {}", path.display(), err.message))
        })
    }

    pub fn from_json(text: &str) -> CliResult<Self> {
        let entries: BTreeMap<String, DeviceEntry> = serde_json::from_str(text)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid device directory: {err}")))?;
        for (alias, entry) in &entries {
            Address::parse(&entry.addr)
                .map_err(|err| address_error(&format!("device {alias:?}"), err))?;
        }
        Ok(Self { entries })
    }

    /// The bus address for `device`: an alias from the directory, or a
    /// literal address.
    pub fn resolve(&self, device: &str) -> CliResult<String> {
        if let Some(addr) = self.lookup(device) {
            return Ok(addr.to_string());
        }
        Address::parse(device)
            .map(|_| device.trim().to_string())
            .map_err(|err| address_error(&format!("unknown device {device:?}"), err))
    }

    /// The address registered under `alias`, if any.
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(|entry| entry.addr.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &DeviceEntry)> {
        self.entries.iter().map(|(alias, entry)| (alias.as_str(), entry))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
