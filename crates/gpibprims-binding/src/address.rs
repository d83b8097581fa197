//! Bus address grammar.
//!
//! ```text
//! gpib0                         interface session
//! gpib0,19                      device 19 on interface gpib0
//! hpib,7,2                      device 7, secondary address 2
//! lan[158.154.1.110]:19         device 19 behind a LAN gateway
//! lan[128.149.22.44]:gpib0,19   device 19 on a named interface of a LAN gateway
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Highest valid primary or secondary bus address.
pub const MAX_BUS_ADDRESS: u8 = 30;

const LAN_PREFIX: &str = "lan[";

/// A parsed bus address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: Option<String>,
    interface: Option<String>,
    primary: Option<u8>,
    secondary: Option<u8>,
}

impl Address {
    /// Parse an address string.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::Empty);
        }

        let (host, rest) = split_host(input)?;

        let mut fields = rest.split(',').map(str::trim);
        let first = fields.next().unwrap_or_default();
        if first.is_empty() {
            return Err(AddressError::MissingInterface(input.to_string()));
        }

        let mut address = Self {
            host,
            interface: None,
            primary: None,
            secondary: None,
        };

        if first.bytes().all(|b| b.is_ascii_digit()) {
            // A bare primary address is only meaningful behind a gateway.
            if address.host.is_none() {
                return Err(AddressError::MissingInterface(input.to_string()));
            }
            address.primary = Some(parse_primary(first)?);
        } else {
            address.interface = Some(parse_interface(first)?);
            if let Some(primary) = fields.next() {
                address.primary = Some(parse_primary(primary)?);
            }
        }

        if let Some(secondary) = fields.next() {
            address.secondary = Some(parse_secondary(secondary)?);
        }
        if let Some(extra) = fields.next() {
            return Err(AddressError::TrailingField(extra.to_string()));
        }

        Ok(address)
    }

    /// Gateway host for LAN-relayed addresses.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Interface symbolic name (`gpib0`, `hpib3`, ...), lowercased, if given.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Primary bus address, if this names a device.
    pub fn primary(&self) -> Option<u8> {
        self.primary
    }

    /// Secondary bus address, if given.
    pub fn secondary(&self) -> Option<u8> {
        self.secondary
    }

    /// Whether the session is relayed through a LAN gateway.
    pub fn is_remote(&self) -> bool {
        self.host.is_some()
    }

    /// Whether this names a whole interface rather than one device.
    pub fn is_interface(&self) -> bool {
        self.primary.is_none()
    }

    /// The same bus with a different device selected.
    pub fn with_primary(&self, primary: u8) -> Result<Self, AddressError> {
        if primary > MAX_BUS_ADDRESS {
            return Err(AddressError::InvalidPrimary(primary.to_string()));
        }
        Ok(Self {
            primary: Some(primary),
            secondary: None,
            ..self.clone()
        })
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "lan[{host}]:")?;
        }
        match (&self.interface, self.primary) {
            (Some(interface), Some(primary)) => write!(f, "{interface},{primary}")?,
            (Some(interface), None) => write!(f, "{interface}")?,
            (None, Some(primary)) => write!(f, "{primary}")?,
            (None, None) => {}
        }
        if let Some(secondary) = self.secondary {
            write!(f, ",{secondary}")?;
        }
        Ok(())
    }
}

fn split_host(input: &str) -> Result<(Option<String>, &str), AddressError> {
    let is_lan = input
        .get(..LAN_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(LAN_PREFIX));
    if !is_lan {
        return Ok((None, input));
    }

    let after = &input[LAN_PREFIX.len()..];
    let close = after
        .find(']')
        .ok_or_else(|| AddressError::UnterminatedHost(input.to_string()))?;
    let host = after[..close].trim();
    if host.is_empty() {
        return Err(AddressError::EmptyHost(input.to_string()));
    }
    let rest = after[close + 1..]
        .trim_start()
        .strip_prefix(':')
        .ok_or_else(|| AddressError::UnterminatedHost(input.to_string()))?;

    Ok((Some(host.to_string()), rest))
}

fn parse_interface(field: &str) -> Result<String, AddressError> {
    let valid = field.starts_with(|c: char| c.is_ascii_alphabetic())
        && field.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(field.to_ascii_lowercase())
    } else {
        Err(AddressError::InvalidInterface(field.to_string()))
    }
}

fn parse_primary(field: &str) -> Result<u8, AddressError> {
    parse_bus_number(field).ok_or_else(|| AddressError::InvalidPrimary(field.to_string()))
}

fn parse_secondary(field: &str) -> Result<u8, AddressError> {
    parse_bus_number(field).ok_or_else(|| AddressError::InvalidSecondary(field.to_string()))
}

fn parse_bus_number(field: &str) -> Option<u8> {
    field
        .parse::<u8>()
        .ok()
        .filter(|value| *value <= MAX_BUS_ADDRESS)
}
