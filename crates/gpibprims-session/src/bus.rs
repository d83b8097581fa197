//! One-shot helpers that open a session, use it, and close it again.

use gpibprims_binding::{Address, AddressError, Binding, MAX_BUS_ADDRESS};
use tracing::debug;

use crate::error::Result;
use crate::manager::SessionManager;

/// Primary address conventionally taken by the bus controller itself.
pub const CONTROLLER_ADDRESS: u8 = 21;

/// Default timeout used while probing for devices.
pub const SCAN_TIMEOUT_MS: u32 = 500;

/// A device that answered a serial poll during [`find_devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDevice {
    pub primary: u8,
    pub address: String,
    pub status_byte: u8,
}

/// Send `command` to the device at `address` and return its reply.
///
/// The session is closed even when the prompt fails; a prompt failure takes
/// precedence over a close failure.
pub fn ask<B: Binding>(
    manager: &SessionManager<B>,
    address: &str,
    command: &str,
) -> Result<String> {
    let handle = manager.open(address)?;
    let response = manager.prompt(handle, command);
    let closed = manager.close(handle);
    let response = response?;
    closed?;
    Ok(response)
}

/// Serial-poll the device at `address`.
pub fn device_status<B: Binding>(manager: &SessionManager<B>, address: &str) -> Result<u8> {
    let handle = manager.open(address)?;
    let status = manager.status(handle);
    let closed = manager.close(handle);
    let status = status?;
    closed?;
    Ok(status)
}

/// Poll every primary address on `controller`'s bus and report the devices
/// that answer.
///
/// Probing uses [`SCAN_TIMEOUT_MS`] as the default timeout; the previous
/// default is restored before returning. A trailing comma on the controller
/// address is accepted, as in `lan[128.149.22.44]:gpib0,`.
pub fn find_devices<B: Binding>(
    manager: &SessionManager<B>,
    controller: &str,
) -> std::result::Result<Vec<FoundDevice>, AddressError> {
    let bus = Address::parse(controller.trim().trim_end_matches(','))?;
    let candidates = (1..=MAX_BUS_ADDRESS)
        .filter(|p| *p != CONTROLLER_ADDRESS)
        .map(|primary| bus.with_primary(primary).map(|a| (primary, a.to_string())))
        .collect::<std::result::Result<Vec<_>, AddressError>>()?;

    let previous = manager.default_timeout();
    manager.set_default_timeout(SCAN_TIMEOUT_MS);

    let mut found = Vec::new();
    for (primary, address) in candidates {
        match device_status(manager, &address) {
            Ok(status_byte) => {
                debug!(%address, status_byte, "device answered");
                found.push(FoundDevice {
                    primary,
                    address,
                    status_byte,
                });
            }
            Err(err) => debug!(%address, error = %err, "no answer"),
        }
    }

    manager.set_default_timeout(previous);
    Ok(found)
}
