//! GPIB instrument driver core.
//!
//! gpibprims drives command/response instruments on an IEEE-488 style bus:
//! opening devices by address, sending commands, reading replies, serial
//! polls and locking, with interrupted calls retried and the bus timeout
//! signal masked around blocking I/O.
//!
//! # Crate Structure
//!
//! - [`binding`]: the primitive bus contract, address grammar, simulated bus
//!   and LAN gateway binding
//! - [`session`]: session manager, message transactions and the
//!   [`Instrument`](session::Instrument) wrapper
//!
//! ```
//! use gpibprims::binding::SimulatedBus;
//! use gpibprims::session::SessionManager;
//!
//! let manager = SessionManager::new(SimulatedBus::auto_attach());
//! let handle = manager.open("gpib0,19").unwrap();
//! assert_eq!(manager.send(handle, "*IDN?").unwrap(), "*IDN?\r\n");
//! assert!(manager.receive(handle, b'\n').unwrap().starts_with("gpibprims,SIMULATED,19"));
//! assert_eq!(manager.close(handle).unwrap(), format!("{handle} closed"));
//! ```

/// Re-export binding types.
pub mod binding {
    pub use gpibprims_binding::*;
}

/// Re-export session types.
pub mod session {
    pub use gpibprims_session::*;
}
