//! Instrument bus binding contract.
//!
//! This is the lowest layer of gpibprims. A [`Binding`] exposes the primitive
//! open/close/read/write/lock/status-byte operations of a bus library against
//! an address string. Everything above it (session registry, interrupt retry,
//! signal masking, message framing) lives in `gpibprims-session`.
//!
//! Two bindings ship with the crate:
//! - [`SimulatedBus`]: in-memory instruments with fault injection, for tests
//!   and offline use
//! - [`LanGateway`]: a LAN-to-GPIB gateway reached over TCP

pub mod address;
pub mod error;
pub mod gateway;
pub mod sim;
pub mod traits;

pub use address::{Address, MAX_BUS_ADDRESS};
pub use error::{AddressError, ErrorCode};
pub use gateway::{LanGateway, DEFAULT_GATEWAY_PORT};
pub use sim::{Primitive, SimDevice, SimulatedBus};
pub use traits::{Binding, BufferSelector, Handle, ReadOutcome, TermReason};
