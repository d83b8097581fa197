//! Instrument driver core.
//!
//! [`SessionManager`] sits on top of any [`Binding`] and provides the
//! session and transaction model callers actually use:
//! - open/close against bus addresses, with per-handle timeout state
//! - transparent retry of calls interrupted by a signal
//! - `SIGALRM` masking around long-running I/O primitives
//! - send/receive/prompt framing (CRLF out, trailing whitespace stripped in)
//! - status byte, lock/unlock and device clear
//!
//! [`Instrument`] and the helpers in [`bus`] wrap the manager for the common
//! open-use-close patterns.
//!
//! [`Binding`]: gpibprims_binding::Binding

pub mod bus;
pub mod config;
pub mod error;
pub mod instrument;
pub mod manager;
pub mod registry;
pub mod retry;
pub mod signal;
mod transaction;

pub use bus::{
    ask, device_status, find_devices, FoundDevice, CONTROLLER_ADDRESS, SCAN_TIMEOUT_MS,
};
pub use config::{
    SessionConfig, DEFAULT_PROMPT_CAPACITY, DEFAULT_READ_CAPACITY, DEFAULT_TIMEOUT_MS,
};
pub use error::{Result, SessionError};
pub use instrument::Instrument;
pub use manager::{SessionManager, DIAG_TARGET};
pub use retry::retry_interrupted;
pub use signal::SignalMaskGuard;
pub use transaction::{frame_command, trim_response, EOL};
