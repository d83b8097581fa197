use std::fmt;
use std::io;

use gpibprims_binding::{AddressError, ErrorCode};
use gpibprims_session::SessionError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn address_error(context: &str, err: AddressError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    let code = match (&err, err.code()) {
        (_, ErrorCode::TIMEOUT) => TIMEOUT,
        (SessionError::OpenFailed { .. }, ErrorCode::SYNTAX | ErrorCode::BAD_ADDRESS) => USAGE,
        (SessionError::OpenFailed { .. }, ErrorCode::NOT_SUPPORTED) => USAGE,
        (
            _,
            ErrorCode::NO_CONNECTION | ErrorCode::NO_DEVICE | ErrorCode::IO | ErrorCode::OS,
        ) => TRANSPORT_ERROR,
        (_, ErrorCode::DATA | ErrorCode::OVERFLOW) => DATA_INVALID,
        (_, ErrorCode::INTERNAL) => INTERNAL,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpibprims_binding::Handle;

    fn read_failed(code: ErrorCode) -> SessionError {
        SessionError::ReadFailed {
            handle: Handle::new(4).unwrap(),
            code,
            message: code.description().to_string(),
        }
    }

    #[test]
    fn session_errors_map_to_exit_codes() {
        assert_eq!(session_error("read", read_failed(ErrorCode::TIMEOUT)).code, TIMEOUT);
        assert_eq!(
            session_error("read", read_failed(ErrorCode::NO_CONNECTION)).code,
            TRANSPORT_ERROR
        );
        assert_eq!(session_error("read", read_failed(ErrorCode::DATA)).code, DATA_INVALID);
        assert_eq!(session_error("read", read_failed(ErrorCode::LOCKED)).code, FAILURE);

        let bad_address = SessionError::OpenFailed {
            address: "lan[x".into(),
            code: ErrorCode::SYNTAX,
            message: "syntax error".into(),
        };
        let err = session_error("open failed", bad_address);
        assert_eq!(err.code, USAGE);
        assert_eq!(
            err.message,
            "open failed: open of bus address lan[x failed: syntax error"
        );
    }

    #[test]
    fn io_errors_map_to_exit_codes() {
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(io_error("read devices", missing).code, USAGE);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(io_error("read devices", denied).code, PERMISSION_DENIED);
    }
}
