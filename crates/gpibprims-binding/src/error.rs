use std::fmt;
use std::io;

/// A failure status reported by a bus binding primitive.
///
/// Codes are small integers owned by the binding. The session layer never
/// interprets them beyond [`ErrorCode::is_interrupt`]; everything else is
/// carried through to the caller together with [`ErrorCode::description`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{}", self.description())]
pub struct ErrorCode(i32);

impl ErrorCode {
    /// Malformed address string.
    pub const SYNTAX: Self = Self(1);
    /// Address is well formed but names nothing this binding can reach.
    pub const BAD_ADDRESS: Self = Self(3);
    /// Session identifier is not open.
    pub const BAD_ID: Self = Self(4);
    /// Invalid parameter.
    pub const PARAM: Self = Self(5);
    /// Connection to the bus or gateway could not be established or was lost.
    pub const NO_CONNECTION: Self = Self(6);
    /// Operation not supported by this binding or session type.
    pub const NOT_SUPPORTED: Self = Self(8);
    /// Device is locked by another session.
    pub const LOCKED: Self = Self(11);
    /// Unlock requested on a session that does not hold the lock.
    pub const NOT_LOCKED: Self = Self(12);
    /// Device returned data that could not be interpreted.
    pub const DATA: Self = Self(14);
    /// The operation did not complete within the session timeout.
    pub const TIMEOUT: Self = Self(15);
    /// Buffer overflow.
    pub const OVERFLOW: Self = Self(16);
    /// Generic I/O failure.
    pub const IO: Self = Self(17);
    /// Operating system error.
    pub const OS: Self = Self(18);
    /// No device answers at the address.
    pub const NO_DEVICE: Self = Self(20);
    /// Internal binding failure.
    pub const INTERNAL: Self = Self(25);
    /// The blocking call was interrupted by an asynchronous signal.
    pub const INTERRUPTED: Self = Self(128);

    /// Wrap a raw binding status code.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw integer code.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether the call should be re-issued rather than reported.
    pub const fn is_interrupt(self) -> bool {
        self.0 == Self::INTERRUPTED.0
    }

    /// Human-readable text for the code.
    pub fn description(self) -> &'static str {
        match self {
            Self::SYNTAX => "syntax error",
            Self::BAD_ADDRESS => "bad address",
            Self::BAD_ID => "invalid session identifier",
            Self::PARAM => "invalid parameter",
            Self::NO_CONNECTION => "no connection",
            Self::NOT_SUPPORTED => "operation not supported",
            Self::LOCKED => "locked by another session",
            Self::NOT_LOCKED => "session not locked",
            Self::DATA => "invalid data",
            Self::TIMEOUT => "timeout occurred",
            Self::OVERFLOW => "buffer overflow",
            Self::IO => "I/O error",
            Self::OS => "operating system error",
            Self::NO_DEVICE => "device not found",
            Self::INTERNAL => "internal error",
            Self::INTERRUPTED => "process interrupted",
            _ => "unknown error",
        }
    }

    /// Map a socket/OS error onto the binding code space.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted => Self::INTERRUPTED,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TIMEOUT,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::NO_CONNECTION,
            io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable => Self::BAD_ADDRESS,
            io::ErrorKind::InvalidInput => Self::PARAM,
            _ => Self::IO,
        }
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCode({}: {})", self.0, self.description())
    }
}

/// Errors produced while parsing a bus address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The address string is empty.
    #[error("address is empty")]
    Empty,

    /// A `lan[` prefix without the closing `]:`.
    #[error("unterminated host in {0:?} (expected lan[host]:...)")]
    UnterminatedHost(String),

    /// `lan[]` with nothing inside the brackets.
    #[error("empty host in {0:?}")]
    EmptyHost(String),

    /// A local address that does not start with an interface name.
    #[error("missing interface name in {0:?}")]
    MissingInterface(String),

    /// The interface name contains characters other than ASCII letters and digits.
    #[error("invalid interface name {0:?}")]
    InvalidInterface(String),

    /// Primary address outside 0..=30 or not a number.
    #[error("invalid primary address {0:?} (expected 0..=30)")]
    InvalidPrimary(String),

    /// Secondary address outside 0..=30 or not a number.
    #[error("invalid secondary address {0:?} (expected 0..=30)")]
    InvalidSecondary(String),

    /// More comma-separated fields than interface, primary, secondary.
    #[error("unexpected trailing field {0:?}")]
    TrailingField(String),
}

impl From<AddressError> for ErrorCode {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::InvalidPrimary(_) | AddressError::InvalidSecondary(_) => {
                ErrorCode::BAD_ADDRESS
            }
            _ => ErrorCode::SYNTAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_is_the_only_retryable_code() {
        assert!(ErrorCode::INTERRUPTED.is_interrupt());
        assert!(!ErrorCode::TIMEOUT.is_interrupt());
        assert!(!ErrorCode::new(0).is_interrupt());
    }

    #[test]
    fn unknown_codes_still_describe_themselves() {
        assert_eq!(ErrorCode::new(9999).description(), "unknown error");
        assert_eq!(ErrorCode::TIMEOUT.to_string(), "timeout occurred");
    }

    #[test]
    fn io_errors_map_to_binding_codes() {
        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let other = io::Error::other("boom");

        assert_eq!(ErrorCode::from_io(&interrupted), ErrorCode::INTERRUPTED);
        assert_eq!(ErrorCode::from_io(&timed_out), ErrorCode::TIMEOUT);
        assert_eq!(ErrorCode::from_io(&refused), ErrorCode::NO_CONNECTION);
        assert_eq!(ErrorCode::from_io(&other), ErrorCode::IO);
    }

    #[test]
    fn address_errors_map_to_syntax_or_bad_address() {
        assert_eq!(ErrorCode::from(AddressError::Empty), ErrorCode::SYNTAX);
        assert_eq!(
            ErrorCode::from(AddressError::InvalidPrimary("31".into())),
            ErrorCode::BAD_ADDRESS
        );
    }
}
