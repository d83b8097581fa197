use gpibprims_binding::{ErrorCode, Handle};

/// Errors returned by driver-core operations.
///
/// Every variant carries the binding's numeric code and its text. Interrupted
/// calls never appear here; they are retried until they resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The binding refused to open the address.
    #[error("open of bus address {address} failed: {message}")]
    OpenFailed {
        address: String,
        code: ErrorCode,
        message: String,
    },

    #[error("closing instrument {handle} failed: {message}")]
    CloseFailed {
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    /// The framed command could not be written.
    #[error("write of {command:?} to instrument {handle} failed: {message}")]
    WriteFailed {
        command: String,
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    /// The command was written but the write buffer could not be flushed.
    #[error("flush of {command:?} to instrument {handle} failed: {message}")]
    FlushFailed {
        command: String,
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    #[error("input from instrument {handle} failed: {message}")]
    ReadFailed {
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    #[error("prompt of {command:?} to instrument {handle} failed: {message}")]
    PromptFailed {
        command: String,
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    #[error("locking instrument {handle} failed: {message}")]
    LockFailed {
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    #[error("unlocking instrument {handle} failed: {message}")]
    UnlockFailed {
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    #[error("status request of instrument {handle} failed: {message}")]
    StatusFailed {
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    #[error("clearing instrument {handle} failed: {message}")]
    ClearFailed {
        handle: Handle,
        code: ErrorCode,
        message: String,
    },

    /// A per-handle setting was changed on a handle that is not open.
    #[error("instrument {handle} is not open")]
    InvalidHandle { handle: Handle },
}

impl SessionError {
    /// The binding error code behind this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::OpenFailed { code, .. }
            | Self::CloseFailed { code, .. }
            | Self::WriteFailed { code, .. }
            | Self::FlushFailed { code, .. }
            | Self::ReadFailed { code, .. }
            | Self::PromptFailed { code, .. }
            | Self::LockFailed { code, .. }
            | Self::UnlockFailed { code, .. }
            | Self::StatusFailed { code, .. }
            | Self::ClearFailed { code, .. } => *code,
            Self::InvalidHandle { .. } => ErrorCode::BAD_ID,
        }
    }

    /// The handle the failing operation targeted. `None` for open failures,
    /// which have no handle yet.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::OpenFailed { .. } => None,
            Self::CloseFailed { handle, .. }
            | Self::WriteFailed { handle, .. }
            | Self::FlushFailed { handle, .. }
            | Self::ReadFailed { handle, .. }
            | Self::PromptFailed { handle, .. }
            | Self::LockFailed { handle, .. }
            | Self::UnlockFailed { handle, .. }
            | Self::StatusFailed { handle, .. }
            | Self::ClearFailed { handle, .. }
            | Self::InvalidHandle { handle } => Some(*handle),
        }
    }

    /// Whether the binding gave up waiting on the device.
    pub fn is_timeout(&self) -> bool {
        self.code() == ErrorCode::TIMEOUT
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
