use std::fmt;
use std::num::NonZeroU32;

use crate::error::ErrorCode;

/// Opaque identifier of one open bus session.
///
/// Handles are issued by [`Binding::open`]. Zero is reserved as the "open
/// failed" sentinel, so a `Handle` is never zero. No arithmetic is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Wrap a raw session identifier. Returns `None` for the zero sentinel.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw identifier, for display or handing to an outer caller.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> Self {
        handle.get()
    }
}

/// Which formatted-I/O buffer a flush applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSelector {
    /// Push buffered output to the device.
    Write,
    /// Drop any queued input.
    DiscardRead,
    /// Drop any queued output without sending it.
    DiscardWrite,
}

/// Why a read stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermReason {
    /// The caller's buffer filled up.
    MaxCount,
    /// The configured termination character arrived.
    Termchr,
    /// The device signalled end of message.
    End,
}

/// Result of a successful read primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes stored at the front of the caller's buffer.
    pub count: usize,
    /// What ended the read.
    pub reason: TermReason,
}

/// Primitive operations a bus library exposes to the driver core.
///
/// Every blocking primitive may fail with [`ErrorCode::INTERRUPTED`]; callers
/// are expected to re-issue the call with identical arguments in that case.
/// Bindings are shared between threads, so methods take `&self`.
pub trait Binding: Send + Sync {
    /// Open a session on `address`. `None` means failure; consult
    /// [`Binding::last_error`] for the reason.
    fn open(&self, address: &str) -> Option<Handle>;

    /// Close a session.
    fn close(&self, handle: Handle) -> Result<(), ErrorCode>;

    /// Timeout for subsequent blocking calls on `handle`, in milliseconds.
    /// Zero disables the timeout.
    fn set_timeout(&self, handle: Handle, timeout_ms: u32);

    /// Termination character for subsequent reads; `None` reads until the
    /// device signals end of message.
    fn set_termchr(&self, handle: Handle, termchr: Option<u8>);

    /// Write `data`, asserting end-of-message after the last byte when `end`
    /// is set. Returns the number of bytes accepted.
    fn write(&self, handle: Handle, data: &[u8], end: bool) -> Result<usize, ErrorCode>;

    /// Flush or discard a formatted-I/O buffer.
    fn flush(&self, handle: Handle, buffer: BufferSelector) -> Result<(), ErrorCode>;

    /// Read into `buf` until the termination character, end of message, or
    /// a full buffer.
    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<ReadOutcome, ErrorCode>;

    /// Send `command` and read the response into `response` as one
    /// transaction. Returns the response length.
    fn prompt(&self, handle: Handle, command: &[u8], response: &mut [u8])
        -> Result<usize, ErrorCode>;

    /// Acquire exclusive use of the device for this session.
    fn lock(&self, handle: Handle) -> Result<(), ErrorCode>;

    /// Release a lock taken with [`Binding::lock`].
    fn unlock(&self, handle: Handle) -> Result<(), ErrorCode>;

    /// Serial-poll the device status byte.
    fn read_status_byte(&self, handle: Handle) -> Result<u8, ErrorCode>;

    /// Device clear; also discards both formatted-I/O buffers.
    fn clear(&self, handle: Handle) -> Result<(), ErrorCode> {
        let _ = handle;
        Err(ErrorCode::NOT_SUPPORTED)
    }

    /// The code of the most recent failure, if any.
    fn last_error(&self) -> Option<ErrorCode>;

    /// Human-readable text for `code`.
    fn error_string(&self, code: ErrorCode) -> String {
        code.description().to_string()
    }

    /// Binding name for diagnostics.
    fn binding_name(&self) -> &'static str;
}

impl<B: Binding + ?Sized> Binding for Box<B> {
    fn open(&self, address: &str) -> Option<Handle> {
        (**self).open(address)
    }

    fn close(&self, handle: Handle) -> Result<(), ErrorCode> {
        (**self).close(handle)
    }

    fn set_timeout(&self, handle: Handle, timeout_ms: u32) {
        (**self).set_timeout(handle, timeout_ms)
    }

    fn set_termchr(&self, handle: Handle, termchr: Option<u8>) {
        (**self).set_termchr(handle, termchr)
    }

    fn write(&self, handle: Handle, data: &[u8], end: bool) -> Result<usize, ErrorCode> {
        (**self).write(handle, data, end)
    }

    fn flush(&self, handle: Handle, buffer: BufferSelector) -> Result<(), ErrorCode> {
        (**self).flush(handle, buffer)
    }

    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<ReadOutcome, ErrorCode> {
        (**self).read(handle, buf)
    }

    fn prompt(
        &self,
        handle: Handle,
        command: &[u8],
        response: &mut [u8],
    ) -> Result<usize, ErrorCode> {
        (**self).prompt(handle, command, response)
    }

    fn lock(&self, handle: Handle) -> Result<(), ErrorCode> {
        (**self).lock(handle)
    }

    fn unlock(&self, handle: Handle) -> Result<(), ErrorCode> {
        (**self).unlock(handle)
    }

    fn read_status_byte(&self, handle: Handle) -> Result<u8, ErrorCode> {
        (**self).read_status_byte(handle)
    }

    fn clear(&self, handle: Handle) -> Result<(), ErrorCode> {
        (**self).clear(handle)
    }

    fn last_error(&self) -> Option<ErrorCode> {
        (**self).last_error()
    }

    fn error_string(&self, code: ErrorCode) -> String {
        (**self).error_string(code)
    }

    fn binding_name(&self) -> &'static str {
        (**self).binding_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert!(Handle::new(0).is_none());
        assert_eq!(Handle::new(4).map(Handle::get), Some(4));
    }

    #[test]
    fn handle_displays_as_plain_integer() {
        let handle = Handle::new(17).unwrap();
        assert_eq!(handle.to_string(), "17");
        assert_eq!(u32::from(handle), 17);
    }

    #[test]
    fn default_clear_is_unsupported() {
        struct Bare;

        impl Binding for Bare {
            fn open(&self, _address: &str) -> Option<Handle> {
                None
            }
            fn close(&self, _handle: Handle) -> Result<(), ErrorCode> {
                Ok(())
            }
            fn set_timeout(&self, _handle: Handle, _timeout_ms: u32) {}
            fn set_termchr(&self, _handle: Handle, _termchr: Option<u8>) {}
            fn write(&self, _handle: Handle, data: &[u8], _end: bool) -> Result<usize, ErrorCode> {
                Ok(data.len())
            }
            fn flush(&self, _handle: Handle, _buffer: BufferSelector) -> Result<(), ErrorCode> {
                Ok(())
            }
            fn read(&self, _handle: Handle, _buf: &mut [u8]) -> Result<ReadOutcome, ErrorCode> {
                Err(ErrorCode::TIMEOUT)
            }
            fn prompt(
                &self,
                _handle: Handle,
                _command: &[u8],
                _response: &mut [u8],
            ) -> Result<usize, ErrorCode> {
                Err(ErrorCode::TIMEOUT)
            }
            fn lock(&self, _handle: Handle) -> Result<(), ErrorCode> {
                Ok(())
            }
            fn unlock(&self, _handle: Handle) -> Result<(), ErrorCode> {
                Ok(())
            }
            fn read_status_byte(&self, _handle: Handle) -> Result<u8, ErrorCode> {
                Ok(0)
            }
            fn last_error(&self) -> Option<ErrorCode> {
                None
            }
            fn binding_name(&self) -> &'static str {
                "bare"
            }
        }

        let boxed: Box<dyn Binding> = Box::new(Bare);
        let handle = Handle::new(1).unwrap();
        assert_eq!(boxed.clear(handle), Err(ErrorCode::NOT_SUPPORTED));
        assert_eq!(boxed.error_string(ErrorCode::TIMEOUT), "timeout occurred");
        assert_eq!(boxed.binding_name(), "bare");
    }
}
