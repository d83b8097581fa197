//! Message transactions: send, receive, prompt, status, lock, clear.

use bytes::{Bytes, BytesMut};
use gpibprims_binding::{Binding, BufferSelector, ErrorCode, Handle};
use tracing::info;

use crate::error::{Result, SessionError};
use crate::manager::{SessionManager, DIAG_TARGET};
use crate::retry::retry_interrupted;

/// End-of-line sequence appended to every outgoing command.
pub const EOL: &str = "\r\n";

/// `command` with the canonical end-of-line appended.
pub fn frame_command(command: &str) -> String {
    let mut framed = String::with_capacity(command.len() + EOL.len());
    framed.push_str(command);
    framed.push_str(EOL);
    framed
}

/// `raw` without trailing CR, LF and space bytes.
pub fn trim_response(raw: &[u8]) -> &[u8] {
    let end = raw
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n' | b' '))
        .map_or(0, |pos| pos + 1);
    &raw[..end]
}

impl<B: Binding> SessionManager<B> {
    /// Send `command` followed by CRLF, then flush the write buffer.
    ///
    /// Returns the framed command exactly as it went out.
    pub fn send(&self, handle: Handle, command: &str) -> Result<String> {
        let framed = frame_command(command);
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, command = %framed.escape_debug(), "sending");
        }
        if !self.registry.contains(handle) {
            return Err(self.write_failed(&framed, handle, ErrorCode::BAD_ID));
        }

        {
            let _mask = self.mask_alarm();
            let bytes = framed.as_bytes();
            let mut offset = 0;
            while offset < bytes.len() {
                let written =
                    retry_interrupted(|| self.binding.write(handle, &bytes[offset..], true))
                        .map_err(|code| self.write_failed(&framed, handle, code))?;
                if written == 0 {
                    return Err(self.write_failed(&framed, handle, ErrorCode::IO));
                }
                offset += written;
            }
        }

        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, "flushing write buffer");
        }
        retry_interrupted(|| self.binding.flush(handle, BufferSelector::Write)).map_err(
            |code| {
                let message = self.message(code);
                self.diag_failure(handle, "flush", code, &message);
                SessionError::FlushFailed {
                    command: framed.clone(),
                    handle,
                    code,
                    message,
                }
            },
        )?;

        Ok(framed)
    }

    /// Read one message terminated by `terminator`, with trailing CR, LF and
    /// space bytes removed. An empty result is not an error.
    pub fn receive(&self, handle: Handle, terminator: u8) -> Result<String> {
        let raw = self.read_message(handle, Some(terminator), self.config.read_capacity)?;
        let text = String::from_utf8_lossy(trim_response(&raw)).into_owned();
        if self.diagnostics() {
            info!(
                target: DIAG_TARGET,
                %handle,
                bytes = raw.len(),
                response = %text,
                "received"
            );
        }
        Ok(text)
    }

    /// Read up to `max_len` raw bytes, ignoring any termination character and
    /// without trimming.
    pub fn receive_bytes(&self, handle: Handle, max_len: usize) -> Result<Bytes> {
        let capacity = max_len.min(self.config.read_capacity);
        let raw = self.read_message(handle, None, capacity)?;
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, bytes = raw.len(), "received binary block");
        }
        Ok(raw)
    }

    /// Send `command` and read the reply as one transaction.
    pub fn prompt(&self, handle: Handle, command: &str) -> Result<String> {
        let framed = frame_command(command);
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, command = %framed.escape_debug(), "prompting");
        }
        let Some(timeout_ms) = self.timeout(handle) else {
            return Err(self.prompt_failed(&framed, handle, ErrorCode::BAD_ID));
        };
        self.binding.set_timeout(handle, timeout_ms);

        let mut response = BytesMut::zeroed(self.config.prompt_capacity);
        let count = {
            let _mask = self.mask_alarm();
            retry_interrupted(|| self.binding.prompt(handle, framed.as_bytes(), &mut response))
        }
        .map_err(|code| self.prompt_failed(&framed, handle, code))?;

        response.truncate(count);
        let text = String::from_utf8_lossy(trim_response(&response)).into_owned();
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, bytes = count, response = %text, "prompt answered");
        }
        Ok(text)
    }

    /// Serial-poll the status byte.
    pub fn status(&self, handle: Handle) -> Result<u8> {
        let status_byte = self
            .checked(handle)
            .and_then(|()| retry_interrupted(|| self.binding.read_status_byte(handle)))
            .map_err(|code| {
                let message = self.message(code);
                self.diag_failure(handle, "status", code, &message);
                SessionError::StatusFailed {
                    handle,
                    code,
                    message,
                }
            })?;
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, status_byte, "status byte");
        }
        Ok(status_byte)
    }

    /// Take exclusive use of the device. Returns `"<handle> locked"`.
    pub fn lock(&self, handle: Handle) -> Result<String> {
        self.checked(handle)
            .and_then(|()| retry_interrupted(|| self.binding.lock(handle)))
            .map_err(|code| {
                let message = self.message(code);
                self.diag_failure(handle, "lock", code, &message);
                SessionError::LockFailed {
                    handle,
                    code,
                    message,
                }
            })?;
        self.acknowledge(handle, "locked")
    }

    /// Release a lock. Returns `"<handle> unlocked"`.
    ///
    /// An interrupted unlock is reported as a failure unless
    /// [`SessionConfig::retry_unlock`](crate::SessionConfig::retry_unlock) is set.
    pub fn unlock(&self, handle: Handle) -> Result<String> {
        self.checked(handle)
            .and_then(|()| {
                if self.config.retry_unlock {
                    retry_interrupted(|| self.binding.unlock(handle))
                } else {
                    self.binding.unlock(handle)
                }
            })
            .map_err(|code| {
                let message = self.message(code);
                self.diag_failure(handle, "unlock", code, &message);
                SessionError::UnlockFailed {
                    handle,
                    code,
                    message,
                }
            })?;
        self.acknowledge(handle, "unlocked")
    }

    /// Device clear. Returns `"<handle> cleared"`.
    pub fn clear(&self, handle: Handle) -> Result<String> {
        self.checked(handle)
            .and_then(|()| retry_interrupted(|| self.binding.clear(handle)))
            .map_err(|code| {
                let message = self.message(code);
                self.diag_failure(handle, "clear", code, &message);
                SessionError::ClearFailed {
                    handle,
                    code,
                    message,
                }
            })?;
        self.acknowledge(handle, "cleared")
    }

    fn read_message(&self, handle: Handle, termchr: Option<u8>, capacity: usize) -> Result<Bytes> {
        let read_failed = |code: ErrorCode| {
            let message = self.message(code);
            self.diag_failure(handle, "read", code, &message);
            SessionError::ReadFailed {
                handle,
                code,
                message,
            }
        };

        let timeout_ms = self.timeout(handle).ok_or_else(|| read_failed(ErrorCode::BAD_ID))?;
        self.binding.set_timeout(handle, timeout_ms);
        self.binding.set_termchr(handle, termchr);
        self.registry.set_termchr(handle, termchr);

        let mut buf = BytesMut::zeroed(capacity);
        let outcome = {
            let _mask = self.mask_alarm();
            retry_interrupted(|| self.binding.read(handle, &mut buf))
        }
        .map_err(read_failed)?;

        buf.truncate(outcome.count);
        Ok(buf.freeze())
    }

    fn checked(&self, handle: Handle) -> std::result::Result<(), ErrorCode> {
        if self.registry.contains(handle) {
            Ok(())
        } else {
            Err(ErrorCode::BAD_ID)
        }
    }

    fn acknowledge(&self, handle: Handle, action: &str) -> Result<String> {
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, action, "instrument {action}");
        }
        Ok(format!("{handle} {action}"))
    }

    fn write_failed(&self, framed: &str, handle: Handle, code: ErrorCode) -> SessionError {
        let message = self.message(code);
        self.diag_failure(handle, "write", code, &message);
        SessionError::WriteFailed {
            command: framed.to_string(),
            handle,
            code,
            message,
        }
    }

    fn prompt_failed(&self, framed: &str, handle: Handle, code: ErrorCode) -> SessionError {
        let message = self.message(code);
        self.diag_failure(handle, "prompt", code, &message);
        SessionError::PromptFailed {
            command: framed.to_string(),
            handle,
            code,
            message,
        }
    }

    fn diag_failure(&self, handle: Handle, operation: &str, code: ErrorCode, message: &str) {
        if self.diagnostics() {
            info!(
                target: DIAG_TARGET,
                %handle,
                operation,
                code = code.raw(),
                message,
                "operation failed"
            );
        }
    }
}
