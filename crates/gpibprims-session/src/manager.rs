//! Session manager: open/close, per-handle settings and the diagnostics flag.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use gpibprims_binding::{Binding, ErrorCode, Handle};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::registry::Registry;
use crate::signal::SignalMaskGuard;

/// Tracing target of diagnostics events.
pub const DIAG_TARGET: &str = "gpibprims::diag";

/// Owns a binding and every session opened through it.
///
/// The default timeout and the diagnostics flag are shared by all handles and
/// can change at any time; everything else about a session lives in the
/// registry under its handle. All methods take `&self`, so a manager can be
/// shared between threads.
pub struct SessionManager<B: Binding> {
    pub(crate) binding: B,
    pub(crate) registry: Registry,
    pub(crate) config: SessionConfig,
    default_timeout_ms: AtomicU32,
    diagnostics: AtomicBool,
}

impl<B: Binding> SessionManager<B> {
    /// Create a manager with default configuration.
    pub fn new(binding: B) -> Self {
        Self::with_config(binding, SessionConfig::default())
    }

    /// Create a manager with explicit configuration.
    pub fn with_config(binding: B, config: SessionConfig) -> Self {
        Self {
            default_timeout_ms: AtomicU32::new(config.default_timeout_ms),
            diagnostics: AtomicBool::new(config.diagnostics),
            binding,
            registry: Registry::new(),
            config,
        }
    }

    /// Borrow the underlying binding.
    pub fn binding(&self) -> &B {
        &self.binding
    }

    /// Configuration the manager was created with. The live default timeout
    /// and diagnostics flag are read through their own accessors.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session on `address`.
    ///
    /// The new handle starts with the current default timeout.
    pub fn open(&self, address: &str) -> Result<Handle> {
        if self.diagnostics() {
            info!(target: DIAG_TARGET, address, "opening instrument");
        }

        let Some(handle) = self.binding.open(address) else {
            let code = self.binding.last_error().unwrap_or(ErrorCode::INTERNAL);
            let message = self.binding.error_string(code);
            if self.diagnostics() {
                info!(target: DIAG_TARGET, address, code = code.raw(), %message, "open failed");
            }
            return Err(SessionError::OpenFailed {
                address: address.to_string(),
                code,
                message,
            });
        };

        let timeout_ms = self.default_timeout();
        self.binding.set_timeout(handle, timeout_ms);
        self.registry.insert(handle, address, timeout_ms);

        debug!(
            %handle,
            address,
            timeout_ms,
            binding = self.binding.binding_name(),
            "session opened"
        );
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, address, "instrument opened");
        }
        Ok(handle)
    }

    /// Close a session. The handle is invalid afterwards.
    ///
    /// Returns `"<handle> closed"`.
    pub fn close(&self, handle: Handle) -> Result<String> {
        if !self.registry.contains(handle) {
            return Err(self.close_failed(handle, ErrorCode::BAD_ID));
        }
        self.binding
            .close(handle)
            .map_err(|code| self.close_failed(handle, code))?;
        self.registry.remove(handle);

        debug!(%handle, "session closed");
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, "instrument closed");
        }
        Ok(format!("{handle} closed"))
    }

    /// Timeout given to handles opened from now on. Returns the new value.
    ///
    /// Handles that are already open keep their own timeout; use
    /// [`SessionManager::set_timeout`] to change one of those.
    pub fn set_default_timeout(&self, timeout_ms: u32) -> u32 {
        self.default_timeout_ms.store(timeout_ms, Ordering::Relaxed);
        debug!(timeout_ms, "default timeout changed");
        timeout_ms
    }

    pub fn default_timeout(&self) -> u32 {
        self.default_timeout_ms.load(Ordering::Relaxed)
    }

    /// Turn verbose per-transaction tracing on or off. Returns the new value.
    pub fn set_diagnostics(&self, enabled: bool) -> bool {
        self.diagnostics.store(enabled, Ordering::Relaxed);
        enabled
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics.load(Ordering::Relaxed)
    }

    /// Change the timeout of one open handle. Returns the new value.
    pub fn set_timeout(&self, handle: Handle, timeout_ms: u32) -> Result<u32> {
        if !self.registry.set_timeout(handle, timeout_ms) {
            return Err(SessionError::InvalidHandle { handle });
        }
        self.binding.set_timeout(handle, timeout_ms);
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, timeout_ms, "timeout changed");
        }
        Ok(timeout_ms)
    }

    /// Timeout of an open handle.
    pub fn timeout(&self, handle: Handle) -> Option<u32> {
        self.registry.get(handle).map(|state| state.timeout_ms)
    }

    /// Termination character used by the handle's most recent receive.
    pub fn terminator(&self, handle: Handle) -> Option<u8> {
        self.registry.get(handle).and_then(|state| state.termchr)
    }

    /// Address an open handle was opened with.
    pub fn address(&self, handle: Handle) -> Option<String> {
        self.registry.get(handle).map(|state| state.address)
    }

    pub fn is_open(&self, handle: Handle) -> bool {
        self.registry.contains(handle)
    }

    /// Open handles in ascending order.
    pub fn open_handles(&self) -> Vec<Handle> {
        self.registry.handles()
    }

    pub(crate) fn message(&self, code: ErrorCode) -> String {
        self.binding.error_string(code)
    }

    /// Mask `SIGALRM` for the duration of one long-running primitive.
    pub(crate) fn mask_alarm(&self) -> SignalMaskGuard {
        if self.config.mask_alarm {
            SignalMaskGuard::block_alarm()
        } else {
            SignalMaskGuard::disabled()
        }
    }

    fn close_failed(&self, handle: Handle, code: ErrorCode) -> SessionError {
        let message = self.message(code);
        if self.diagnostics() {
            info!(target: DIAG_TARGET, %handle, code = code.raw(), %message, "close failed");
        }
        SessionError::CloseFailed {
            handle,
            code,
            message,
        }
    }
}

impl<B: Binding> Drop for SessionManager<B> {
    fn drop(&mut self) {
        for handle in self.registry.handles() {
            match self.binding.close(handle) {
                Ok(()) => debug!(%handle, "session closed on shutdown"),
                Err(code) => warn!(%handle, error = %code, "failed to close session on shutdown"),
            }
        }
    }
}

impl<B: Binding> std::fmt::Debug for SessionManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("binding", &self.binding.binding_name())
            .field("open_handles", &self.registry.len())
            .field("default_timeout_ms", &self.default_timeout())
            .field("diagnostics", &self.diagnostics())
            .finish()
    }
}
