//! Per-handle state of open sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gpibprims_binding::Handle;

/// Per-handle state kept by the driver core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Address string the session was opened with.
    pub address: String,
    /// Timeout applied before each receive and prompt.
    pub timeout_ms: u32,
    /// Termination character used by the most recent receive.
    pub termchr: Option<u8>,
}

/// Open handles and their configuration.
///
/// A handle is present from a successful open until a successful close.
/// Every mutation is a single map operation, so a poisoned lock still guards
/// consistent state and is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<Handle, SessionState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly opened handle.
    pub fn insert(&self, handle: Handle, address: impl Into<String>, timeout_ms: u32) {
        self.sessions().insert(
            handle,
            SessionState {
                address: address.into(),
                timeout_ms,
                termchr: None,
            },
        );
    }

    /// Forget a closed handle.
    pub fn remove(&self, handle: Handle) -> Option<SessionState> {
        self.sessions().remove(&handle)
    }

    /// Snapshot of one handle's state.
    pub fn get(&self, handle: Handle) -> Option<SessionState> {
        self.sessions().get(&handle).cloned()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.sessions().contains_key(&handle)
    }

    /// Change one handle's timeout. Returns `false` if the handle is not open.
    pub fn set_timeout(&self, handle: Handle, timeout_ms: u32) -> bool {
        self.update(handle, |state| state.timeout_ms = timeout_ms)
    }

    /// Record the termination character last applied to a handle.
    pub fn set_termchr(&self, handle: Handle, termchr: Option<u8>) -> bool {
        self.update(handle, |state| state.termchr = termchr)
    }

    /// Open handles in ascending order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.sessions().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    fn update(&self, handle: Handle, f: impl FnOnce(&mut SessionState)) -> bool {
        match self.sessions().get_mut(&handle) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Handle, SessionState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
