use bytes::Bytes;
use gpibprims_binding::{Binding, Handle};
use tracing::warn;

use crate::error::Result;
use crate::manager::SessionManager;

const LINE_FEED: u8 = b'\n';

/// One open instrument session.
///
/// Closes itself when dropped if [`Instrument::close`] was not called.
pub struct Instrument<'m, B: Binding> {
    manager: &'m SessionManager<B>,
    handle: Handle,
    count: usize,
    open: bool,
}

impl<'m, B: Binding> Instrument<'m, B> {
    /// Open `address` through `manager`.
    pub fn open(manager: &'m SessionManager<B>, address: &str) -> Result<Self> {
        let handle = manager.open(address)?;
        Ok(Self {
            manager,
            handle,
            count: 0,
            open: true,
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Send one command line.
    pub fn write(&self, command: &str) -> Result<String> {
        self.manager.send(self.handle, command)
    }

    /// Read one line-feed terminated response.
    pub fn read(&mut self) -> Result<String> {
        let response = self.manager.receive(self.handle, LINE_FEED)?;
        self.count = response.len();
        Ok(response)
    }

    /// Read up to `max_len` raw bytes.
    pub fn read_bytes(&mut self, max_len: usize) -> Result<Bytes> {
        let response = self.manager.receive_bytes(self.handle, max_len)?;
        self.count = response.len();
        Ok(response)
    }

    /// Send `command` and return the reply.
    pub fn ask(&self, command: &str) -> Result<String> {
        self.manager.prompt(self.handle, command)
    }

    pub fn status(&self) -> Result<u8> {
        self.manager.status(self.handle)
    }

    pub fn clear(&self) -> Result<String> {
        self.manager.clear(self.handle)
    }

    pub fn lock(&self) -> Result<String> {
        self.manager.lock(self.handle)
    }

    pub fn unlock(&self) -> Result<String> {
        self.manager.unlock(self.handle)
    }

    /// Timeout for this session only.
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<u32> {
        self.manager.set_timeout(self.handle, timeout_ms)
    }

    /// Length of the most recent read.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Close the session, reporting any failure.
    pub fn close(mut self) -> Result<String> {
        self.open = false;
        self.manager.close(self.handle)
    }
}

impl<B: Binding> Drop for Instrument<'_, B> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.manager.close(self.handle) {
                warn!(handle = %self.handle, error = %err, "failed to close instrument");
            }
        }
    }
}

impl<B: Binding> std::fmt::Debug for Instrument<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("handle", &self.handle)
            .field("count", &self.count)
            .field("open", &self.open)
            .finish()
    }
}
