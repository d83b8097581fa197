//! In-memory bus with scripted instruments.
//!
//! [`SimulatedBus`] implements [`Binding`] without any hardware. Devices are
//! attached by address and answer from a queue of canned responses. Faults
//! (interrupted calls, hard failures) can be injected per primitive, and every
//! call is counted and tagged with whether `SIGALRM` was blocked at the time,
//! so callers can check how the driver core wraps each primitive.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::address::Address;
use crate::error::{AddressError, ErrorCode};
use crate::traits::{Binding, BufferSelector, Handle, ReadOutcome, TermReason};

// Session ids follow descriptor numbering: 0-2 are the standard streams and
// 3 belongs to the bus controller.
const FIRST_SESSION_ID: u32 = 4;

/// Binding primitive, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Open,
    Close,
    Write,
    Flush,
    Read,
    Prompt,
    Lock,
    Unlock,
    ReadStatusByte,
    Clear,
}

/// Scripted behaviour of one simulated instrument.
#[derive(Debug, Clone, Default)]
pub struct SimDevice {
    identity: Option<String>,
    status_byte: u8,
    responses: VecDeque<Vec<u8>>,
}

impl SimDevice {
    /// A silent device with status byte 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `*IDN?` with `identity`.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Status byte returned by serial poll and `*STB?`.
    pub fn with_status_byte(mut self, status_byte: u8) -> Self {
        self.status_byte = status_byte;
        self
    }

    /// Queue a raw response for the next read or prompt.
    pub fn with_response(mut self, response: impl Into<Vec<u8>>) -> Self {
        self.responses.push_back(response.into());
        self
    }
}

#[derive(Default)]
struct DeviceState {
    device: SimDevice,
    pending: Vec<u8>,
    written: Vec<Vec<u8>>,
    interrupts: HashMap<Primitive, u32>,
    failures: HashMap<Primitive, ErrorCode>,
    calls: HashMap<Primitive, usize>,
    alarm_blocked: HashMap<Primitive, bool>,
    lock_owner: Option<Handle>,
}

impl DeviceState {
    fn new(device: SimDevice) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    fn observe(&mut self, primitive: Primitive) -> Result<(), ErrorCode> {
        *self.calls.entry(primitive).or_default() += 1;
        self.alarm_blocked.insert(primitive, alarm_blocked());

        if let Some(remaining) = self.interrupts.get_mut(&primitive) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ErrorCode::INTERRUPTED);
            }
        }
        match self.failures.get(&primitive) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn respond_to(&mut self, message: &[u8]) {
        let end = message
            .iter()
            .rposition(|b| !matches!(b, b'\r' | b'\n' | b' '))
            .map_or(0, |pos| pos + 1);
        let query = &message[..end];

        if query.eq_ignore_ascii_case(b"*IDN?") {
            if let Some(identity) = &self.device.identity {
                let reply = format!("{identity}\r\n").into_bytes();
                self.device.responses.push_back(reply);
            }
        } else if query.eq_ignore_ascii_case(b"*STB?") {
            let reply = format!("{}\r\n", self.device.status_byte).into_bytes();
            self.device.responses.push_back(reply);
        }
    }
}

struct SessionState {
    address: String,
    timeout_ms: u32,
    termchr: Option<u8>,
}

struct Inner {
    devices: HashMap<String, DeviceState>,
    sessions: HashMap<Handle, SessionState>,
    next_id: u32,
    last_error: Option<ErrorCode>,
    auto_attach: bool,
}

impl Inner {
    fn record<T>(&mut self, result: Result<T, ErrorCode>) -> Result<T, ErrorCode> {
        if let Err(code) = &result {
            self.last_error = Some(*code);
        }
        result
    }

    /// Resolve a session to its device and account for the call.
    fn enter(&mut self, handle: Handle, primitive: Primitive) -> Result<&mut DeviceState, ErrorCode> {
        let key = self
            .sessions
            .get(&handle)
            .map(|session| session.address.clone())
            .ok_or(ErrorCode::BAD_ID)?;
        let device = self.devices.get_mut(&key).ok_or(ErrorCode::NO_DEVICE)?;
        device.observe(primitive)?;
        Ok(device)
    }

    fn open(&mut self, address: &str) -> Result<Handle, ErrorCode> {
        let parsed = Address::parse(address).map_err(ErrorCode::from)?;
        let key = parsed.to_string();

        if !self.devices.contains_key(&key) {
            if !self.auto_attach {
                return Err(ErrorCode::NO_DEVICE);
            }
            let device = SimDevice::new().with_identity(default_identity(&parsed));
            self.devices.insert(key.clone(), DeviceState::new(device));
        }
        if let Some(device) = self.devices.get_mut(&key) {
            device.observe(Primitive::Open)?;
        }

        let handle = Handle::new(self.next_id).ok_or(ErrorCode::INTERNAL)?;
        self.next_id = self.next_id.checked_add(1).ok_or(ErrorCode::INTERNAL)?;
        self.sessions.insert(
            handle,
            SessionState {
                address: key,
                timeout_ms: 0,
                termchr: None,
            },
        );
        debug!(%handle, address, "simulated session opened");
        Ok(handle)
    }

    fn close(&mut self, handle: Handle) -> Result<(), ErrorCode> {
        let device = self.enter(handle, Primitive::Close)?;
        if device.lock_owner == Some(handle) {
            device.lock_owner = None;
        }
        self.sessions.remove(&handle);
        debug!(%handle, "simulated session closed");
        Ok(())
    }

    fn write(&mut self, handle: Handle, data: &[u8]) -> Result<usize, ErrorCode> {
        let device = self.enter(handle, Primitive::Write)?;
        device.pending.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self, handle: Handle, buffer: BufferSelector) -> Result<(), ErrorCode> {
        let device = self.enter(handle, Primitive::Flush)?;
        match buffer {
            BufferSelector::Write => {
                if !device.pending.is_empty() {
                    let message = std::mem::take(&mut device.pending);
                    device.respond_to(&message);
                    device.written.push(message);
                }
            }
            BufferSelector::DiscardWrite => device.pending.clear(),
            BufferSelector::DiscardRead => device.device.responses.clear(),
        }
        Ok(())
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<ReadOutcome, ErrorCode> {
        let termchr = self
            .sessions
            .get(&handle)
            .and_then(|session| session.termchr);
        let device = self.enter(handle, Primitive::Read)?;
        let front = device
            .device
            .responses
            .front_mut()
            .ok_or(ErrorCode::TIMEOUT)?;

        let (mut take, mut reason) = match termchr.and_then(|t| front.iter().position(|b| *b == t)) {
            Some(pos) => (pos + 1, TermReason::Termchr),
            None => (front.len(), TermReason::End),
        };
        if take > buf.len() {
            take = buf.len();
            reason = TermReason::MaxCount;
        }

        buf[..take].copy_from_slice(&front[..take]);
        front.drain(..take);
        if front.is_empty() {
            device.device.responses.pop_front();
        }
        Ok(ReadOutcome {
            count: take,
            reason,
        })
    }

    fn prompt(&mut self, handle: Handle, command: &[u8], response: &mut [u8]) -> Result<usize, ErrorCode> {
        let device = self.enter(handle, Primitive::Prompt)?;
        device.respond_to(command);
        device.written.push(command.to_vec());

        let reply = device
            .device
            .responses
            .pop_front()
            .ok_or(ErrorCode::TIMEOUT)?;
        let count = reply.len().min(response.len());
        response[..count].copy_from_slice(&reply[..count]);
        Ok(count)
    }

    fn lock(&mut self, handle: Handle) -> Result<(), ErrorCode> {
        let device = self.enter(handle, Primitive::Lock)?;
        match device.lock_owner {
            Some(owner) if owner != handle => Err(ErrorCode::LOCKED),
            _ => {
                device.lock_owner = Some(handle);
                Ok(())
            }
        }
    }

    fn unlock(&mut self, handle: Handle) -> Result<(), ErrorCode> {
        let device = self.enter(handle, Primitive::Unlock)?;
        if device.lock_owner != Some(handle) {
            return Err(ErrorCode::NOT_LOCKED);
        }
        device.lock_owner = None;
        Ok(())
    }

    fn read_status_byte(&mut self, handle: Handle) -> Result<u8, ErrorCode> {
        let device = self.enter(handle, Primitive::ReadStatusByte)?;
        Ok(device.device.status_byte)
    }

    fn clear(&mut self, handle: Handle) -> Result<(), ErrorCode> {
        let device = self.enter(handle, Primitive::Clear)?;
        device.pending.clear();
        device.device.responses.clear();
        Ok(())
    }
}

/// A [`Binding`] backed by in-memory instruments.
///
/// Cloning is cheap and every clone shares the same bus, so a test can keep
/// one clone for inspection while the driver core owns another.
#[derive(Clone)]
pub struct SimulatedBus {
    inner: Arc<Mutex<Inner>>,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// An empty bus. Opening an address with no attached device fails with
    /// [`ErrorCode::NO_DEVICE`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                devices: HashMap::new(),
                sessions: HashMap::new(),
                next_id: FIRST_SESSION_ID,
                last_error: None,
                auto_attach: false,
            })),
        }
    }

    /// A bus where every well-formed address hosts a device that answers
    /// `*IDN?` and reports status byte 0.
    pub fn auto_attach() -> Self {
        let bus = Self::new();
        bus.state().auto_attach = true;
        bus
    }

    /// Attach `device` at `address`, replacing any device already there.
    pub fn attach(&self, address: &str, device: SimDevice) -> Result<(), AddressError> {
        let key = Address::parse(address)?.to_string();
        self.state().devices.insert(key, DeviceState::new(device));
        Ok(())
    }

    /// Queue a raw response on the device at `address`.
    pub fn push_response(&self, address: &str, response: impl Into<Vec<u8>>) {
        let response = response.into();
        self.with_device(address, |device| device.device.responses.push_back(response));
    }

    /// Change the status byte of the device at `address`.
    pub fn set_status_byte(&self, address: &str, status_byte: u8) {
        self.with_device(address, |device| device.device.status_byte = status_byte);
    }

    /// Make the next `count` calls of `primitive` report an interrupted call.
    pub fn inject_interrupts(&self, address: &str, primitive: Primitive, count: u32) {
        self.with_device(address, |device| {
            device.interrupts.insert(primitive, count);
        });
    }

    /// Make every call of `primitive` fail with `code` until faults are cleared.
    pub fn inject_failure(&self, address: &str, primitive: Primitive, code: ErrorCode) {
        self.with_device(address, |device| {
            device.failures.insert(primitive, code);
        });
    }

    /// Remove injected interrupts and failures.
    pub fn clear_faults(&self, address: &str) {
        self.with_device(address, |device| {
            device.interrupts.clear();
            device.failures.clear();
        });
    }

    /// Complete messages the device has received, oldest first.
    pub fn written(&self, address: &str) -> Vec<Vec<u8>> {
        self.with_device(address, |device| device.written.clone())
            .unwrap_or_default()
    }

    /// Number of times `primitive` was invoked against the device, including
    /// interrupted and failed attempts.
    pub fn call_count(&self, address: &str, primitive: Primitive) -> usize {
        self.with_device(address, |device| {
            device.calls.get(&primitive).copied().unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Whether `SIGALRM` was blocked during the most recent `primitive` call.
    pub fn alarm_blocked_during(&self, address: &str, primitive: Primitive) -> Option<bool> {
        self.with_device(address, |device| device.alarm_blocked.get(&primitive).copied())
            .flatten()
    }

    /// Session currently holding the device lock.
    pub fn lock_owner(&self, address: &str) -> Option<Handle> {
        self.with_device(address, |device| device.lock_owner).flatten()
    }

    /// Timeout last applied to `handle`, if the session is open.
    pub fn session_timeout(&self, handle: Handle) -> Option<u32> {
        self.state()
            .sessions
            .get(&handle)
            .map(|session| session.timeout_ms)
    }

    /// Termination character last applied to `handle`, if the session is open.
    pub fn session_termchr(&self, handle: Handle) -> Option<Option<u8>> {
        self.state()
            .sessions
            .get(&handle)
            .map(|session| session.termchr)
    }

    /// Number of open sessions.
    pub fn open_sessions(&self) -> usize {
        self.state().sessions.len()
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_device<T>(&self, address: &str, f: impl FnOnce(&mut DeviceState) -> T) -> Option<T> {
        let key = Address::parse(address).ok()?.to_string();
        let mut state = self.state();
        state.devices.get_mut(&key).map(f)
    }
}

impl Binding for SimulatedBus {
    fn open(&self, address: &str) -> Option<Handle> {
        let mut state = self.state();
        let result = state.open(address);
        state.record(result).ok()
    }

    fn close(&self, handle: Handle) -> Result<(), ErrorCode> {
        let mut state = self.state();
        let result = state.close(handle);
        state.record(result)
    }

    fn set_timeout(&self, handle: Handle, timeout_ms: u32) {
        let mut state = self.state();
        match state.sessions.get_mut(&handle) {
            Some(session) => session.timeout_ms = timeout_ms,
            None => state.last_error = Some(ErrorCode::BAD_ID),
        }
    }

    fn set_termchr(&self, handle: Handle, termchr: Option<u8>) {
        let mut state = self.state();
        match state.sessions.get_mut(&handle) {
            Some(session) => session.termchr = termchr,
            None => state.last_error = Some(ErrorCode::BAD_ID),
        }
    }

    fn write(&self, handle: Handle, data: &[u8], _end: bool) -> Result<usize, ErrorCode> {
        let mut state = self.state();
        let result = state.write(handle, data);
        state.record(result)
    }

    fn flush(&self, handle: Handle, buffer: BufferSelector) -> Result<(), ErrorCode> {
        let mut state = self.state();
        let result = state.flush(handle, buffer);
        state.record(result)
    }

    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<ReadOutcome, ErrorCode> {
        let mut state = self.state();
        let result = state.read(handle, buf);
        state.record(result)
    }

    fn prompt(
        &self,
        handle: Handle,
        command: &[u8],
        response: &mut [u8],
    ) -> Result<usize, ErrorCode> {
        let mut state = self.state();
        let result = state.prompt(handle, command, response);
        state.record(result)
    }

    fn lock(&self, handle: Handle) -> Result<(), ErrorCode> {
        let mut state = self.state();
        let result = state.lock(handle);
        state.record(result)
    }

    fn unlock(&self, handle: Handle) -> Result<(), ErrorCode> {
        let mut state = self.state();
        let result = state.unlock(handle);
        state.record(result)
    }

    fn read_status_byte(&self, handle: Handle) -> Result<u8, ErrorCode> {
        let mut state = self.state();
        let result = state.read_status_byte(handle);
        state.record(result)
    }

    fn clear(&self, handle: Handle) -> Result<(), ErrorCode> {
        let mut state = self.state();
        let result = state.clear(handle);
        state.record(result)
    }

    fn last_error(&self) -> Option<ErrorCode> {
        self.state().last_error
    }

    fn binding_name(&self) -> &'static str {
        "simulated"
    }
}

fn default_identity(address: &Address) -> String {
    format!(
        "gpibprims,SIMULATED,{},{}",
        address.primary().unwrap_or_default(),
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(unix)]
fn alarm_blocked() -> bool {
    // SAFETY: `current` is a valid writable sigset; a null `set` only queries
    // the calling thread's mask.
    unsafe {
        let mut current: libc::sigset_t = std::mem::zeroed();
        if libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut current) != 0 {
            return false;
        }
        libc::sigismember(&current, libc::SIGALRM) == 1
    }
}

#[cfg(not(unix))]
fn alarm_blocked() -> bool {
    false
}
