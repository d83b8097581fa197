//! LAN-to-GPIB gateway binding over TCP.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tracing::{debug, info};

use crate::address::Address;
use crate::error::ErrorCode;
use crate::traits::{Binding, BufferSelector, Handle, ReadOutcome, TermReason};

/// TCP port LAN-to-GPIB gateways listen on by default.
pub const DEFAULT_GATEWAY_PORT: u16 = 1234;

/// Longest read timeout the gateway itself accepts (`++read_tmo_ms`).
const GATEWAY_READ_TIMEOUT_LIMIT_MS: u32 = 3000;

/// Gateway setup: controller mode, no auto read-after-write, no appended
/// terminator (callers frame their own), EOI on the last byte.
const GATEWAY_SETUP: &[u8] = b"++mode 1\n++auto 0\n++eos 3\n++eoi 1\n";

const ESC: u8 = 0x1B;

/// Secondary addresses are sent as 96 + n.
const SECONDARY_OFFSET: u8 = 96;

struct Link {
    stream: TcpStream,
    device: String,
    primary: u8,
    secondary: Option<u8>,
    timeout_ms: u32,
    termchr: Option<u8>,
    /// Bytes that arrived after a terminator, kept for the next read.
    pending: BytesMut,
}

impl Link {
    fn put_addr(&self, out: &mut BytesMut) {
        match self.secondary {
            Some(secondary) => out.put_slice(
                format!("++addr {} {}\n", self.primary, SECONDARY_OFFSET + secondary).as_bytes(),
            ),
            None => out.put_slice(format!("++addr {}\n", self.primary).as_bytes()),
        }
    }

    fn send(&mut self, out: &[u8]) -> Result<(), ErrorCode> {
        self.stream
            .write_all(out)
            .map_err(|err| ErrorCode::from_io(&err))
    }

    fn write_data(&mut self, data: &[u8], end: bool) -> Result<usize, ErrorCode> {
        let mut out = BytesMut::with_capacity(data.len() * 2 + 32);
        self.put_addr(&mut out);
        out.put_slice(if end { b"++eoi 1\n" } else { b"++eoi 0\n" });
        escape_into(data, &mut out);
        out.put_u8(b'\n');
        self.send(&out)?;
        Ok(data.len())
    }

    fn apply_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ErrorCode> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(|err| ErrorCode::from_io(&err))
    }

    fn session_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(u64::from(self.timeout_ms)))
    }

    /// Move bytes left over from an earlier read into `buf`. Returns the
    /// outcome directly when they already complete the read.
    fn drain_pending(
        &mut self,
        buf: &mut [u8],
        termchr: Option<u8>,
    ) -> (usize, Option<ReadOutcome>) {
        if self.pending.is_empty() {
            return (0, None);
        }
        let end = termchr
            .and_then(|t| self.pending.iter().position(|b| *b == t))
            .map(|pos| pos + 1);
        let take = end.unwrap_or(self.pending.len()).min(buf.len());
        let head = self.pending.split_to(take);
        buf[..take].copy_from_slice(&head);

        let outcome = match end {
            Some(end) if end == take => Some(ReadOutcome {
                count: take,
                reason: TermReason::Termchr,
            }),
            _ if take == buf.len() => Some(ReadOutcome {
                count: take,
                reason: TermReason::MaxCount,
            }),
            _ => None,
        };
        (take, outcome)
    }

    fn read_data(&mut self, buf: &mut [u8], termchr: Option<u8>) -> Result<ReadOutcome, ErrorCode> {
        let (mut count, buffered) = self.drain_pending(buf, termchr);
        if let Some(outcome) = buffered {
            return Ok(outcome);
        }

        let mut out = BytesMut::with_capacity(64);
        self.put_addr(&mut out);
        let gateway_timeout = match self.timeout_ms {
            0 => GATEWAY_READ_TIMEOUT_LIMIT_MS,
            ms => ms.min(GATEWAY_READ_TIMEOUT_LIMIT_MS),
        };
        out.put_slice(format!("++read_tmo_ms {gateway_timeout}\n").as_bytes());
        match termchr {
            Some(t) => out.put_slice(format!("++read {t}\n").as_bytes()),
            None => out.put_slice(b"++read eoi\n"),
        }
        self.send(&out)?;
        self.apply_read_timeout(self.session_timeout())?;

        // The gateway stops listening after `read_tmo_ms` of silence, so a
        // quiet period that long ends an end-of-message read.
        let idle_gap = Duration::from_millis(u64::from(gateway_timeout));

        // Once the request is on the wire, interrupted socket reads are
        // retried here: re-issuing the primitive would request a second reply.
        loop {
            if count == buf.len() {
                break Ok(ReadOutcome {
                    count,
                    reason: TermReason::MaxCount,
                });
            }
            match self.stream.read(&mut buf[count..]) {
                Ok(0) if count > 0 => {
                    break Ok(ReadOutcome {
                        count,
                        reason: TermReason::End,
                    })
                }
                Ok(0) => break Err(ErrorCode::NO_CONNECTION),
                Ok(n) => {
                    let found = termchr
                        .and_then(|t| buf[count..count + n].iter().position(|b| *b == t));
                    if let Some(pos) = found {
                        let end = count + pos + 1;
                        self.pending.extend_from_slice(&buf[end..count + n]);
                        break Ok(ReadOutcome {
                            count: end,
                            reason: TermReason::Termchr,
                        });
                    }
                    count += n;
                    if termchr.is_none() {
                        self.apply_read_timeout(Some(idle_gap))?;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
                        && count > 0
                        && termchr.is_none() =>
                {
                    break Ok(ReadOutcome {
                        count,
                        reason: TermReason::End,
                    })
                }
                Err(err) => break Err(ErrorCode::from_io(&err)),
            }
        }
    }

    fn read_line(&mut self) -> Result<String, ErrorCode> {
        let mut line = Vec::with_capacity(8);
        let mut byte = [0u8; 1];
        self.apply_read_timeout(self.session_timeout())?;
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(ErrorCode::NO_CONNECTION),
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => line.push(byte[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ErrorCode::from_io(&err)),
            }
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }
}

/// A [`Binding`] for LAN-to-GPIB gateways speaking the `++` ASCII control
/// protocol over TCP.
///
/// Accepts `lan[host]:<primary>[,<secondary>]` and
/// `lan[host]:<interface>,<primary>[,<secondary>]` addresses. Each session
/// holds its own TCP connection. Device locks are advisory and only
/// coordinate sessions opened through the same `LanGateway`.
pub struct LanGateway {
    port: u16,
    connect_timeout: Duration,
    links: Mutex<HashMap<Handle, Arc<Mutex<Link>>>>,
    locks: Mutex<HashMap<String, Handle>>,
    next_id: AtomicU32,
    last_error: Mutex<Option<ErrorCode>>,
}

impl Default for LanGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl LanGateway {
    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Gateway binding on [`DEFAULT_GATEWAY_PORT`].
    pub fn new() -> Self {
        Self::with_port(DEFAULT_GATEWAY_PORT)
    }

    /// Gateway binding on an explicit TCP port.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            links: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            last_error: Mutex::new(None),
        }
    }

    /// Override the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The TCP port sessions connect to.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn record<T>(&self, result: Result<T, ErrorCode>) -> Result<T, ErrorCode> {
        if let Err(code) = &result {
            *guard(&self.last_error) = Some(*code);
        }
        result
    }

    fn link(&self, handle: Handle) -> Result<Arc<Mutex<Link>>, ErrorCode> {
        guard(&self.links)
            .get(&handle)
            .cloned()
            .ok_or(ErrorCode::BAD_ID)
    }

    fn with_link<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut Link) -> Result<T, ErrorCode>,
    ) -> Result<T, ErrorCode> {
        let result = self.link(handle).and_then(|link| f(&mut guard(&link)));
        self.record(result)
    }

    fn connect(&self, address: &str) -> Result<Link, ErrorCode> {
        let parsed = Address::parse(address).map_err(ErrorCode::from)?;
        let host = parsed.host().ok_or(ErrorCode::NOT_SUPPORTED)?;
        let primary = parsed.primary().ok_or(ErrorCode::NOT_SUPPORTED)?;

        let target = (host, self.port)
            .to_socket_addrs()
            .map_err(|_| ErrorCode::BAD_ADDRESS)?
            .next()
            .ok_or(ErrorCode::BAD_ADDRESS)?;
        let mut stream = TcpStream::connect_timeout(&target, self.connect_timeout)
            .map_err(|err| ErrorCode::from_io(&err))?;
        let _ = stream.set_nodelay(true);
        stream
            .write_all(GATEWAY_SETUP)
            .map_err(|err| ErrorCode::from_io(&err))?;

        info!(%target, device = %parsed, "connected to LAN gateway");

        Ok(Link {
            stream,
            device: parsed.to_string(),
            primary,
            secondary: parsed.secondary(),
            timeout_ms: 0,
            termchr: None,
            pending: BytesMut::new(),
        })
    }
}

impl Binding for LanGateway {
    fn open(&self, address: &str) -> Option<Handle> {
        let result = self.connect(address).and_then(|link| {
            let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
            let handle = Handle::new(raw).ok_or(ErrorCode::INTERNAL)?;
            guard(&self.links).insert(handle, Arc::new(Mutex::new(link)));
            Ok(handle)
        });
        self.record(result).ok()
    }

    fn close(&self, handle: Handle) -> Result<(), ErrorCode> {
        let removed = guard(&self.links).remove(&handle);
        let result = match removed {
            Some(_) => {
                guard(&self.locks).retain(|_, owner| *owner != handle);
                debug!(%handle, "gateway session closed");
                Ok(())
            }
            None => Err(ErrorCode::BAD_ID),
        };
        self.record(result)
    }

    fn set_timeout(&self, handle: Handle, timeout_ms: u32) {
        let _ = self.with_link(handle, |link| {
            link.timeout_ms = timeout_ms;
            Ok(())
        });
    }

    fn set_termchr(&self, handle: Handle, termchr: Option<u8>) {
        let _ = self.with_link(handle, |link| {
            link.termchr = termchr;
            Ok(())
        });
    }

    fn write(&self, handle: Handle, data: &[u8], end: bool) -> Result<usize, ErrorCode> {
        self.with_link(handle, |link| link.write_data(data, end))
    }

    fn flush(&self, handle: Handle, buffer: BufferSelector) -> Result<(), ErrorCode> {
        self.with_link(handle, |link| match buffer {
            BufferSelector::Write => link
                .stream
                .flush()
                .map_err(|err| ErrorCode::from_io(&err)),
            BufferSelector::DiscardRead => {
                link.pending.clear();
                Ok(())
            }
            // Writes are not queued locally; the gateway forwards them as they arrive.
            BufferSelector::DiscardWrite => Ok(()),
        })
    }

    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<ReadOutcome, ErrorCode> {
        self.with_link(handle, |link| {
            let termchr = link.termchr;
            link.read_data(buf, termchr)
        })
    }

    fn prompt(
        &self,
        handle: Handle,
        command: &[u8],
        response: &mut [u8],
    ) -> Result<usize, ErrorCode> {
        self.with_link(handle, |link| {
            link.write_data(command, true)?;
            link.read_data(response, None).map(|outcome| outcome.count)
        })
    }

    fn lock(&self, handle: Handle) -> Result<(), ErrorCode> {
        let result = self.link(handle).and_then(|link| {
            let device = guard(&link).device.clone();
            let mut locks = guard(&self.locks);
            match locks.get(&device) {
                Some(owner) if *owner != handle => Err(ErrorCode::LOCKED),
                _ => {
                    locks.insert(device, handle);
                    Ok(())
                }
            }
        });
        self.record(result)
    }

    fn unlock(&self, handle: Handle) -> Result<(), ErrorCode> {
        let result = self.link(handle).and_then(|link| {
            let device = guard(&link).device.clone();
            let mut locks = guard(&self.locks);
            match locks.get(&device) {
                Some(owner) if *owner == handle => {
                    locks.remove(&device);
                    Ok(())
                }
                _ => Err(ErrorCode::NOT_LOCKED),
            }
        });
        self.record(result)
    }

    fn read_status_byte(&self, handle: Handle) -> Result<u8, ErrorCode> {
        self.with_link(handle, |link| {
            let command = match link.secondary {
                Some(secondary) => format!(
                    "++spoll {} {}\n",
                    link.primary,
                    SECONDARY_OFFSET + secondary
                ),
                None => format!("++spoll {}\n", link.primary),
            };
            link.send(command.as_bytes())?;
            link.read_line()?
                .parse::<u8>()
                .map_err(|_| ErrorCode::DATA)
        })
    }

    fn clear(&self, handle: Handle) -> Result<(), ErrorCode> {
        self.with_link(handle, |link| {
            let mut out = BytesMut::with_capacity(32);
            link.put_addr(&mut out);
            out.put_slice(b"++clr\n");
            link.pending.clear();
            link.send(&out)
        })
    }

    fn last_error(&self) -> Option<ErrorCode> {
        *guard(&self.last_error)
    }

    fn binding_name(&self) -> &'static str {
        "lan-gateway"
    }
}

/// Escape bytes the gateway would otherwise interpret (CR, LF, ESC, `+`).
fn escape_into(data: &[u8], out: &mut BytesMut) {
    for &byte in data {
        if matches!(byte, b'\r' | b'\n' | ESC | b'+') {
            out.put_u8(ESC);
        }
        out.put_u8(byte);
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Fake gateway: records every control line and hands it to `respond`
    /// along with the socket to answer on.
    fn spawn_gateway<F>(respond: F) -> (u16, thread::JoinHandle<Vec<Vec<u8>>>)
    where
        F: Fn(&[u8], &mut TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            let mut lines = Vec::new();
            loop {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                respond(&line, &mut writer);
                lines.push(line);
            }
            lines
        });
        (port, handle)
    }

    fn is_read_request(line: &[u8]) -> bool {
        line.starts_with(b"++read ") && !line.starts_with(b"++read_tmo_ms")
    }

    /// Answers `++read` and `++spoll` with canned replies.
    fn spawn_fake_gateway(
        reply: &'static [u8],
        status: u8,
    ) -> (u16, thread::JoinHandle<Vec<Vec<u8>>>) {
        spawn_gateway(move |line, writer| {
            if is_read_request(line) {
                writer.write_all(reply).unwrap();
            } else if line.starts_with(b"++spoll") {
                writer.write_all(format!("{status}\r\n").as_bytes()).unwrap();
            }
        })
    }

    fn count_lines(lines: &[Vec<u8>], prefix: &[u8]) -> usize {
        lines.iter().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn escape_protects_gateway_control_bytes() {
        let mut out = BytesMut::new();
        escape_into(b"A+B\r\n", &mut out);
        assert_eq!(out.as_ref(), b"A\x1b+B\x1b\r\x1b\n");
    }

    #[test]
    fn rejects_local_and_interface_addresses() {
        let gateway = LanGateway::with_port(1);

        assert!(gateway.open("gpib0,19").is_none());
        assert_eq!(gateway.last_error(), Some(ErrorCode::NOT_SUPPORTED));

        assert!(gateway.open("lan[127.0.0.1]:gpib0").is_none());
        assert_eq!(gateway.last_error(), Some(ErrorCode::NOT_SUPPORTED));

        assert!(gateway.open("lan[127.0.0.1").is_none());
        assert_eq!(gateway.last_error(), Some(ErrorCode::SYNTAX));
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let gateway = LanGateway::new();
        let handle = Handle::new(99).unwrap();
        assert_eq!(gateway.close(handle), Err(ErrorCode::BAD_ID));
        assert_eq!(gateway.read_status_byte(handle), Err(ErrorCode::BAD_ID));
    }

    #[test]
    fn write_read_and_poll_through_gateway() {
        let (port, server) = spawn_fake_gateway(b"ACME,MODEL1,0001,1.0\r\n", 16);
        let gateway = LanGateway::with_port(port);

        let handle = gateway.open("lan[127.0.0.1]:19").expect("open should succeed");
        gateway.set_timeout(handle, 2000);
        gateway.set_termchr(handle, Some(b'\n'));

        assert_eq!(gateway.write(handle, b"*IDN?\r\n", true), Ok(7));
        gateway.flush(handle, BufferSelector::Write).unwrap();

        let mut buf = [0u8; 64];
        let outcome = gateway.read(handle, &mut buf).unwrap();
        assert_eq!(outcome.reason, TermReason::Termchr);
        assert_eq!(&buf[..outcome.count], b"ACME,MODEL1,0001,1.0\r\n");

        assert_eq!(gateway.read_status_byte(handle), Ok(16));
        gateway.close(handle).unwrap();

        let lines = server.join().unwrap();
        assert!(lines.iter().any(|l| l == b"++mode 1\n"));
        assert!(lines.iter().any(|l| l == b"++addr 19\n"));
        assert!(lines.iter().any(|l| l == b"++read 10\n"));
        assert!(lines.iter().any(|l| l == b"++spoll 19\n"));
    }

    #[test]
    fn gateway_locks_are_exclusive_per_device() {
        let (port_a, server_a) = spawn_fake_gateway(b"", 0);
        let gateway = LanGateway::with_port(port_a);
        let a = gateway.open("lan[127.0.0.1]:7").unwrap();

        gateway.lock(a).unwrap();
        assert_eq!(gateway.lock(a), Ok(()));
        gateway.unlock(a).unwrap();
        assert_eq!(gateway.unlock(a), Err(ErrorCode::NOT_LOCKED));

        gateway.close(a).unwrap();
        server_a.join().unwrap();
    }

    #[test]
    fn bytes_after_terminator_are_kept_for_next_read() {
        let (port, server) = spawn_fake_gateway(b"ONE\nTWO\n", 0);
        let gateway = LanGateway::with_port(port);
        let handle = gateway.open("lan[127.0.0.1]:5").unwrap();
        gateway.set_timeout(handle, 2000);
        gateway.set_termchr(handle, Some(b'\n'));

        let mut buf = [0u8; 64];
        let first = gateway.read(handle, &mut buf).unwrap();
        assert_eq!(&buf[..first.count], b"ONE\n");

        let second = gateway.read(handle, &mut buf).unwrap();
        assert_eq!(second.reason, TermReason::Termchr);
        assert_eq!(&buf[..second.count], b"TWO\n");

        gateway.close(handle).unwrap();
        let lines = server.join().unwrap();
        assert_eq!(count_lines(&lines, b"++read 10"), 1);
    }

    #[test]
    fn discarding_input_drops_buffered_tail() {
        let (port, server) = spawn_fake_gateway(b"ONE\nSTALE\n", 0);
        let gateway = LanGateway::with_port(port);
        let handle = gateway.open("lan[127.0.0.1]:5").unwrap();
        gateway.set_timeout(handle, 2000);
        gateway.set_termchr(handle, Some(b'\n'));

        let mut buf = [0u8; 64];
        gateway.read(handle, &mut buf).unwrap();
        gateway.clear(handle).unwrap();

        // The next read goes back to the gateway instead of returning STALE.
        let next = gateway.read(handle, &mut buf).unwrap();
        assert_eq!(&buf[..next.count], b"ONE\n");

        gateway.close(handle).unwrap();
        let lines = server.join().unwrap();
        assert_eq!(count_lines(&lines, b"++read 10"), 2);
        assert_eq!(count_lines(&lines, b"++clr"), 1);
    }

    #[test]
    fn end_of_message_read_spans_quiet_bursts() {
        let (port, server) = spawn_gateway(|line, writer| {
            if is_read_request(line) {
                writer.write_all(b"#18PART").unwrap();
                thread::sleep(Duration::from_millis(250));
                writer.write_all(b"-TWO\r\n").unwrap();
            }
        });
        let gateway = LanGateway::with_port(port);
        let handle = gateway.open("lan[127.0.0.1]:9").unwrap();
        gateway.set_timeout(handle, 500);

        let mut response = [0u8; 64];
        let count = gateway.prompt(handle, b"DATA?\r\n", &mut response).unwrap();
        assert_eq!(&response[..count], b"#18PART-TWO\r\n");

        gateway.close(handle).unwrap();
        let lines = server.join().unwrap();
        assert!(lines.iter().any(|l| l == b"++read eoi\n"));
    }

    #[cfg(unix)]
    #[test]
    fn interrupted_poll_does_not_request_a_second_reply() {
        use std::os::unix::thread::JoinHandleExt;

        extern "C" fn ignore(_: libc::c_int) {}

        // SAFETY: `action` is fully initialised before use and `ignore` is an
        // async-signal-safe no-op. SA_RESTART is left unset so a blocked
        // socket read fails with EINTR.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = ignore as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);
            assert_eq!(
                libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()),
                0
            );
        }

        let (port, server) = spawn_gateway(|line, writer| {
            if line.starts_with(b"++spoll") {
                thread::sleep(Duration::from_millis(300));
                writer.write_all(b"16\r\n").unwrap();
            } else if is_read_request(line) {
                writer.write_all(b"REPLY\r\n").unwrap();
            }
        });
        let gateway = Arc::new(LanGateway::with_port(port));
        let handle = gateway.open("lan[127.0.0.1]:19").unwrap();
        gateway.set_timeout(handle, 2000);
        gateway.set_termchr(handle, Some(b'\n'));

        let poller = {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || gateway.read_status_byte(handle))
        };
        thread::sleep(Duration::from_millis(100));
        // SAFETY: the poller thread is still joinable, so its pthread id is live.
        unsafe {
            libc::pthread_kill(poller.as_pthread_t() as libc::pthread_t, libc::SIGUSR1);
        }
        assert_eq!(poller.join().unwrap(), Ok(16));

        let mut buf = [0u8; 64];
        let outcome = gateway.read(handle, &mut buf).unwrap();
        assert_eq!(&buf[..outcome.count], b"REPLY\r\n");

        gateway.close(handle).unwrap();
        let lines = server.join().unwrap();
        assert_eq!(count_lines(&lines, b"++spoll"), 1);
    }
}
