// Copyright 2026 tlsbridge developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The plain-socket boundary: timeouts, readiness waits and the one real
//! close.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tlsbridge_error::ErrorType::{self, *};
use tlsbridge_error::{Error, OrErr, Result};

/// The transport a TLS session runs over.
///
/// The socket is shared: the TLS engine reads and writes it while the caller
/// (and any derived file-like views) still hold it, so closing here is a TCP
/// shutdown rather than a file-descriptor drop.
pub trait Transport {
    /// The raw file descriptor, or -1 once closed.
    fn fileno(&self) -> RawFd;

    /// Set the socket timeout used by blocking calls and readiness waits.
    fn set_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    fn timeout(&self) -> Option<Duration>;

    /// Switch the socket between blocking and non-blocking mode.
    fn set_blocking(&self, blocking: bool) -> Result<()>;

    /// Park until the socket is readable, bounded by the configured timeout.
    fn wait_readable(&self) -> Result<()>;

    /// Park until the socket is writable, bounded by the configured timeout.
    fn wait_writable(&self) -> Result<()>;

    /// Tear the connection down. Idempotent.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// A byte-stream view of the shared TCP socket, handed to the TLS engine.
#[derive(Clone)]
pub struct SharedTcp(Arc<TcpStream>);

impl SharedTcp {
    pub fn new(stream: Arc<TcpStream>) -> Self {
        SharedTcp(stream)
    }
}

impl Read for SharedTcp {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        (&*self.0).read(buf)
    }
}

impl Write for SharedTcp {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        (&*self.0).flush()
    }
}

/// [`Transport`] over a `std::net::TcpStream`.
pub struct TcpTransport {
    stream: Arc<TcpStream>,
    timeout: Mutex<Option<Duration>>,
    closed: AtomicBool,
}

impl TcpTransport {
    pub fn new(stream: Arc<TcpStream>) -> Self {
        TcpTransport {
            stream,
            timeout: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// A view of the same socket for the TLS engine.
    pub fn shared(&self) -> SharedTcp {
        SharedTcp(self.stream.clone())
    }

    fn poll_ready(&self, events: libc::c_short, timeout_et: ErrorType) -> Result<()> {
        if self.is_closed() {
            return Error::e_explain(SocketError, "socket is closed");
        }
        let deadline = self.timeout().map(|t| Instant::now() + t);
        let mut pfd = libc::pollfd {
            fd: self.stream.as_raw_fd(),
            events,
            revents: 0,
        };
        loop {
            let timeout_ms: libc::c_int = match deadline {
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Error::e_explain(timeout_et, "socket timeout expired");
                    }
                    left.as_millis().min(i32::MAX as u128) as libc::c_int
                }
                None => -1,
            };
            let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            if ret > 0 {
                if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                    return Error::e_explain(SocketError, "socket in error state");
                }
                return Ok(());
            }
            if ret == 0 {
                return Error::e_explain(timeout_et, "socket timeout expired");
            }
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(Error::because(SocketError, "poll() failed", err));
        }
    }
}

impl Transport for TcpTransport {
    fn fileno(&self) -> RawFd {
        if self.is_closed() {
            -1
        } else {
            self.stream.as_raw_fd()
        }
    }

    fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_read_timeout(timeout)
            .or_err(SocketError, "failed to set read timeout")?;
        self.stream
            .set_write_timeout(timeout)
            .or_err(SocketError, "failed to set write timeout")?;
        *self.timeout.lock().unwrap() = timeout;
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock().unwrap()
    }

    fn set_blocking(&self, blocking: bool) -> Result<()> {
        self.stream
            .set_nonblocking(!blocking)
            .or_err(SocketError, "failed to change blocking mode")
    }

    fn wait_readable(&self) -> Result<()> {
        self.poll_ready(libc::POLLIN, ReadTimedout)
    }

    fn wait_writable(&self) -> Result<()> {
        self.poll_ready(libc::POLLOUT, WriteTimedout)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // already torn down by the peer
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(Error::because(SocketError, "failed to shut down socket", e)),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_close_is_idempotent() {
        let (client, _server) = connected_pair();
        let t = TcpTransport::new(Arc::new(client));
        assert!(t.fileno() >= 0);
        t.close().unwrap();
        assert_eq!(t.fileno(), -1);
        t.close().unwrap();
        t.close().unwrap();
    }

    #[test]
    fn test_wait_readable_times_out() {
        let (client, _server) = connected_pair();
        let t = TcpTransport::new(Arc::new(client));
        t.set_timeout(Some(Duration::from_millis(20))).unwrap();
        let err = t.wait_readable().unwrap_err();
        assert_eq!(err.etype(), &ReadTimedout);
    }

    #[test]
    fn test_wait_readable_sees_data() {
        let (client, server) = connected_pair();
        let t = TcpTransport::new(Arc::new(client));
        t.set_timeout(Some(Duration::from_secs(5))).unwrap();
        (&server).write_all(b"x").unwrap();
        t.wait_readable().unwrap();
    }

    #[test]
    fn test_wait_writable_on_fresh_socket() {
        let (client, _server) = connected_pair();
        let t = TcpTransport::new(Arc::new(client));
        t.set_timeout(Some(Duration::from_secs(5))).unwrap();
        t.wait_writable().unwrap();
    }
}
