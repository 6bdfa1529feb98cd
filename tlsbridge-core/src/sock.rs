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

//! The blocking socket facade over a TLS session.
//!
//! Every operation loops the session's single-attempt primitives, parking on
//! transport readiness whenever the engine wants the socket readable or
//! writable, until it completes or fails for real.

use std::os::unix::io::RawFd;
use std::time::Duration;

use tlsbridge_error::ErrorType::*;
use tlsbridge_error::{Error, Result};

use crate::cert::{PeerCert, PeerCertInfo};
use crate::session::{retryable_errno, IoEvent, TlsSession};
use crate::transport::Transport;

/// Close bookkeeping for a socket with outstanding file-like views.
///
/// Each view borrows the underlying socket, so `close()` while views exist
/// only records the intent; the real teardown runs when the last view is
/// dropped. Teardown happens exactly once on every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseState {
    Open { views: usize },
    PendingClose { views: usize },
    Closed,
}

/// An established TLS connection with a blocking stream-socket surface.
///
/// Generic over the session and transport seams so every retry policy is
/// testable without a peer.
pub struct TlsSocket<S: TlsSession, T: Transport> {
    session: S,
    transport: T,
    suppress_ragged_eofs: bool,
    close_state: CloseState,
    reuse_count: usize,
}

/// Drive the handshake to completion, parking on readiness between attempts.
///
/// Free-standing because it also runs before a [`TlsSocket`] exists, inside
/// `wrap_socket`.
pub fn handshake_loop<S: TlsSession, T: Transport>(session: &mut S, transport: &T) -> Result<()> {
    loop {
        match session.handshake() {
            IoEvent::Done(()) => return Ok(()),
            IoEvent::WantRead => transport.wait_readable()?,
            IoEvent::WantWrite => transport.wait_writable()?,
            // an interrupted syscall is retried as long as the socket is
            // still there to retry on
            IoEvent::Interrupted(errno) => {
                if transport.fileno() < 0 {
                    return Error::e_explain(
                        ConnectionReset,
                        format!(
                            "socket closed during handshake: {}",
                            std::io::Error::from_raw_os_error(errno)
                        ),
                    );
                }
            }
            IoEvent::RaggedEof => {
                return Error::e_explain(TLSHandshakeFailure, "Unexpected EOF during handshake")
            }
            IoEvent::PeerClosed => {
                return Error::e_explain(
                    TLSHandshakeFailure,
                    "peer closed connection during handshake",
                )
            }
            IoEvent::Failed(e) => return Err(e),
        }
    }
}

impl<S: TlsSession, T: Transport> TlsSocket<S, T> {
    pub fn new(session: S, transport: T, suppress_ragged_eofs: bool) -> Self {
        TlsSocket {
            session,
            transport,
            suppress_ragged_eofs,
            close_state: CloseState::Open { views: 0 },
            reuse_count: 0,
        }
    }

    /// Run the handshake to completion. For sockets wrapped with
    /// `do_handshake: false`.
    pub fn do_handshake(&mut self) -> Result<()> {
        handshake_loop(&mut self.session, &self.transport)
    }

    /// Receive up to `buf.len()` bytes of application data.
    ///
    /// Returns `Ok(0)` on an orderly peer shutdown, and on an abrupt one when
    /// ragged EOFs are suppressed.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.session.read(buf) {
                IoEvent::Done(n) => return Ok(n),
                IoEvent::WantRead => self.transport.wait_readable()?,
                IoEvent::WantWrite => self.transport.wait_writable()?,
                IoEvent::RaggedEof => {
                    if self.suppress_ragged_eofs {
                        return Ok(0);
                    }
                    return Error::e_explain(ConnectionClosed, "Unexpected EOF");
                }
                IoEvent::PeerClosed => {
                    if self.session.received_shutdown() {
                        return Ok(0);
                    }
                    return Error::e_explain(
                        ReadError,
                        "TLS session reports close without a shutdown notice",
                    );
                }
                IoEvent::Interrupted(errno) => {
                    if retryable_errno(errno) {
                        continue;
                    }
                    return Error::e_explain(
                        SocketError,
                        format!(
                            "read interrupted: {}",
                            std::io::Error::from_raw_os_error(errno)
                        ),
                    );
                }
                IoEvent::Failed(e) => return Err(e),
            }
        }
    }

    /// [`recv`](Self::recv) into a caller-provided buffer. Same retry policy
    /// through the same primitive, kept as a distinct method for API parity
    /// with stream sockets.
    pub fn recv_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.recv(buf)
    }

    /// Write a prefix of `data`, returning how many bytes the engine took.
    pub fn send_until_done(&mut self, data: &[u8]) -> Result<usize> {
        loop {
            match self.session.write(data) {
                IoEvent::Done(n) => return Ok(n),
                IoEvent::WantWrite => self.transport.wait_writable()?,
                IoEvent::WantRead => self.transport.wait_readable()?,
                IoEvent::RaggedEof => return Error::e_explain(ConnectionClosed, "Unexpected EOF"),
                IoEvent::PeerClosed => {
                    return Error::e_explain(
                        ConnectionClosed,
                        "peer closed TLS connection during write",
                    )
                }
                IoEvent::Interrupted(errno) => {
                    if retryable_errno(errno) {
                        continue;
                    }
                    return Error::e_explain(
                        SocketError,
                        format!(
                            "write interrupted: {}",
                            std::io::Error::from_raw_os_error(errno)
                        ),
                    );
                }
                IoEvent::Failed(e) => return Err(e),
            }
        }
    }

    /// Write all of `data`, looping over partial writes.
    pub fn sendall(&mut self, data: &[u8]) -> Result<()> {
        let mut total_sent = 0;
        while total_sent < data.len() {
            total_sent += self.send_until_done(&data[total_sent..])?;
        }
        Ok(())
    }

    /// Send our close_notify. A single attempt; an engine that cannot make
    /// progress right now is not an error here.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.session.shutdown() {
            IoEvent::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Close the connection, or defer the close until the last file-like
    /// view is gone. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        match self.close_state {
            CloseState::Closed => Ok(()),
            CloseState::Open { views: 0 } => self.teardown(),
            CloseState::Open { views } => {
                self.close_state = CloseState::PendingClose { views };
                Ok(())
            }
            CloseState::PendingClose { .. } => Ok(()),
        }
    }

    /// Register a new file-like view of this socket.
    pub fn incref_views(&mut self) -> Result<()> {
        match &mut self.close_state {
            CloseState::Open { views } | CloseState::PendingClose { views } => {
                *views += 1;
                Ok(())
            }
            CloseState::Closed => Error::e_explain(SocketError, "socket is closed"),
        }
    }

    /// Drop a file-like view. When the last view goes away after a deferred
    /// close, the connection is torn down.
    pub fn decref_views(&mut self) -> Result<()> {
        let finish = match &mut self.close_state {
            CloseState::Open { views } if *views > 0 => {
                *views -= 1;
                false
            }
            CloseState::PendingClose { views } if *views > 0 => {
                *views -= 1;
                *views == 0
            }
            CloseState::Closed => return Error::e_explain(SocketError, "socket is closed"),
            _ => return Error::e_explain(InternalError, "view count underflow"),
        };
        if finish {
            self.teardown()
        } else {
            Ok(())
        }
    }

    fn teardown(&mut self) -> Result<()> {
        self.close_state = CloseState::Closed;
        self.transport.close()
    }

    /// Mark this connection as handed out for another logical use.
    pub fn reuse(&mut self) {
        self.reuse_count += 1;
    }

    /// Return one logical use. The last one closes the connection.
    pub fn drop_ref(&mut self) -> Result<()> {
        if self.reuse_count > 0 {
            self.reuse_count -= 1;
            Ok(())
        } else {
            self.close()
        }
    }

    /// The peer certificate in DER form, re-queried from the session.
    pub fn peer_cert_der(&self) -> Result<Option<Vec<u8>>> {
        self.session
            .peer_certificate()
            .map(|cert| cert.to_der())
            .transpose()
    }

    /// The peer certificate in structured form, re-queried from the session.
    pub fn peer_cert_info(&self) -> Result<Option<PeerCertInfo>> {
        self.session
            .peer_certificate()
            .map(|cert| {
                let x509 = cert.to_x509()?;
                Ok(PeerCertInfo::from_cert(&x509))
            })
            .transpose()
    }

    /// The raw peer certificate handle, if any.
    pub fn peer_certificate(&self) -> Option<PeerCert> {
        self.session.peer_certificate()
    }

    /// The negotiated protocol version, e.g. `"TLSv1.3"`.
    pub fn version(&self) -> Option<&'static str> {
        self.session.protocol_version()
    }

    pub fn fileno(&self) -> RawFd {
        self.transport.fileno()
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.transport.set_timeout(timeout)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.transport.timeout()
    }
}
