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

//! OpenSSL-backed [`TlsSession`].

use log::warn;
use std::io::ErrorKind;
use tlsbridge_error::ErrorType::{self, *};
use tlsbridge_error::{Error, OrErr, Result};

use super::{IoEvent, TlsSession};
use crate::cert::PeerCert;
use crate::tls::error::ErrorStack;
use crate::tls::ssl::{self, ErrorCode, Ssl, ShutdownState, SslRef, SslStream};
use crate::tls::ssl_sys::X509_V_OK;
use crate::transport::SharedTcp;

/// A TLS session driven by OpenSSL over a shared TCP stream.
pub struct OpensslSession {
    stream: SslStream<SharedTcp>,
}

impl OpensslSession {
    /// Bind `ssl` to the socket. No handshake is performed here.
    pub fn new(ssl: Ssl, sock: SharedTcp) -> Result<Self> {
        let stream = SslStream::new(ssl, sock)
            .or_err(TLSHandshakeFailure, "failed to bind TLS engine to socket")?;
        Ok(OpensslSession { stream })
    }

    pub fn ssl(&self) -> &SslRef {
        self.stream.ssl()
    }

    #[inline]
    fn clear_error() {
        let errs = ErrorStack::get();
        if !errs.errors().is_empty() {
            warn!("Clearing dirty TLS error stack: {}", errs);
        }
    }

    /// Map an engine error onto the closed event set.
    ///
    /// `timeout_et` is raised when the socket's own timeout fired under the
    /// engine (blocking socket with SO_RCVTIMEO/SO_SNDTIMEO reports
    /// EAGAIN); `fatal_et` covers protocol-level failures.
    fn classify<T>(err: ssl::Error, timeout_et: ErrorType, fatal_et: ErrorType) -> IoEvent<T> {
        match err.code() {
            ErrorCode::WANT_READ => IoEvent::WantRead,
            ErrorCode::WANT_WRITE => IoEvent::WantWrite,
            ErrorCode::ZERO_RETURN => IoEvent::PeerClosed,
            ErrorCode::SYSCALL => match err.io_error() {
                // EOF in the middle of a record, no close_notify
                None => IoEvent::RaggedEof,
                Some(io) => {
                    if io.raw_os_error() == Some(libc::EINTR) {
                        IoEvent::Interrupted(libc::EINTR)
                    } else if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                        IoEvent::Failed(Error::explain(timeout_et, "socket timeout expired"))
                    } else {
                        IoEvent::Failed(Error::explain(
                            SocketError,
                            format!("syscall failed under TLS engine: {io}"),
                        ))
                    }
                }
            },
            _ => IoEvent::Failed(Error::explain(fatal_et, format!("TLS engine error: {err}"))),
        }
    }
}

impl TlsSession for OpensslSession {
    fn handshake(&mut self) -> IoEvent<()> {
        Self::clear_error();
        match self.stream.do_handshake() {
            Ok(()) => IoEvent::Done(()),
            Err(err) => {
                // a failed chain validation is worth its own error type
                if err.code() == ErrorCode::SSL {
                    let verify = self.stream.ssl().verify_result();
                    if verify.as_raw() != X509_V_OK {
                        return IoEvent::Failed(Error::explain(
                            InvalidCert,
                            format!("certificate verify failed: {}", verify.error_string()),
                        ));
                    }
                }
                Self::classify(err, TLSHandshakeFailure, TLSHandshakeFailure)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> IoEvent<usize> {
        Self::clear_error();
        match self.stream.ssl_read(buf) {
            Ok(n) => IoEvent::Done(n),
            Err(err) => Self::classify(err, ReadTimedout, ReadError),
        }
    }

    fn write(&mut self, data: &[u8]) -> IoEvent<usize> {
        Self::clear_error();
        match self.stream.ssl_write(data) {
            Ok(n) => IoEvent::Done(n),
            Err(err) => Self::classify(err, WriteTimedout, WriteError),
        }
    }

    fn shutdown(&mut self) -> IoEvent<()> {
        Self::clear_error();
        match self.stream.shutdown() {
            Ok(_) => IoEvent::Done(()),
            Err(err) => Self::classify(err, WriteTimedout, WriteError),
        }
    }

    fn received_shutdown(&mut self) -> bool {
        self.stream.get_shutdown().contains(ShutdownState::RECEIVED)
    }

    fn peer_certificate(&self) -> Option<PeerCert> {
        self.stream.ssl().peer_certificate().map(PeerCert::Parsed)
    }

    fn protocol_version(&self) -> Option<&'static str> {
        match self.stream.ssl().version_str() {
            "unknown" => None,
            v => Some(v),
        }
    }
}
