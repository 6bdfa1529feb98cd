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

//! The boundary to the non-blocking TLS engine.
//!
//! The engine signals "cannot make progress yet" through distinguished
//! conditions rather than blocking. Instead of dispatching on error types at
//! every call site, each operation reports one [`IoEvent`] and the retry
//! loops in [`crate::sock`] switch on the closed set.

pub mod openssl;

use tlsbridge_error::BError;

use crate::cert::PeerCert;

/// The outcome of one attempt at a TLS engine operation.
#[derive(Debug)]
pub enum IoEvent<T> {
    /// The operation completed.
    Done(T),
    /// The engine needs the socket readable before retrying.
    WantRead,
    /// The engine needs the socket writable before retrying.
    WantWrite,
    /// The underlying syscall failed with this errno; may be retryable.
    Interrupted(i32),
    /// The peer went away without sending close_notify.
    RaggedEof,
    /// The peer performed an orderly TLS shutdown.
    PeerClosed,
    /// A real failure.
    Failed(BError),
}

/// A live TLS session bound 1:1 to a plain socket.
///
/// Operations never loop internally: each call makes one attempt against the
/// engine and reports the outcome. Looping, readiness waits and close
/// bookkeeping belong to the wrapped socket.
pub trait TlsSession {
    /// One handshake step.
    fn handshake(&mut self) -> IoEvent<()>;

    /// One read attempt into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> IoEvent<usize>;

    /// One write attempt of a prefix of `data`, reporting the bytes the
    /// engine accepted.
    fn write(&mut self, data: &[u8]) -> IoEvent<usize>;

    /// Send our close_notify. A single attempt, never retried.
    fn shutdown(&mut self) -> IoEvent<()>;

    /// Whether the peer's close_notify has been received.
    fn received_shutdown(&mut self) -> bool;

    /// The peer certificate, re-queried from the engine on every call.
    fn peer_certificate(&self) -> Option<PeerCert>;

    /// The negotiated protocol version, e.g. "TLSv1.3".
    fn protocol_version(&self) -> Option<&'static str>;
}

/// Whether an errno from an interrupted syscall only means "try again".
pub(crate) fn retryable_errno(errno: i32) -> bool {
    errno == libc::EINTR || errno == libc::EAGAIN || errno == libc::EWOULDBLOCK
}
