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

//! # tlsbridge
//!
//! A blocking, stream-socket shaped facade over OpenSSL's event-style TLS
//! engine.
//!
//! OpenSSL never blocks: operations that cannot make progress return
//! want-read/want-write and expect the caller to retry once the socket is
//! ready. [`TlsContext`] and [`TlsSocket`] absorb those retries behind the
//! familiar configure / wrap / read / write / close surface of a standard
//! TLS socket:
//!
//! - [`TlsContext`] carries the context-level configuration (verify mode,
//!   trust anchors, cipher list, ALPN, certificate chain) and performs the
//!   handshake, including SNI, in [`TlsContext::wrap_socket`].
//! - [`TlsSocket`] owns the established session and loops every read and
//!   write until the engine reports completion or a real failure. It also
//!   tracks derived file-like views of the underlying socket so the real
//!   teardown happens exactly once, after the last view is gone.
//! - [`cert`] projects the peer certificate into a structured form, with the
//!   Subject Alternative Names normalized to their ASCII (ACE) spelling.
//!
//! Everything is synchronous: retry loops park on `poll(2)` readiness waits
//! bounded by the configured socket timeout. The crate is not a TLS stack,
//! does not verify hostnames (that is the caller's job), and assumes
//! externally synchronized access to each socket.

#![warn(clippy::all)]

pub use tlsbridge_openssl as tls;

pub mod cert;
pub mod context;
pub mod name;
pub mod session;
pub mod sock;
pub mod transport;

pub use context::{Password, TlsContext, TlsProtocol, VerifyMode, WrapOptions};
pub use sock::TlsSocket;

/// The error types of this crate.
pub use tlsbridge_error as error;
pub use tlsbridge_error::{BError, Error, ErrorType, OkOrErr, OrErr, Result};
