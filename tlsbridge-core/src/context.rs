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

//! TLS context configuration and socket wrapping.

use log::debug;
use std::net::{IpAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;

use tlsbridge_error::ErrorType::*;
use tlsbridge_error::{Error, OrErr, Result};

use crate::session::openssl::OpensslSession;
use crate::session::TlsSession;
use crate::sock::{handshake_loop, TlsSocket};
use crate::tls::ext;
use crate::tls::pkey::PKey;
use crate::tls::ssl::{SslContextBuilder, SslFiletype, SslMethod, SslOptions, SslVerifyMode};
use crate::tls::x509::X509;
use crate::transport::{TcpTransport, Transport};

/// Which handshake role(s) the context can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    /// Either side, negotiated highest version.
    Tls,
    TlsClient,
    TlsServer,
}

impl TlsProtocol {
    fn method(self) -> SslMethod {
        match self {
            TlsProtocol::Tls => SslMethod::tls(),
            TlsProtocol::TlsClient => SslMethod::tls_client(),
            TlsProtocol::TlsServer => SslMethod::tls_server(),
        }
    }
}

/// Peer certificate requirements during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// No certificate is requested or checked.
    CertNone,
    /// A certificate is requested and checked when presented, but the peer
    /// may decline to send one.
    CertOptional,
    /// A valid peer certificate is mandatory.
    CertRequired,
}

impl VerifyMode {
    fn to_flags(self) -> SslVerifyMode {
        match self {
            VerifyMode::CertNone => SslVerifyMode::NONE,
            VerifyMode::CertOptional => SslVerifyMode::PEER,
            VerifyMode::CertRequired => {
                SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT
            }
        }
    }

    fn from_flags(flags: SslVerifyMode) -> VerifyMode {
        if !flags.contains(SslVerifyMode::PEER) {
            VerifyMode::CertNone
        } else if flags.contains(SslVerifyMode::FAIL_IF_NO_PEER_CERT) {
            VerifyMode::CertRequired
        } else {
            VerifyMode::CertOptional
        }
    }
}

/// A private key passphrase source.
///
/// Every variant resolves to bytes before it reaches the decryption call, so
/// the shape of the source never changes what the TLS library sees.
pub enum Password {
    Text(String),
    Bytes(Vec<u8>),
    Callback(Box<dyn Fn() -> Vec<u8>>),
}

impl Password {
    fn resolve(&self) -> Vec<u8> {
        match self {
            Password::Text(s) => s.as_bytes().to_vec(),
            Password::Bytes(b) => b.clone(),
            Password::Callback(f) => f(),
        }
    }
}

impl std::fmt::Debug for Password {
    // never print the secret
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Password::Text(_) => "Text",
            Password::Bytes(_) => "Bytes",
            Password::Callback(_) => "Callback",
        };
        write!(f, "Password::{kind}(..)")
    }
}

/// Per-connection knobs for [`TlsContext::wrap_socket`].
#[derive(Debug)]
pub struct WrapOptions {
    /// Accept-state handshake instead of connect-state.
    pub server_side: bool,
    /// Run the handshake inside `wrap_socket`. When false the caller drives
    /// it later through [`TlsSocket::do_handshake`].
    pub do_handshake: bool,
    /// Treat an EOF without close_notify as a normal end of stream.
    pub suppress_ragged_eofs: bool,
    /// SNI name for client-side handshakes. IP literals are skipped, they
    /// have no place in SNI.
    pub server_hostname: Option<String>,
}

impl Default for WrapOptions {
    fn default() -> Self {
        WrapOptions {
            server_side: false,
            do_handshake: true,
            suppress_ragged_eofs: true,
            server_hostname: None,
        }
    }
}

/// Reusable TLS configuration: verify policy, trust anchors, certificate
/// chain, ciphers and ALPN.
///
/// The underlying `SSL_CTX` is never frozen; each [`wrap_socket`] mints a
/// connection from the live builder, so configuration and wrapping can
/// interleave.
///
/// [`wrap_socket`]: Self::wrap_socket
pub struct TlsContext {
    ctx: SslContextBuilder,
    options: SslOptions,
    check_hostname: bool,
}

impl TlsContext {
    pub fn new(protocol: TlsProtocol) -> Result<Self> {
        let ctx = SslContextBuilder::new(protocol.method())
            .or_err(ConfigError, "failed to initialize the TLS method")?;
        Ok(TlsContext {
            ctx,
            options: SslOptions::empty(),
            check_hostname: false,
        })
    }

    /// Hostname verification is the caller's job; this adapter never does it.
    pub fn check_hostname(&self) -> bool {
        self.check_hostname
    }

    /// The full option set currently in effect.
    pub fn options(&self) -> SslOptions {
        self.options
    }

    /// Add `options` to the context, returning the resulting full set.
    /// Options accumulate; they cannot be removed here.
    pub fn set_options(&mut self, options: SslOptions) -> SslOptions {
        self.options = self.ctx.set_options(options);
        self.options
    }

    /// The verify policy, read back from the live context.
    pub fn verify_mode(&self) -> VerifyMode {
        VerifyMode::from_flags(ext::context_ref(&self.ctx).verify_mode())
    }

    /// Set the verify policy. The verify callback accepts exactly when the
    /// chain verified cleanly.
    pub fn set_verify_mode(&mut self, mode: VerifyMode) {
        self.ctx
            .set_verify_callback(mode.to_flags(), |ok, _ctx| ok);
    }

    /// Trust the system's default CA paths.
    pub fn set_default_verify_paths(&mut self) -> Result<()> {
        self.ctx
            .set_default_verify_paths()
            .or_err(InvalidCert, "failed to load default verify paths")
    }

    /// Set the cipher list from an OpenSSL cipher string.
    pub fn set_ciphers(&mut self, ciphers: &str) -> Result<()> {
        self.ctx
            .set_cipher_list(ciphers)
            .or_err_with(ConfigError, || format!("invalid cipher list {ciphers:?}"))
    }

    /// Set the cipher list from individual cipher names.
    pub fn set_cipher_list_from<S: AsRef<str>>(&mut self, ciphers: &[S]) -> Result<()> {
        let joined = ciphers
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(":");
        self.set_ciphers(&joined)
    }

    /// Load trust anchors from a CA file, a hashed CA directory, and/or
    /// in-memory certificate data (a PEM stack, or a single DER certificate).
    pub fn load_verify_locations(
        &mut self,
        cafile: Option<&Path>,
        capath: Option<&Path>,
        cadata: Option<&[u8]>,
    ) -> Result<()> {
        ext::load_verify_locations(&mut self.ctx, cafile, capath)
            .or_err(InvalidCert, "failed to load trust anchors")?;
        if let Some(data) = cadata {
            let certs = match X509::stack_from_pem(data) {
                Ok(certs) if !certs.is_empty() => certs,
                _ => {
                    ext::clear_error_stack();
                    vec![X509::from_der(data).or_err(
                        InvalidCert,
                        "cadata is neither PEM nor DER encoded certificates",
                    )?]
                }
            };
            let store = self.ctx.cert_store_mut();
            for cert in certs {
                store
                    .add_cert(cert)
                    .or_err(InvalidCert, "failed to add cadata certificate to store")?;
            }
        }
        Ok(())
    }

    /// Load this side's certificate chain and private key.
    ///
    /// With no `keyfile` the key is read from `certfile`. An encrypted key
    /// needs a `password`; it is resolved once and used to decrypt the PEM.
    pub fn load_cert_chain(
        &mut self,
        certfile: &Path,
        keyfile: Option<&Path>,
        password: Option<&Password>,
    ) -> Result<()> {
        self.ctx
            .set_certificate_chain_file(certfile)
            .or_err_with(InvalidCert, || {
                format!("failed to load certificate chain from {}", certfile.display())
            })?;
        let keyfile = keyfile.unwrap_or(certfile);
        match password {
            Some(password) => {
                let pem = std::fs::read(keyfile).or_err_with(FileReadError, || {
                    format!("failed to read key file {}", keyfile.display())
                })?;
                let key = PKey::private_key_from_pem_passphrase(&pem, &password.resolve())
                    .or_err(InvalidCert, "failed to decrypt private key")?;
                self.ctx
                    .set_private_key(&key)
                    .or_err(InvalidCert, "failed to set private key")?;
            }
            None => {
                self.ctx
                    .set_private_key_file(keyfile, SslFiletype::PEM)
                    .or_err_with(InvalidCert, || {
                        format!("failed to load private key from {}", keyfile.display())
                    })?;
            }
        }
        self.ctx
            .check_private_key()
            .or_err(InvalidCert, "private key does not match the certificate")
    }

    /// Offer these ALPN protocols, in preference order.
    pub fn set_alpn_protocols<S: AsRef<str>>(&mut self, protocols: &[S]) -> Result<()> {
        let wire = alpn_to_wire(protocols)?;
        self.ctx
            .set_alpn_protos(&wire)
            .or_err(ConfigError, "failed to set ALPN protocols")
    }

    /// Establish a TLS connection over `stream`.
    ///
    /// The socket is forced into blocking mode; want-read/want-write from the
    /// engine turns into readiness waits bounded by the socket timeout. With
    /// the default options this performs the client handshake, sending
    /// `server_hostname` as SNI, before returning.
    pub fn wrap_socket(
        &self,
        stream: TcpStream,
        opts: WrapOptions,
    ) -> Result<TlsSocket<OpensslSession, TcpTransport>> {
        let mut ssl = ext::ssl_from_context_builder(&self.ctx)
            .or_err(TLSHandshakeFailure, "failed to create TLS connection state")?;
        if opts.server_side {
            ssl.set_accept_state();
        } else {
            ssl.set_connect_state();
        }
        if !opts.server_side {
            if let Some(hostname) = opts.server_hostname.as_deref() {
                if hostname.parse::<IpAddr>().is_err() {
                    ssl.set_hostname(hostname).or_err_with(InternalError, || {
                        format!("failed to set SNI hostname {hostname:?}")
                    })?;
                }
            }
        }
        let transport = TcpTransport::new(Arc::new(stream));
        transport.set_blocking(true)?;
        let mut session = OpensslSession::new(ssl, transport.shared())?;
        if opts.do_handshake {
            debug!(
                "starting TLS handshake, server_side={} sni={:?}",
                opts.server_side, opts.server_hostname
            );
            handshake_loop(&mut session, &transport)?;
            debug!(
                "TLS handshake complete, version {:?}",
                session.protocol_version()
            );
        }
        Ok(TlsSocket::new(
            session,
            transport,
            opts.suppress_ragged_eofs,
        ))
    }
}

fn alpn_to_wire<S: AsRef<str>>(protocols: &[S]) -> Result<Vec<u8>> {
    let mut wire = Vec::with_capacity(protocols.iter().map(|p| p.as_ref().len() + 1).sum());
    for protocol in protocols {
        let bytes = protocol.as_ref().as_bytes();
        if bytes.is_empty() || bytes.len() > 255 {
            return Error::e_explain(
                ConfigError,
                format!("invalid ALPN protocol length {}", bytes.len()),
            );
        }
        wire.push(bytes.len() as u8);
        wire.extend_from_slice(bytes);
    }
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::testing::self_signed;

    #[test]
    fn test_new_for_each_protocol() {
        for protocol in [TlsProtocol::Tls, TlsProtocol::TlsClient, TlsProtocol::TlsServer] {
            TlsContext::new(protocol).unwrap();
        }
    }

    #[test]
    fn test_verify_mode_round_trip() {
        let mut ctx = TlsContext::new(TlsProtocol::TlsClient).unwrap();
        for mode in [
            VerifyMode::CertRequired,
            VerifyMode::CertOptional,
            VerifyMode::CertNone,
        ] {
            ctx.set_verify_mode(mode);
            assert_eq!(ctx.verify_mode(), mode);
        }
    }

    #[test]
    fn test_options_accumulate() {
        let mut ctx = TlsContext::new(TlsProtocol::Tls).unwrap();
        let after = ctx.set_options(SslOptions::NO_COMPRESSION);
        assert!(after.contains(SslOptions::NO_COMPRESSION));
        let after = ctx.set_options(SslOptions::NO_TLSV1);
        assert!(after.contains(SslOptions::NO_COMPRESSION));
        assert!(after.contains(SslOptions::NO_TLSV1));
        assert_eq!(ctx.options(), after);
    }

    #[test]
    fn test_check_hostname_stays_off() {
        let ctx = TlsContext::new(TlsProtocol::TlsClient).unwrap();
        assert!(!ctx.check_hostname());
    }

    #[test]
    fn test_alpn_wire_format() {
        let wire = alpn_to_wire(&["h2", "http/1.1"]).unwrap();
        assert_eq!(wire, b"\x02h2\x08http/1.1");
    }

    #[test]
    fn test_alpn_rejects_oversized_protocol() {
        let long = "x".repeat(256);
        let err = alpn_to_wire(&[long.as_str()]).unwrap_err();
        assert_eq!(err.etype(), &ConfigError);
    }

    #[test]
    fn test_set_alpn_protocols() {
        let mut ctx = TlsContext::new(TlsProtocol::TlsClient).unwrap();
        ctx.set_alpn_protocols(&["h2", "http/1.1"]).unwrap();
    }

    #[test]
    fn test_bad_cipher_list_rejected() {
        let mut ctx = TlsContext::new(TlsProtocol::Tls).unwrap();
        assert!(ctx.set_ciphers("NOT-A-CIPHER").is_err());
        ctx.set_cipher_list_from(&["HIGH", "!aNULL"]).unwrap();
    }

    #[test]
    fn test_cadata_pem_accepted() {
        let (cert, _key) = self_signed("ca.example", &[], &[]);
        let pem = cert.to_pem().unwrap();
        let mut ctx = TlsContext::new(TlsProtocol::TlsClient).unwrap();
        ctx.load_verify_locations(None, None, Some(&pem)).unwrap();
    }

    #[test]
    fn test_cadata_der_accepted() {
        let (cert, _key) = self_signed("ca.example", &[], &[]);
        let der = cert.to_der().unwrap();
        let mut ctx = TlsContext::new(TlsProtocol::TlsClient).unwrap();
        ctx.load_verify_locations(None, None, Some(&der)).unwrap();
    }

    #[test]
    fn test_cadata_garbage_rejected() {
        let mut ctx = TlsContext::new(TlsProtocol::TlsClient).unwrap();
        let err = ctx
            .load_verify_locations(None, None, Some(b"certainly not a cert"))
            .unwrap_err();
        assert_eq!(err.etype(), &InvalidCert);
    }

    #[test]
    fn test_password_resolution() {
        assert_eq!(
            Password::Text("hunter2".to_string()).resolve(),
            b"hunter2".to_vec()
        );
        assert_eq!(Password::Bytes(vec![1, 2, 3]).resolve(), vec![1, 2, 3]);
        let cb = Password::Callback(Box::new(|| b"from-callback".to_vec()));
        assert_eq!(cb.resolve(), b"from-callback".to_vec());
        assert_eq!(format!("{cb:?}"), "Password::Callback(..)");
    }
}
