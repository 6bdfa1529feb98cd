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

use foreign_types::ForeignTypeRef;
use libc::{c_char, c_int};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::ssl::{Ssl, SslContextBuilder, SslContextRef};
use openssl::x509::X509Ref;
use std::ffi::CString;
use std::path::Path;

fn cvt(r: c_int) -> Result<c_int, ErrorStack> {
    if r != 1 {
        Err(ErrorStack::get())
    } else {
        Ok(r)
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString, ErrorStack> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(|_| ErrorStack::get())
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString, ErrorStack> {
    let s = path.to_str().ok_or_else(ErrorStack::get)?;
    CString::new(s).map_err(|_| ErrorStack::get())
}

/// Borrow the [SslContextRef] behind a live [SslContextBuilder].
///
/// The builder keeps mutating the same `SSL_CTX` it will eventually hand out,
/// so connections can be minted from it while it is still configurable.
pub fn context_ref(builder: &SslContextBuilder) -> &SslContextRef {
    unsafe { SslContextRef::from_ptr(builder.as_ptr()) }
}

/// Create a new [Ssl] bound to the context a [SslContextBuilder] is building.
///
/// Unlike `builder.build()` this does not consume the builder: the context
/// stays open for further configuration and more connections.
pub fn ssl_from_context_builder(builder: &SslContextBuilder) -> Result<Ssl, ErrorStack> {
    Ssl::new(context_ref(builder))
}

/// Load trusted anchors from a CA file and/or a hashed CA directory.
///
/// See [SSL_CTX_load_verify_locations](https://www.openssl.org/docs/man1.1.1/man3/SSL_CTX_load_verify_locations.html).
/// The safe API only exposes the single-file form (`set_ca_file`); this
/// accepts the file/dir pair. A call with neither is a no-op.
pub fn load_verify_locations(
    builder: &mut SslContextBuilder,
    cafile: Option<&Path>,
    capath: Option<&Path>,
) -> Result<(), ErrorStack> {
    if cafile.is_none() && capath.is_none() {
        return Ok(());
    }
    let cafile = cafile.map(path_to_cstring).transpose()?;
    let capath = capath.map(path_to_cstring).transpose()?;
    unsafe {
        cvt(openssl_sys::SSL_CTX_load_verify_locations(
            builder.as_ptr(),
            cafile
                .as_ref()
                .map_or(std::ptr::null(), |f| f.as_ptr() as *const c_char),
            capath
                .as_ref()
                .map_or(std::ptr::null(), |p| p.as_ptr() as *const c_char),
        ))?;
    }
    Ok(())
}

/// Whether a certificate carries an extension with the given NID.
///
/// The safe API only exposes decoded extensions, so a present-but-undecodable
/// extension is indistinguishable from an absent one without this check.
pub fn has_extension(cert: &X509Ref, nid: Nid) -> bool {
    unsafe { openssl_sys::X509_get_ext_by_NID(cert.as_ptr(), nid.as_raw(), -1) >= 0 }
}

/// Clear the error stack
///
/// SSL calls should check and clear the OpenSSL error stack. But some calls fail to do so.
/// This causes the next unrelated SSL call to fail due to the leftover errors. This function
/// allows the caller to clear the error stack before performing SSL calls to avoid this issue.
pub fn clear_error_stack() {
    let _ = ErrorStack::get();
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::ssl::{SslMethod, SslVerifyMode};

    #[test]
    fn test_context_ref_sees_builder_state() {
        let mut builder = SslContextBuilder::new(SslMethod::tls()).unwrap();
        builder.set_verify(SslVerifyMode::PEER);
        assert_eq!(context_ref(&builder).verify_mode(), SslVerifyMode::PEER);
    }

    #[test]
    fn test_ssl_from_context_builder_keeps_builder_alive() {
        let builder = SslContextBuilder::new(SslMethod::tls()).unwrap();
        let _ssl1 = ssl_from_context_builder(&builder).unwrap();
        // a second connection can still be minted
        let _ssl2 = ssl_from_context_builder(&builder).unwrap();
    }

    #[test]
    fn test_load_verify_locations_missing_file() {
        let mut builder = SslContextBuilder::new(SslMethod::tls()).unwrap();
        assert!(load_verify_locations(
            &mut builder,
            Some(Path::new("/nonexistent/ca.pem")),
            None
        )
        .is_err());
        clear_error_stack();
        // neither argument is a no-op
        assert!(load_verify_locations(&mut builder, None, None).is_ok());
    }
}
