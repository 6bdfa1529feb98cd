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

//! Peer certificate projection: DER export, subject common name and the
//! Subject Alternative Name list in a structured form.

use log::warn;
use std::net::{Ipv4Addr, Ipv6Addr};
use tlsbridge_error::ErrorType::InvalidCert;
use tlsbridge_error::{OrErr, Result};

use crate::name::dns_name_to_ascii;
use crate::tls::ext;
use crate::tls::nid::Nid;
use crate::tls::x509::{X509, X509Ref};

/// One entry of a certificate's subjectAltName extension.
///
/// Entries keep the certificate's extension ordering and are never
/// deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanEntry {
    Dns(String),
    IpAddress(String),
}

impl SanEntry {
    /// The stdlib-style kind tag of this entry.
    pub fn kind(&self) -> &'static str {
        match self {
            SanEntry::Dns(_) => "DNS",
            SanEntry::IpAddress(_) => "IP Address",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            SanEntry::Dns(v) => v,
            SanEntry::IpAddress(v) => v,
        }
    }
}

/// A peer certificate, either as the native handle the TLS engine produced
/// or as raw DER obtained elsewhere (re-parsed on demand).
#[derive(Debug, Clone)]
pub enum PeerCert {
    Parsed(X509),
    Der(Vec<u8>),
}

impl PeerCert {
    /// The DER encoding of the certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        match self {
            PeerCert::Parsed(cert) => cert
                .to_der()
                .or_err(InvalidCert, "failed to encode certificate as DER"),
            PeerCert::Der(der) => Ok(der.clone()),
        }
    }

    /// A parsed handle to the certificate. Cheap for the native variant
    /// (refcount bump), a full parse for the DER variant.
    pub fn to_x509(&self) -> Result<X509> {
        match self {
            PeerCert::Parsed(cert) => Ok(cert.clone()),
            PeerCert::Der(der) => X509::from_der(der).or_err_with(InvalidCert, || {
                format!("failed to parse {} bytes of DER as X509", der.len())
            }),
        }
    }
}

/// The structured form of a peer certificate, shaped like the mapping a
/// stdlib-style `getpeercert()` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertInfo {
    /// Best effort subject: a single RDN holding the common name, when the
    /// certificate has one. Not a full distinguished-name decode.
    pub subject: Vec<(String, String)>,
    /// The subjectAltName entries, in extension order.
    pub subject_alt_name: Vec<SanEntry>,
}

impl PeerCertInfo {
    pub fn from_cert(cert: &X509Ref) -> Self {
        let subject = common_name(cert)
            .map(|cn| vec![("commonName".to_string(), cn)])
            .unwrap_or_default();
        PeerCertInfo {
            subject,
            subject_alt_name: subject_alt_names(cert),
        }
    }
}

fn get_subject_name(cert: &X509Ref, name_type: Nid) -> Option<String> {
    // decode the raw entry bytes; an interior NUL must not truncate the name
    cert.subject_name()
        .entries_by_nid(name_type)
        .next()
        .map(|name| String::from_utf8_lossy(name.data().as_slice()).into_owned())
}

/// Return the common name of the certificate subject.
pub fn common_name(cert: &X509Ref) -> Option<String> {
    get_subject_name(cert, Nid::COMMONNAME)
}

fn render_ip(raw: &[u8]) -> String {
    match raw.len() {
        4 => Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]).to_string(),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(raw);
            Ipv6Addr::from(octets).to_string()
        }
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Extract the subjectAltName entries of a certificate.
///
/// Returns an empty list when the extension is absent. An extension that is
/// present but cannot be decoded also yields an empty list, with one warning
/// logged; a corrupt certificate must not take the connection down just
/// because someone asked for its SAN list. General-name kinds other than DNS
/// and IP (email, URI, ...) are skipped. DNS entries that normalize to the
/// empty sentinel are dropped.
pub fn subject_alt_names(cert: &X509Ref) -> Vec<SanEntry> {
    let Some(names) = cert.subject_alt_names() else {
        if ext::has_extension(cert, Nid::SUBJECT_ALT_NAME) {
            warn!("subjectAltName extension present but undecodable, treating as empty");
        }
        return Vec::new();
    };
    names
        .iter()
        .filter_map(|general_name| {
            if let Some(dns) = general_name.dnsname() {
                dns_name_to_ascii(dns).map(SanEntry::Dns)
            } else if let Some(ip) = general_name.ipaddress() {
                Some(SanEntry::IpAddress(render_ip(ip)))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Throwaway self-signed certificates for tests.

    use crate::tls::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
    use crate::tls::hash::MessageDigest;
    use crate::tls::pkey::{PKey, Private};
    use crate::tls::rsa::Rsa;
    use crate::tls::x509::extension::SubjectAlternativeName;
    use crate::tls::x509::{X509, X509Extension, X509NameBuilder};

    pub(crate) fn self_signed(
        cn: &str,
        dns_sans: &[&str],
        ip_sans: &[&str],
    ) -> (X509, PKey<Private>) {
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(30).unwrap())
            .unwrap();
        if !dns_sans.is_empty() || !ip_sans.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for dns in dns_sans {
                san.dns(dns);
            }
            for ip in ip_sans {
                san.ip(ip);
            }
            let san = san.build(&builder.x509v3_context(None, None)).unwrap();
            builder.append_extension(san).unwrap();
        }
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();
        (builder.build(), pkey)
    }

    /// A certificate whose subjectAltName extension carries DER that does
    /// not decode as GeneralNames (a truncated SEQUENCE).
    pub(crate) fn garbled_san(cn: &str) -> X509 {
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(30).unwrap())
            .unwrap();
        let oid = Asn1Object::from_str("2.5.29.17").unwrap();
        let contents = Asn1OctetString::new_from_bytes(&[0x30, 0x81]).unwrap();
        let ext = X509Extension::new_from_der(&oid, false, &contents).unwrap();
        builder.append_extension(ext).unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::self_signed;
    use super::*;

    #[test]
    fn test_san_ordering_and_kinds() {
        let (cert, _key) = self_signed(
            "example.com",
            &["example.com", "www.example.com"],
            &["10.0.0.1"],
        );
        let sans = subject_alt_names(&cert);
        assert_eq!(
            sans,
            vec![
                SanEntry::Dns("example.com".to_string()),
                SanEntry::Dns("www.example.com".to_string()),
                SanEntry::IpAddress("10.0.0.1".to_string()),
            ]
        );
        assert_eq!(sans[0].kind(), "DNS");
        assert_eq!(sans[2].kind(), "IP Address");
        assert_eq!(sans[2].value(), "10.0.0.1");
    }

    #[test]
    fn test_san_absent_is_empty() {
        let (cert, _key) = self_signed("no-san.example", &[], &[]);
        assert!(subject_alt_names(&cert).is_empty());
    }

    #[test]
    fn test_san_undecodable_is_empty() {
        let cert = testing::garbled_san("broken.example");
        // the extension is there, it just does not decode
        assert!(crate::tls::ext::has_extension(
            &cert,
            Nid::SUBJECT_ALT_NAME
        ));
        assert!(subject_alt_names(&cert).is_empty());
    }

    #[test]
    fn test_san_unicode_normalized() {
        let (cert, _key) = self_signed("idn.example", &["bücher.example"], &[]);
        assert_eq!(
            subject_alt_names(&cert),
            vec![SanEntry::Dns("xn--bcher-kva.example".to_string())]
        );
    }

    #[test]
    fn test_common_name_keeps_embedded_nul() {
        let (cert, _key) = self_signed("null\0byte.example", &[], &[]);
        assert_eq!(common_name(&cert), Some("null\0byte.example".to_string()));
    }

    #[test]
    fn test_peer_cert_info() {
        let (cert, _key) = self_signed("example.com", &["example.com"], &[]);
        let info = PeerCertInfo::from_cert(&cert);
        assert_eq!(
            info.subject,
            vec![("commonName".to_string(), "example.com".to_string())]
        );
        assert_eq!(
            info.subject_alt_name,
            vec![SanEntry::Dns("example.com".to_string())]
        );
    }

    #[test]
    fn test_peer_cert_der_round_trip() {
        let (cert, _key) = self_signed("example.com", &["example.com"], &[]);
        let der = PeerCert::Parsed(cert).to_der().unwrap();
        let reparsed = PeerCert::Der(der).to_x509().unwrap();
        assert_eq!(common_name(&reparsed), Some("example.com".to_string()));
    }

    #[test]
    fn test_peer_cert_bad_der() {
        let garbage = PeerCert::Der(b"not a certificate".to_vec());
        assert!(garbage.to_x509().is_err());
    }
}
