//! Certificate fingerprinting
//!
//! Only the first certificate of the peer's chain is fingerprinted.

use crate::gemini::store::format_fingerprint;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref};

/// SHA-256 fingerprint of a certificate's DER encoding, formatted for the store
pub fn fingerprint(cert: &X509Ref) -> Result<String, openssl::error::ErrorStack> {
    let digest = cert.digest(MessageDigest::sha256())?;
    Ok(format_fingerprint(&digest))
}

/// Fingerprint of the certificate the peer presented, if it presented one
pub fn peer_fingerprint(ssl: &SslRef) -> Option<String> {
    let cert = ssl.peer_certificate()?;
    match fingerprint(&cert) {
        Ok(fp) => {
            log::debug!("peer certificate CN={}", common_name(cert.subject_name()));
            Some(fp)
        }
        Err(e) => {
            log::warn!("could not digest peer certificate: {}", e);
            None
        }
    }
}

/// Get Common Name from X509_NAME
fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<undef>".to_string())
}
