//! Public-key pinning decision.
//!
//! [`KeyPinner::validate`] answers one question: may a connection to
//! `domain` presenting this server trust proceed?  It is deliberately
//! independent of the TLS library; [`ServerTrust`] is the seam.

use sha2::{Digest, Sha256};
use x509_parser::parse_x509_certificate;

use super::pins::{encode_digest, KeyDigest, PinSet};

// ---------------------------------------------------------------------------
// ServerTrust
// ---------------------------------------------------------------------------

/// What the pinner needs to know about a presented certificate chain.
pub trait ServerTrust {
    /// Outcome of standard chain-of-trust evaluation.
    fn evaluate(&self) -> Result<(), String>;

    /// DER bytes of the leaf certificate, if one was presented.
    fn leaf_certificate(&self) -> Option<&[u8]>;
}

// ---------------------------------------------------------------------------
// Key digests
// ---------------------------------------------------------------------------

/// Digests of a leaf certificate's public key in both common encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafKeyDigests {
    /// SHA-256 of the DER `SubjectPublicKeyInfo` (RFC 7469 pin form).
    pub spki: KeyDigest,
    /// SHA-256 of the bare subject-public-key bits (PKCS#1 for RSA keys).
    pub public_key: KeyDigest,
}

impl LeafKeyDigests {
    fn matches(&self, accepted: &[KeyDigest]) -> bool {
        accepted.contains(&self.spki) || accepted.contains(&self.public_key)
    }
}

/// Parse `der` and digest its public key.
pub fn leaf_key_digests(der: &[u8]) -> Result<LeafKeyDigests, String> {
    let (_, cert) = parse_x509_certificate(der).map_err(|e| e.to_string())?;
    let spki = cert.public_key();
    Ok(LeafKeyDigests {
        spki: Sha256::digest(spki.raw).into(),
        public_key: Sha256::digest(&spki.subject_public_key.data[..]).into(),
    })
}

// ---------------------------------------------------------------------------
// KeyPinner
// ---------------------------------------------------------------------------

/// Validates server keys against a [`PinSet`].  Fails closed.
#[derive(Debug, Clone, Default)]
pub struct KeyPinner {
    pins: PinSet,
}

impl KeyPinner {
    pub fn new(pins: PinSet) -> Self {
        Self { pins }
    }

    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    /// `true` if a connection to `domain` with this trust may proceed.
    ///
    /// Unpinned domains are always accepted here; their chain is checked by
    /// the TLS layer.  Pinned domains need a valid chain *and* a leaf key
    /// whose digest is in the accepted set.
    pub fn validate(&self, trust: &dyn ServerTrust, domain: &str) -> bool {
        let Some(accepted) = self.pins.accepted(domain) else {
            return true;
        };

        if let Err(reason) = trust.evaluate() {
            log::error!("standard certificate validation failed for {domain}: {reason}");
            return false;
        }

        let Some(leaf) = trust.leaf_certificate() else {
            log::error!("no leaf certificate presented by {domain}");
            return false;
        };

        let digests = match leaf_key_digests(leaf) {
            Ok(digests) => digests,
            Err(e) => {
                log::error!("failed to extract public key for {domain}: {e}");
                return false;
            }
        };

        if digests.matches(accepted) {
            log::debug!("public key pinning succeeded for {domain}");
            return true;
        }

        let expected: Vec<String> = accepted.iter().map(encode_digest).collect();
        log::error!("public key pinning failed for {domain}");
        log::error!("  expected one of: {expected:?}");
        log::error!(
            "  received: spki={} key={}",
            encode_digest(&digests.spki),
            encode_digest(&digests.public_key)
        );
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
