//! rustls integration: a certificate verifier that consults [`KeyPinner`].

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{VerifierBuilderError, WebPkiServerVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;

use super::pinner::{KeyPinner, ServerTrust};

/// The TLS client configuration could not be assembled.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to build certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error("failed to build TLS client config: {0}")]
    Config(#[from] rustls::Error),
}

// ---------------------------------------------------------------------------
// PinnedCertVerifier
// ---------------------------------------------------------------------------

/// Standard webpki verification followed by the pinning decision.
///
/// A pin failure aborts the handshake, so no response bytes are ever read
/// from a server with an unexpected key.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    inner: Arc<dyn ServerCertVerifier>,
    pinner: Arc<KeyPinner>,
}

impl PinnedCertVerifier {
    /// Verify chains against the Mozilla root set from `webpki-roots`.
    pub fn new(
        pinner: Arc<KeyPinner>,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, TlsSetupError> {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider).build()?;
        Ok(Self::with_inner(inner, pinner))
    }

    /// Wrap an arbitrary chain verifier.
    pub fn with_inner(inner: Arc<dyn ServerCertVerifier>, pinner: Arc<KeyPinner>) -> Self {
        Self { inner, pinner }
    }
}

/// Adapts one handshake's chain result to [`ServerTrust`].
struct HandshakeTrust<'a> {
    chain: Result<(), String>,
    leaf: &'a [u8],
}

impl ServerTrust for HandshakeTrust<'_> {
    fn evaluate(&self) -> Result<(), String> {
        self.chain.clone()
    }

    fn leaf_certificate(&self) -> Option<&[u8]> {
        Some(self.leaf)
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verified =
            self.inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);

        let domain = match server_name {
            ServerName::DnsName(name) => name.as_ref().to_string(),
            _ => return verified,
        };
        if !self.pinner.pins().is_pinned(&domain) {
            return verified;
        }

        let trust = HandshakeTrust {
            chain: verified.as_ref().map(|_| ()).map_err(|e| e.to_string()),
            leaf: end_entity.as_ref(),
        };
        if self.pinner.validate(&trust, &domain) {
            return verified;
        }

        Err(match verified {
            Err(e) => e,
            Ok(_) => rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure),
        })
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Build a rustls client config (ring provider) that enforces `pinner`.
pub fn pinned_client_config(pinner: Arc<KeyPinner>) -> Result<ClientConfig, TlsSetupError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinnedCertVerifier::new(pinner, Arc::clone(&provider))?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
