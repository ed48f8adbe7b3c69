//! Certificate public-key pinning.
//!
//! * [`PinSet`]: accepted key digests per domain, built from settings.
//! * [`KeyPinner`]: the pass/fail decision for one presented chain.
//! * [`PinnedCertVerifier`]: plugs the decision into the rustls handshake.

pub mod pinner;
pub mod pins;
pub mod verifier;

pub use pinner::{leaf_key_digests, KeyPinner, LeafKeyDigests, ServerTrust};
pub use pins::{decode_digest, encode_digest, KeyDigest, PinError, PinSet};
pub use verifier::{pinned_client_config, PinnedCertVerifier, TlsSetupError};
