//! [`PinSet`]: accepted public-key digests per domain.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

use crate::config::PinningConfig;

/// SHA-256 digest of a public key.
pub type KeyDigest = [u8; 32];

/// A configured pin could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pin for {domain} is not a base64 or hex SHA-256 digest: {value:?}")]
pub struct PinError {
    pub domain: String,
    pub value: String,
}

/// Immutable map of domain → accepted key digests.
///
/// Lookups are case-insensitive and ignore a trailing dot.  A domain that is
/// not present is unpinned.
#[derive(Debug, Clone, Default)]
pub struct PinSet {
    pins: HashMap<String, Vec<KeyDigest>>,
}

impl PinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from settings.  A disabled config yields an empty set.
    pub fn from_config(config: &PinningConfig) -> Result<Self, PinError> {
        let mut set = Self::new();
        if !config.enabled {
            return Ok(set);
        }
        for (domain, values) in &config.pins {
            set = set.with_pins(domain, values.iter().map(String::as_str))?;
        }
        Ok(set)
    }

    /// Add encoded pins for `domain`, keeping order and dropping duplicates.
    pub fn with_pins<'a>(
        mut self,
        domain: &str,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, PinError> {
        let accepted = self.pins.entry(normalize_domain(domain)).or_default();
        for value in values {
            let digest = decode_digest(value).ok_or_else(|| PinError {
                domain: domain.to_string(),
                value: value.to_string(),
            })?;
            if !accepted.contains(&digest) {
                accepted.push(digest);
            }
        }
        Ok(self)
    }

    /// Accepted digests for `domain`, or `None` when it is unpinned.
    pub fn accepted(&self, domain: &str) -> Option<&[KeyDigest]> {
        self.pins.get(&normalize_domain(domain)).map(Vec::as_slice)
    }

    pub fn is_pinned(&self, domain: &str) -> bool {
        self.accepted(domain).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.pins.keys().map(String::as_str)
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

/// Decode a 32-byte digest written as 64 hex characters or standard base64.
pub fn decode_digest(value: &str) -> Option<KeyDigest> {
    let value = value.trim();
    let bytes = if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        (0..32)
            .map(|i| u8::from_str_radix(&value[i * 2..i * 2 + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .ok()?
    } else {
        STANDARD.decode(value).ok()?
    };
    bytes.try_into().ok()
}

/// Base64 rendering used in log lines.
pub fn encode_digest(digest: &KeyDigest) -> String {
    STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const B64: &str = "SWp7GowOh9sQFGRI7VkCK07L9AyHfSW1aT762TTEHhM=";
    const HEX: &str = "496a7b1a8c0e87db10146448ed59022b4ecbf40c877d25b5693efad934c41e13";

    #[test]
    fn hex_and_base64_decode_to_the_same_digest() {
        let a = decode_digest(B64).expect("base64");
        let b = decode_digest(HEX).expect("hex");
        assert_eq!(a, b);
        assert_eq!(encode_digest(&a), B64);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(decode_digest("AAAA").is_none());
        assert!(decode_digest("not a digest at all").is_none());
        assert!(decode_digest(&HEX[..62]).is_none());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let set = PinSet::new()
            .with_pins("API.Example.test", [B64])
            .expect("valid pin");
        assert!(set.is_pinned("api.example.test"));
        assert!(set.is_pinned("api.example.test."));
        assert!(!set.is_pinned("other.example.test"));
    }

    #[test]
    fn duplicate_pins_collapse() {
        let set = PinSet::new()
            .with_pins("api.example.test", [B64, HEX])
            .expect("valid pins");
        assert_eq!(set.accepted("api.example.test").map(<[_]>::len), Some(1));
    }

    #[test]
    fn invalid_pin_names_domain() {
        let err = PinSet::new()
            .with_pins("api.example.test", ["garbage"])
            .unwrap_err();
        assert_eq!(err.domain, "api.example.test");
    }

    #[test]
    fn from_config_respects_enabled_flag() {
        let mut config = PinningConfig::default();
        let set = PinSet::from_config(&config).expect("defaults decode");
        assert!(set.is_pinned("api.openai.com"));

        config.enabled = false;
        let set = PinSet::from_config(&config).expect("disabled");
        assert!(set.is_empty());
    }
}
