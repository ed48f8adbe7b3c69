//! Voice catalog and the repository that serves it.
//!
//! The speech API's voices are fixed, so the catalog is a const table and
//! [`StaticVoiceRepository`] never touches the network.

use async_trait::async_trait;
use serde::Serialize;

use crate::network::TransportError;

// ---------------------------------------------------------------------------
// Voice
// ---------------------------------------------------------------------------

/// Static metadata for one synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Voice {
    /// Identifier sent to the API (e.g. `"ash"`).
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// One-line description of the timbre.
    pub description: &'static str,
}

/// All voices offered by the speech API.
pub const AVAILABLE_VOICES: &[Voice] = &[
    Voice {
        id: "alloy",
        name: "Alloy",
        description: "Neutral and balanced",
    },
    Voice {
        id: "echo",
        name: "Echo",
        description: "Clear and articulate",
    },
    Voice {
        id: "fable",
        name: "Fable",
        description: "Warm and expressive",
    },
    Voice {
        id: "onyx",
        name: "Onyx",
        description: "Deep and authoritative",
    },
    Voice {
        id: "nova",
        name: "Nova",
        description: "Energetic and bright",
    },
    Voice {
        id: "shimmer",
        name: "Shimmer",
        description: "Soft and gentle",
    },
    Voice {
        id: "ash",
        name: "Ash",
        description: "Natural and conversational",
    },
];

impl Voice {
    /// The API's documented default voice.
    pub const DEFAULT: Voice = Voice {
        id: "ash",
        name: "Ash",
        description: "Natural and conversational",
    };
}

impl Default for Voice {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Look up a voice by its API identifier.
pub fn find_voice(id: &str) -> Option<&'static Voice> {
    AVAILABLE_VOICES.iter().find(|v| v.id == id)
}

// ---------------------------------------------------------------------------
// VoiceRepository
// ---------------------------------------------------------------------------

/// Source of the voice list exposed to the UI layer.
#[async_trait]
pub trait VoiceRepository: Send + Sync {
    async fn check_server_health(&self) -> Result<bool, TransportError>;

    async fn fetch_voices(&self, force_fresh: bool) -> Result<Vec<Voice>, TransportError>;
}

/// Serves [`AVAILABLE_VOICES`]; always healthy, never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticVoiceRepository;

#[async_trait]
impl VoiceRepository for StaticVoiceRepository {
    async fn check_server_health(&self) -> Result<bool, TransportError> {
        Ok(true)
    }

    async fn fetch_voices(&self, _force_fresh: bool) -> Result<Vec<Voice>, TransportError> {
        Ok(AVAILABLE_VOICES.to_vec())
    }
}
