//! Plain data types shared across the crate.
//!
//! * [`GenerationConfig`] / [`ConfigError`]: one generation request and its validation.
//! * [`FileEntry`] / [`IndexFile`]: records persisted in `index.json`.
//! * [`Voice`] / [`VoiceRepository`]: the static voice catalog.

pub mod file_entry;
pub mod generation;
pub mod voice;

pub use file_entry::{FileEntry, IndexFile, INDEX_VERSION};
pub use generation::{ConfigError, GenerationConfig};
pub use voice::{find_voice, StaticVoiceRepository, Voice, VoiceRepository, AVAILABLE_VOICES};
