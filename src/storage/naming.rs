//! Deterministic bucket keys, unique ids and display filenames.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::models::GenerationConfig;

/// Longest display-name stem, in characters.
pub const MAX_FILENAME_CHARS: usize = 50;

/// Lowercase hex SHA-256 of `voice-model-speed-format`.
///
/// The input text is not part of the key, so every generation with the same
/// settings lands in the same bucket.
pub fn config_hash(voice: &str, model: &str, speed: f64, format: &str) -> String {
    let key = format!("{voice}-{model}-{speed:?}-{format}");
    Sha256::digest(key.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn config_hash_of(config: &GenerationConfig) -> String {
    config_hash(
        config.voice(),
        config.model(),
        config.speed(),
        config.response_format(),
    )
}

/// `{epoch seconds, hex}-{24 random bits, 6 hex digits}`.
pub fn unique_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen_range(0..=0xFF_FFFF);
    format!("{secs:x}-{suffix:06x}")
}

/// Reduce `text` to alphanumerics, `-` and `_`.
///
/// Runs of anything else become one `-`; the result has no leading or
/// trailing dash and at most [`MAX_FILENAME_CHARS`] characters.
pub fn sanitize_filename(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_FILENAME_CHARS * 4));
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            if pending_dash && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    let truncated: String = out
        .trim_matches('-')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    truncated.trim_end_matches('-').to_string()
}

/// Display filename: sanitized stem plus `.{format}`.
///
/// Text with no usable characters gives a bare `.{format}`.  The name is
/// only shown to users; the file on disk is keyed by id.
pub fn display_filename(text: &str, format: &str) -> String {
    format!("{}.{format}", sanitize_filename(text))
}
