//! Persisted library records: [`FileEntry`] and the [`IndexFile`] wrapper.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written to new `index.json` files.
pub const INDEX_VERSION: &str = "1.0";

/// One generated audio file as recorded in `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Unique id (`{epoch_hex}-{random_hex}`), also the file stem on disk.
    pub id: String,
    /// Display name derived from the input text, with extension.
    pub filename: String,
    /// Path relative to the outputs root: `{config_hash}/{id}.{ext}`.
    pub path: String,
    /// Full input text.
    pub text: String,
    pub voice: String,
    pub model: String,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FileEntry {
    /// Absolute location of the audio file under `root`.
    pub fn full_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }

    /// Bucket directory name (the config hash).
    pub fn config_hash(&self) -> &str {
        self.path.split('/').next().unwrap_or_default()
    }

    /// File extension of the stored audio.
    pub fn format(&self) -> &str {
        Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }
}

/// On-disk shape of `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFile {
    pub version: String,
    pub files: Vec<FileEntry>,
}

impl Default for IndexFile {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            files: Vec::new(),
        }
    }
}
