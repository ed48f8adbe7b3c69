//! Content-addressed audio store.
//!
//! Layout under the outputs root:
//!
//! ```text
//! index.json
//! {config_hash}/{unique_id}.{format}
//! ```
//!
//! The audio file is always written before its index entry, so an entry
//! never points at a file that was not written.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::index::IndexStore;
use super::naming::{config_hash_of, display_filename, unique_id};
use super::StoreError;
use crate::config::OutputDirectories;
use crate::models::{FileEntry, GenerationConfig};

// ---------------------------------------------------------------------------
// ContentStore trait
// ---------------------------------------------------------------------------

/// Persists generated audio.  Blocking; call from the blocking pool.
pub trait ContentStore: Send + Sync {
    fn save(&self, data: &[u8], config: &GenerationConfig) -> Result<FileEntry, StoreError>;
}

// ---------------------------------------------------------------------------
// LocalFileStore
// ---------------------------------------------------------------------------

/// [`ContentStore`] on the local filesystem.
///
/// Index mutations from this process go through `index_lock`.
pub struct LocalFileStore {
    dirs: Arc<dyn OutputDirectories>,
    index_lock: Mutex<()>,
}

impl LocalFileStore {
    pub fn new(dirs: Arc<dyn OutputDirectories>) -> Self {
        Self {
            dirs,
            index_lock: Mutex::new(()),
        }
    }

    pub fn outputs_root(&self) -> PathBuf {
        self.dirs.outputs_root()
    }

    pub fn downloads_root(&self) -> PathBuf {
        self.dirs.downloads_root()
    }

    pub(crate) fn dirs(&self) -> &dyn OutputDirectories {
        self.dirs.as_ref()
    }

    /// The index for the current outputs root.
    pub fn index(&self) -> IndexStore {
        IndexStore::in_dir(&self.dirs.outputs_root())
    }

    pub fn entries(&self) -> Result<Vec<FileEntry>, StoreError> {
        self.index().list()
    }

    /// Drop the index record for `id`; the audio file is not touched.
    pub fn remove_entry(&self, id: &str) -> Result<Option<FileEntry>, StoreError> {
        let _guard = self.lock_index();
        self.index().remove(id)
    }

    fn lock_index(&self) -> MutexGuard<'_, ()> {
        self.index_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContentStore for LocalFileStore {
    fn save(&self, data: &[u8], config: &GenerationConfig) -> Result<FileEntry, StoreError> {
        let hash = config_hash_of(config);
        let format = config.response_format();

        let root = self
            .dirs
            .ensure_outputs_exists()
            .map_err(StoreError::OutputDirectoryMissing)?;

        let bucket = root.join(&hash);
        fs::create_dir_all(&bucket).map_err(StoreError::FileWrite)?;
        let (id, file_path) =
            write_new_file(&bucket, format, data, unique_id).map_err(StoreError::FileWrite)?;
        log::info!("saved {} bytes to {}", data.len(), file_path.display());

        let entry = FileEntry {
            id: id.clone(),
            filename: display_filename(config.input(), format),
            path: format!("{hash}/{id}.{format}"),
            text: config.input().to_string(),
            voice: config.voice().to_string(),
            model: config.model().to_string(),
            speed: config.speed(),
            instructions: config.instructions().map(str::to_owned),
            timestamp: Utc::now(),
        };

        let _guard = self.lock_index();
        IndexStore::in_dir(&root)
            .append(entry.clone())
            .inspect_err(|e| log::error!("audio saved but index update failed: {e}"))?;
        Ok(entry)
    }
}

/// Write `data` to `{bucket}/{id}.{format}` without replacing an existing
/// file.  On an id collision a second id is drawn; a repeat collision is
/// returned as `AlreadyExists`.
fn write_new_file(
    bucket: &Path,
    format: &str,
    data: &[u8],
    mut next_id: impl FnMut() -> String,
) -> io::Result<(String, PathBuf)> {
    let mut attempts = 0;
    loop {
        let id = next_id();
        let path = bucket.join(format!("{id}.{format}"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(data)?;
                file.sync_all()?;
                return Ok((id, path));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts == 0 => {
                log::warn!("id {id} already taken in {}, drawing another", bucket.display());
                attempts += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
