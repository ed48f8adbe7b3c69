//! `index.json` persistence.
//!
//! Every mutation is a read-modify-write of the whole file.  The new content
//! is written to a sibling temp file and renamed over the old one, so a crash
//! leaves either the old index or the new one.  There is no cross-process
//! lock; callers in one process serialize through [`LocalFileStore`].
//!
//! [`LocalFileStore`]: super::LocalFileStore

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::StoreError;
use crate::models::{FileEntry, IndexFile};

pub const INDEX_FILE_NAME: &str = "index.json";

/// Handle on one `index.json`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    /// Index stored at `{root}/index.json`.
    pub fn in_dir(root: &Path) -> Self {
        Self {
            path: root.join(INDEX_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing file is an empty index.
    pub fn load(&self) -> Result<IndexFile, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(IndexFile::default()),
            Err(e) => return Err(StoreError::IndexUpdate(e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            log::error!("index at {} is corrupt: {e}", self.path.display());
            StoreError::IndexCorrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Entries in append order.
    pub fn list(&self) -> Result<Vec<FileEntry>, StoreError> {
        Ok(self.load()?.files)
    }

    pub fn append(&self, entry: FileEntry) -> Result<(), StoreError> {
        let mut index = self.load()?;
        index.files.push(entry);
        self.write(&index)
    }

    /// Remove the entry with `id`.  The file is only rewritten when
    /// something was removed.
    pub fn remove(&self, id: &str) -> Result<Option<FileEntry>, StoreError> {
        let mut index = self.load()?;
        let Some(pos) = index.files.iter().position(|e| e.id == id) else {
            return Ok(None);
        };
        let removed = index.files.remove(pos);
        self.write(&index)?;
        Ok(Some(removed))
    }

    fn write(&self, index: &IndexFile) -> Result<(), StoreError> {
        let json =
            serde_json::to_vec_pretty(index).map_err(|e| StoreError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::IndexUpdate(e));
        }
        Ok(())
    }
}
