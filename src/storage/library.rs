//! Read-side view of the output library: listing, search, delete, export.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{LocalFileStore, StoreError};
use crate::models::FileEntry;

/// One index entry enriched with on-disk facts.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub entry: FileEntry,
    /// Absolute path of the audio file.
    pub local_path: PathBuf,
    /// Size in bytes, `None` when the file is gone.
    pub file_size: Option<u64>,
}

impl LibraryItem {
    fn from_entry(entry: FileEntry, root: &Path) -> Self {
        let local_path = entry.full_path(root);
        let file_size = fs::metadata(&local_path).ok().map(|m| m.len());
        Self {
            entry,
            local_path,
            file_size,
        }
    }

    pub fn is_available(&self) -> bool {
        self.file_size.is_some()
    }

    /// First `max_chars` characters of the text, with `…` when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.entry.text.trim();
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

/// Case-insensitive match on filename, voice, text and instructions.
pub fn matches_query(entry: &FileEntry, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let hit = |field: &str| field.to_lowercase().contains(&query);
    hit(&entry.filename)
        || hit(&entry.voice)
        || hit(&entry.text)
        || entry.instructions.as_deref().is_some_and(hit)
}

/// Library operations over a [`LocalFileStore`].
#[derive(Clone)]
pub struct Library {
    store: Arc<LocalFileStore>,
}

impl Library {
    pub fn new(store: Arc<LocalFileStore>) -> Self {
        Self { store }
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<LibraryItem>, StoreError> {
        let root = self.store.outputs_root();
        let mut items: Vec<LibraryItem> = self
            .store
            .entries()?
            .into_iter()
            .map(|entry| LibraryItem::from_entry(entry, &root))
            .collect();
        items.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));
        Ok(items)
    }

    pub fn search(&self, query: &str) -> Result<Vec<LibraryItem>, StoreError> {
        let mut items = self.list()?;
        items.retain(|item| matches_query(&item.entry, query));
        Ok(items)
    }

    pub fn get(&self, id: &str) -> Result<Option<LibraryItem>, StoreError> {
        Ok(self.list()?.into_iter().find(|item| item.entry.id == id))
    }

    /// Remove the audio file, then its index entry.  A file that is
    /// already gone does not block removal from the index.
    pub fn delete(&self, id: &str) -> Result<FileEntry, StoreError> {
        let item = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        match fs::remove_file(&item.local_path) {
            Ok(()) => log::info!("deleted {}", item.local_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("{} was already missing", item.local_path.display());
            }
            Err(e) => return Err(StoreError::FileRemove(e)),
        }

        self.store
            .remove_entry(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Copy an entry's audio into the downloads directory under its display
    /// name.  An existing file of that name is never overwritten; the id is
    /// appended to the stem instead.
    pub fn export(&self, id: &str) -> Result<PathBuf, StoreError> {
        let item = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let downloads = self
            .store
            .dirs()
            .ensure_downloads_exists()
            .map_err(StoreError::OutputDirectoryMissing)?;

        let mut target = downloads.join(&item.entry.filename);
        if target.exists() {
            let extension = format!(".{}", item.entry.format());
            let stem = item
                .entry
                .filename
                .strip_suffix(extension.as_str())
                .unwrap_or(&item.entry.filename);
            target = downloads.join(format!("{stem}-{}.{}", item.entry.id, item.entry.format()));
        }

        fs::copy(&item.local_path, &target).map_err(StoreError::FileWrite)?;
        log::info!("exported {} to {}", id, target.display());
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
