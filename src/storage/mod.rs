//! Local persistence of generated audio.
//!
//! * [`naming`]       : config hash, unique ids, sanitized display names.
//! * [`index`]        : `index.json` read-modify-write with atomic replace.
//! * [`content_store`]: [`ContentStore`] trait and [`LocalFileStore`].
//! * [`library`]      : listing, search, delete and export over the store.

pub mod content_store;
pub mod index;
pub mod library;
pub mod naming;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use content_store::{ContentStore, LocalFileStore};
pub use index::{IndexStore, INDEX_FILE_NAME};
pub use library::{matches_query, Library, LibraryItem};
pub use naming::{config_hash, config_hash_of, display_filename, sanitize_filename, unique_id};

/// Errors from the content store and the library.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Output directory is missing or inaccessible: {0}")]
    OutputDirectoryMissing(#[source] io::Error),

    /// The audio file could not be written; the index was not touched.
    #[error("Failed to write audio file: {0}")]
    FileWrite(#[source] io::Error),

    #[error("Failed to remove audio file: {0}")]
    FileRemove(#[source] io::Error),

    /// Reading or replacing `index.json` failed.
    #[error("Failed to update index file: {0}")]
    IndexUpdate(#[source] io::Error),

    /// `index.json` exists but does not parse.  It is left as is.
    #[error("Index file {} is corrupt: {reason}", .path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("Failed to encode file entry: {0}")]
    Encoding(String),

    #[error("No library entry with id {0}")]
    NotFound(String),
}
