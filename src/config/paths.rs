//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\audiogen\
//!   macOS:   ~/Library/Application Support/audiogen/
//!   Linux:   ~/.config/audiogen/
//!
//! Library dirs (generated audio):
//!   outputs:   ~/Documents/outputs/          (`index.json` + config buckets)
//!   downloads: ~/Documents/AudioGenLibrary/

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use super::StorageConfig;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default root of the content-addressed output library.
    pub outputs_dir: PathBuf,
    /// Default export/download directory.
    pub downloads_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "audiogen";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let documents = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let settings_file = config_dir.join("settings.toml");
        let outputs_dir = documents.join("outputs");
        let downloads_dir = documents.join("AudioGenLibrary");

        Self {
            config_dir,
            settings_file,
            outputs_dir,
            downloads_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// OutputDirectories
// ---------------------------------------------------------------------------

/// Collaborator that tells the store where the library lives.
///
/// Roots are read on every call so a settings change takes effect on the
/// next save without rebuilding the store.
pub trait OutputDirectories: Send + Sync {
    /// Root of the output library (holds `index.json` and the buckets).
    fn outputs_root(&self) -> PathBuf;

    /// Root of the download/export directory.
    fn downloads_root(&self) -> PathBuf;

    /// Create the outputs root if needed and return it.
    fn ensure_outputs_exists(&self) -> std::io::Result<PathBuf> {
        let root = self.outputs_root();
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }

    /// Create the downloads root if needed and return it.
    fn ensure_downloads_exists(&self) -> std::io::Result<PathBuf> {
        let root = self.downloads_root();
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }
}

// ---------------------------------------------------------------------------
// LibraryDirs
// ---------------------------------------------------------------------------

/// Mutable, thread-safe [`OutputDirectories`] implementation.
#[derive(Debug)]
pub struct LibraryDirs {
    outputs: RwLock<PathBuf>,
    downloads: RwLock<PathBuf>,
}

impl LibraryDirs {
    pub fn new(outputs: impl Into<PathBuf>, downloads: impl Into<PathBuf>) -> Self {
        Self {
            outputs: RwLock::new(outputs.into()),
            downloads: RwLock::new(downloads.into()),
        }
    }

    /// Use the configured directories, falling back to the platform defaults.
    pub fn from_config(storage: &StorageConfig, paths: &AppPaths) -> Self {
        Self::new(
            storage
                .outputs_dir
                .clone()
                .unwrap_or_else(|| paths.outputs_dir.clone()),
            storage
                .downloads_dir
                .clone()
                .unwrap_or_else(|| paths.downloads_dir.clone()),
        )
    }

    pub fn set_outputs_root(&self, path: &Path) {
        *self.outputs.write().unwrap_or_else(PoisonError::into_inner) = path.to_path_buf();
    }

    pub fn set_downloads_root(&self, path: &Path) {
        *self.downloads.write().unwrap_or_else(PoisonError::into_inner) = path.to_path_buf();
    }

    /// Restore both roots to the platform defaults.
    pub fn reset_to_default(&self) {
        let paths = AppPaths::new();
        self.set_outputs_root(&paths.outputs_dir);
        self.set_downloads_root(&paths.downloads_dir);
    }
}

impl OutputDirectories for LibraryDirs {
    fn outputs_root(&self) -> PathBuf {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn downloads_root(&self) -> PathBuf {
        self.downloads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
