//! Configuration module for AudioGen.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform directories, the output-directory and
//! credential collaborators, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod credentials;
pub mod paths;
pub mod settings;

pub use credentials::{CredentialProvider, SharedCredentials, API_KEY_ENV};
pub use paths::{AppPaths, LibraryDirs, OutputDirectories};
pub use settings::{
    ApiConfig, AppConfig, GenerationDefaults, PinningConfig, RateLimitConfig, StorageConfig,
};
