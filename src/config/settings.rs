//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a hand-edited file only needs the
//! keys it changes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Connection settings for the speech-synthesis API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint is appended to (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Stored API key.  `None` or empty means "not configured".
    ///
    /// The `OPENAI_API_KEY` environment variable takes precedence.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.  Generation payloads are large, so
    /// this is deliberately generous.
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// RateLimitConfig
// ---------------------------------------------------------------------------

/// Client-side sliding-window limits (mirrors the API's published quotas).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests of any kind per window.
    pub general_limit: usize,
    /// Maximum generation requests per window (also counted as general).
    pub generation_limit: usize,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.window_secs > 0, "rate_limit.window_secs must be greater than zero");
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_limit: 100,
            generation_limit: 20,
            window_secs: 15 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// PinningConfig
// ---------------------------------------------------------------------------

/// Public-key pins per domain.
///
/// Values are SHA-256 digests of the leaf certificate's public key, either
/// base64 or hex encoded.  Several values per domain allow key rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinningConfig {
    /// Disable to fall back to plain certificate-chain validation everywhere.
    pub enabled: bool,
    pub pins: BTreeMap<String, Vec<String>>,
}

impl Default for PinningConfig {
    fn default() -> Self {
        let mut pins = BTreeMap::new();
        pins.insert(
            "api.openai.com".to_string(),
            vec![
                "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=".to_string(),
                "5KjN64rxTiC13wacHTGCLnBdD2k6jwPdd7duayEkNiU=".to_string(),
                "60/iaDN1LE6KKGxaEtLRcUM4Fr31/v6X7LkAyIAjht8=".to_string(),
            ],
        );
        Self {
            enabled: true,
            pins,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Library locations.  `None` selects the platform default from [`AppPaths`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub outputs_dir: Option<PathBuf>,
    pub downloads_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// GenerationDefaults
// ---------------------------------------------------------------------------

/// Values used when the caller does not pick voice, model, speed or format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub voice: String,
    pub model: String,
    pub speed: f64,
    pub response_format: String,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            voice: "ash".into(),
            model: "gpt-4o-mini-tts".into(),
            speed: 1.0,
            response_format: "mp3".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use audiogen::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub pinning: PinningConfig,
    pub storage: StorageConfig,
    pub generation: GenerationDefaults,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.rate_limit.validate()?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.api.base_url, loaded.api.base_url);
        assert_eq!(original.api.api_key, loaded.api.api_key);
        assert_eq!(original.api.timeout_secs, loaded.api.timeout_secs);

        assert_eq!(
            original.rate_limit.general_limit,
            loaded.rate_limit.general_limit
        );
        assert_eq!(
            original.rate_limit.generation_limit,
            loaded.rate_limit.generation_limit
        );
        assert_eq!(original.rate_limit.window_secs, loaded.rate_limit.window_secs);

        assert_eq!(original.pinning.enabled, loaded.pinning.enabled);
        assert_eq!(original.pinning.pins, loaded.pinning.pins);

        assert_eq!(original.generation.voice, loaded.generation.voice);
        assert_eq!(original.generation.model, loaded.generation.model);
        assert_eq!(original.generation.speed, loaded.generation.speed);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.api.base_url, "https://api.openai.com/v1");
        assert_eq!(config.rate_limit.general_limit, 100);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.api.timeout(), Duration::from_secs(60));
        assert!(cfg.api.api_key.is_none());
        assert_eq!(cfg.rate_limit.general_limit, 100);
        assert_eq!(cfg.rate_limit.generation_limit, 20);
        assert_eq!(cfg.rate_limit.window(), Duration::from_secs(900));
        assert!(cfg.pinning.enabled);
        assert_eq!(cfg.pinning.pins["api.openai.com"].len(), 3);
        assert!(cfg.storage.outputs_dir.is_none());
        assert_eq!(cfg.generation.voice, "ash");
        assert_eq!(cfg.generation.model, "gpt-4o-mini-tts");
        assert_eq!(cfg.generation.response_format, "mp3");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[rate_limit]\ngeneration_limit = 5\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.rate_limit.generation_limit, 5);
        assert_eq!(cfg.rate_limit.general_limit, 100);
        assert_eq!(cfg.api.timeout_secs, 60);
    }

    #[test]
    fn zero_rate_limit_window_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("zero-window.toml");
        std::fs::write(&path, "[rate_limit]\nwindow_secs = 0\n").expect("write");

        let err = AppConfig::load_from(&path).expect_err("zero window must not load");
        assert!(err.to_string().contains("window_secs"));
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.api.base_url = "https://tts.example.test/v1".into();
        cfg.api.api_key = Some("sk-test".into());
        cfg.api.timeout_secs = 30;
        cfg.pinning.pins.insert(
            "tts.example.test".into(),
            vec!["496a7b1a8c0e87db10146448ed59022b4ecbf40c877d25b5693efad934c41e13".into()],
        );
        cfg.storage.outputs_dir = Some(PathBuf::from("/srv/audio"));
        cfg.generation.speed = 1.25;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.api.base_url, "https://tts.example.test/v1");
        assert_eq!(loaded.api.api_key, Some("sk-test".into()));
        assert_eq!(loaded.api.timeout_secs, 30);
        assert_eq!(loaded.pinning.pins.len(), 2);
        assert_eq!(loaded.storage.outputs_dir, Some(PathBuf::from("/srv/audio")));
        assert_eq!(loaded.generation.speed, 1.25);
    }
}
