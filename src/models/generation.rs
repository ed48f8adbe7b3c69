//! Per-attempt generation configuration and its validation rules.

use thiserror::Error;

use crate::config::GenerationDefaults;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Reasons a [`GenerationConfig`] is rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Input text cannot be empty")]
    EmptyInput,

    #[error("Input text must be {} characters or less", GenerationConfig::MAX_INPUT_CHARS)]
    InputTooLong,

    #[error("Instructions must be {} characters or less", GenerationConfig::MAX_INSTRUCTIONS_CHARS)]
    InstructionsTooLong,

    #[error("Speed must be between {} and {}", GenerationConfig::MIN_SPEED, GenerationConfig::MAX_SPEED)]
    InvalidSpeed,
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

/// Immutable description of one text-to-speech generation.
///
/// Built with [`GenerationConfig::new`] (or [`from_defaults`]) and the
/// `with_*` methods, then checked with [`validate`].  Lengths are counted in
/// Unicode code points, not bytes.
///
/// [`from_defaults`]: GenerationConfig::from_defaults
/// [`validate`]: GenerationConfig::validate
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    input: String,
    voice: String,
    model: String,
    speed: f64,
    response_format: String,
    instructions: Option<String>,
}

impl GenerationConfig {
    pub const MAX_INPUT_CHARS: usize = 4096;
    pub const MAX_INSTRUCTIONS_CHARS: usize = 1000;
    /// Character count above which the UI should warn the user.
    pub const WARNING_THRESHOLD: usize = 3800;
    pub const MIN_SPEED: f64 = 0.25;
    pub const MAX_SPEED: f64 = 4.0;

    /// New config with the built-in defaults (`ash`, `gpt-4o-mini-tts`, 1.0, `mp3`).
    pub fn new(input: impl Into<String>) -> Self {
        Self::from_defaults(input, &GenerationDefaults::default())
    }

    pub fn from_defaults(input: impl Into<String>, defaults: &GenerationDefaults) -> Self {
        Self {
            input: input.into(),
            voice: defaults.voice.clone(),
            model: defaults.model.clone(),
            speed: defaults.speed,
            response_format: defaults.response_format.clone(),
            instructions: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = format.into();
        self
    }

    /// Empty instructions are stored as absent.
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions.filter(|s| !s.is_empty());
        self
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn response_format(&self) -> &str {
        &self.response_format
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    pub fn is_near_char_limit(&self) -> bool {
        self.char_count() > Self::WARNING_THRESHOLD
    }

    /// Check every field against the API limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.trim().is_empty() {
            return Err(ConfigError::EmptyInput);
        }
        if self.char_count() > Self::MAX_INPUT_CHARS {
            return Err(ConfigError::InputTooLong);
        }
        if let Some(instructions) = &self.instructions {
            if instructions.chars().count() > Self::MAX_INSTRUCTIONS_CHARS {
                return Err(ConfigError::InstructionsTooLong);
            }
        }
        if !(Self::MIN_SPEED..=Self::MAX_SPEED).contains(&self.speed) {
            return Err(ConfigError::InvalidSpeed);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
