use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use textvar_naming::NamingConfig;

const MAX_CHUNK_SIZE: usize = 500;
const MAX_CHUNK_PAUSE_MS: u64 = 1_000;
const MAX_GHOST_RETRIES: u32 = 5;

pub const CHUNK_SIZE_ENV: &str = "TEXTVAR_CHUNK_SIZE";
pub const CHUNK_PAUSE_ENV: &str = "TEXTVAR_CHUNK_PAUSE_MS";
pub const GHOST_RETRIES_ENV: &str = "TEXTVAR_GHOST_RETRIES";

/// Runtime knobs for a processing engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Groups processed between progress reports and pauses
    pub chunk_size: usize,

    /// Trimmed text longer than this (in chars) is never converted
    pub max_text_len: usize,

    /// Cooperative pause after each chunk (0 = yield only)
    pub chunk_pause_ms: u64,

    /// Extra lookups before a failing variable lookup counts as a ghost
    pub ghost_error_retries: u32,

    pub naming: NamingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            max_text_len: 5_000,
            chunk_pause_ms: 10,
            ghost_error_retries: 1,
            naming: NamingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Config for headless runs and tests: no pauses.
    pub fn headless() -> Self {
        Self {
            chunk_pause_ms: 0,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EngineError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(EngineError::InvalidConfig(format!(
                "chunk_size ({}) cannot exceed {MAX_CHUNK_SIZE}",
                self.chunk_size
            )));
        }
        if self.max_text_len == 0 {
            return Err(EngineError::InvalidConfig(
                "max_text_len must be > 0".to_string(),
            ));
        }
        self.naming.validate()?;
        Ok(())
    }

    /// Apply `TEXTVAR_*` environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.chunk_size = parse_clamped(
            lookup(CHUNK_SIZE_ENV).as_deref(),
            self.chunk_size,
            1,
            MAX_CHUNK_SIZE,
        );
        self.chunk_pause_ms = parse_clamped(
            lookup(CHUNK_PAUSE_ENV).as_deref(),
            self.chunk_pause_ms,
            0,
            MAX_CHUNK_PAUSE_MS,
        );
        self.ghost_error_retries = parse_clamped(
            lookup(GHOST_RETRIES_ENV).as_deref(),
            self.ghost_error_retries,
            0,
            MAX_GHOST_RETRIES,
        );
        self
    }
}

fn parse_clamped<T>(raw: Option<&str>, default_value: T, min: T, max: T) -> T
where
    T: std::str::FromStr + Ord + Copy,
{
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default_value)
        .clamp(min, max)
}
