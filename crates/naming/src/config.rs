use crate::error::{NamingError, Result};
use crate::truncate::SEPARATOR;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_NAME_LEN: usize = 50;

/// Configuration shared by the naming strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Hard upper bound on variable name length, in characters
    pub max_name_len: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl NamingConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Start/end truncation needs room for the separator plus one char on each side.
        let floor = SEPARATOR.len() + 2;
        if self.max_name_len < floor {
            return Err(NamingError::invalid_config(format!(
                "max_name_len ({}) must be at least {floor}",
                self.max_name_len
            )));
        }
        Ok(())
    }
}
