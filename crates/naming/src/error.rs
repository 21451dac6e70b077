use thiserror::Error;

/// Result type for naming operations
pub type Result<T> = std::result::Result<T, NamingError>;

/// Errors that can occur while composing variable names
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// Content is empty (or whitespace only) and cannot name a variable
    #[error("Invalid text: {0}")]
    InvalidText(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NamingError {
    /// Create an invalid text error
    pub fn invalid_text(msg: impl Into<String>) -> Self {
        Self::InvalidText(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
