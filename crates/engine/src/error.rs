use crate::port::HostError;
use serde_json::json;
use textvar_naming::NamingError;
use textvar_protocol::{ErrorEnvelope, ErrorKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("Collection not found: {collection_id}")]
    CollectionNotFound { collection_id: String },

    #[error("Failed to create variable '{name}' for {content:?}: {reason}")]
    VariableCreationFailed {
        name: String,
        content: String,
        reason: String,
    },

    #[error("Failed to bind node {node_id} to {variable_id}: {reason}")]
    BindingFailed {
        node_id: String,
        variable_id: String,
        reason: String,
    },

    #[error("A batch is already being processed")]
    ProcessingInProgress,

    #[error("No eligible text sources to process")]
    NoSources,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

impl EngineError {
    pub fn binding_failed(
        node_id: impl Into<String>,
        variable_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::BindingFailed {
            node_id: node_id.into(),
            variable_id: variable_id.into(),
            reason: reason.into(),
        }
    }

    pub fn creation_failed(
        name: impl Into<String>,
        content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::VariableCreationFailed {
            name: name.into(),
            content: content.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Naming(NamingError::InvalidText(_)) => ErrorKind::InvalidText,
            EngineError::Naming(NamingError::InvalidConfig(_)) => ErrorKind::InvalidRequest,
            EngineError::CollectionNotFound { .. } => ErrorKind::CollectionNotFound,
            EngineError::VariableCreationFailed { .. } => ErrorKind::VariableCreationFailed,
            EngineError::BindingFailed { .. } => ErrorKind::BindingFailed,
            EngineError::ProcessingInProgress => ErrorKind::ProcessingInProgress,
            EngineError::NoSources => ErrorKind::NoSources,
            EngineError::InvalidConfig(_) => ErrorKind::InvalidRequest,
            EngineError::Host(_) => ErrorKind::Host,
        }
    }

    /// Caller-facing form, with the diagnostic context attached as details.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let envelope = ErrorEnvelope::new(self.kind(), self.to_string());
        match self {
            EngineError::CollectionNotFound { collection_id } => envelope
                .with_details(json!({ "collection_id": collection_id }))
                .with_hint("List collections and pick an existing id, or create one."),
            EngineError::VariableCreationFailed {
                name,
                content,
                reason,
            } => envelope.with_details(json!({
                "name": name,
                "content": content,
                "reason": reason,
            })),
            EngineError::BindingFailed {
                node_id,
                variable_id,
                reason,
            } => envelope.with_details(json!({
                "node_id": node_id,
                "variable_id": variable_id,
                "reason": reason,
            })),
            EngineError::ProcessingInProgress => {
                envelope.with_hint("Wait for the running batch to finish or cancel it.")
            }
            EngineError::NoSources => {
                envelope.with_hint("Select visible, unlocked text layers that are not yet bound.")
            }
            EngineError::Host(err) => envelope.with_details(json!({
                "operation": err.operation,
                "reason": err.message,
            })),
            EngineError::Naming(_) | EngineError::InvalidConfig(_) => envelope,
        }
    }
}
