use crate::{
    ClearResult, ErrorEnvelope, ErrorKind, GhostBinding, NamingMode, ProcessingStats,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Requests accepted from the UI or any other caller.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Snapshot eligible text nodes and preview their content groups.
    ScanAndGroup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_ids: Option<Vec<String>>,
    },
    /// Create or reuse variables for every group and bind the nodes.
    ProcessBatch {
        collection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_ids: Option<Vec<String>>,
    },
    /// Ask the running batch to stop at its next chunk boundary.
    Cancel,
    ScanGhosts,
    ClearGhosts {
        node_ids: Vec<String>,
    },
    RevealNode {
        node_id: String,
    },
    GetNamingMode,
    SetNamingMode {
        mode: NamingMode,
    },
    ListCollections,
    CreateCollection {
        name: String,
    },
}

impl Request {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Request::ScanAndGroup { .. } => "scan_and_group",
            Request::ProcessBatch { .. } => "process_batch",
            Request::Cancel => "cancel",
            Request::ScanGhosts => "scan_ghosts",
            Request::ClearGhosts { .. } => "clear_ghosts",
            Request::RevealNode { .. } => "reveal_node",
            Request::GetNamingMode => "get_naming_mode",
            Request::SetNamingMode { .. } => "set_naming_mode",
            Request::ListCollections => "list_collections",
            Request::CreateCollection { .. } => "create_collection",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct GroupPreview {
    pub key: String,
    pub content: String,
    pub variable_name: String,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    pub default_mode_id: String,
    pub variable_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Groups {
        mode: NamingMode,
        groups: Vec<GroupPreview>,
        eligible: usize,
        ineligible: usize,
        /// Sources that passed eligibility but could not be named.
        rejected: usize,
    },
    Completed {
        stats: ProcessingStats,
    },
    CancelRequested {
        was_running: bool,
    },
    Ghosts {
        ghosts: Vec<GhostBinding>,
    },
    GhostsCleared {
        result: ClearResult,
    },
    Revealed {
        node_id: String,
    },
    NamingMode {
        mode: NamingMode,
    },
    Collections {
        collections: Vec<CollectionSummary>,
    },
    CollectionCreated {
        collection: CollectionSummary,
    },
    Error {
        error: ErrorEnvelope,
    },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            error: ErrorEnvelope::new(kind, message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Response::Error { error } => Some(error.kind),
            _ => None,
        }
    }
}
