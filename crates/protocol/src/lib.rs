use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod messages;

pub use messages::{CollectionSummary, GroupPreview, Request, Response};

pub const PROTOCOL_SCHEMA_VERSION: u32 = 1;

/// Strategy used to derive variable names from text sources.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    /// Name from the text content itself, capitalization preserved.
    #[default]
    Simple,
    /// Name from the layer label plus meaningful ancestors.
    Hierarchical,
}

impl NamingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            NamingMode::Simple => "simple",
            NamingMode::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(NamingMode::Simple),
            "hierarchical" => Ok(NamingMode::Hierarchical),
            other => Err(format!(
                "unknown naming mode '{other}' (expected simple|hierarchical)"
            )),
        }
    }
}

/// Node property that can be bound to a variable.
#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Characters,
    FontFamily,
    FontStyle,
    FontWeight,
    FontSize,
    LineHeight,
    LetterSpacing,
    ParagraphSpacing,
    ParagraphIndent,
    Visible,
}

impl BindingKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            BindingKind::Characters => "characters",
            BindingKind::FontFamily => "font_family",
            BindingKind::FontStyle => "font_style",
            BindingKind::FontWeight => "font_weight",
            BindingKind::FontSize => "font_size",
            BindingKind::LineHeight => "line_height",
            BindingKind::LetterSpacing => "letter_spacing",
            BindingKind::ParagraphSpacing => "paragraph_spacing",
            BindingKind::ParagraphIndent => "paragraph_indent",
            BindingKind::Visible => "visible",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error classification surfaced to callers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidText,
    CollectionNotFound,
    VariableCreationFailed,
    BindingFailed,
    ProcessingInProgress,
    NoSources,
    InvalidRequest,
    Host,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidText => "invalid_text",
            ErrorKind::CollectionNotFound => "collection_not_found",
            ErrorKind::VariableCreationFailed => "variable_creation_failed",
            ErrorKind::BindingFailed => "binding_failed",
            ErrorKind::ProcessingInProgress => "processing_in_progress",
            ErrorKind::NoSources => "no_sources",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Host => "host",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Emitted after every processed chunk of groups.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub processed: usize,
    pub remaining: usize,
    pub total: usize,
}

impl ProgressUpdate {
    pub fn new(processed: usize, total: usize) -> Self {
        let processed = processed.min(total);
        Self {
            percent: percent_complete(processed, total),
            processed,
            remaining: total - processed,
            total,
        }
    }
}

pub fn percent_complete(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = processed.min(total).saturating_mul(100) / total;
    u8::try_from(pct).unwrap_or(100)
}

/// A single source or group that did not make it through processing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
}

/// Outcome counters of one processing run.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct ProcessingStats {
    /// Variables created by this run (first bind of each new variable)
    pub created: usize,
    /// Binds to a variable that already existed or was bound earlier in the group
    pub connected: usize,
    /// Sources that became invalid before they could be bound
    pub skipped: usize,
    /// Sources belonging to a group that failed as a whole
    pub errored: usize,

    pub group_count: usize,
    pub duplicate_group_count: usize,
    pub processed_groups: usize,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub cancelled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounted_sources(&self) -> usize {
        self.created + self.connected + self.skipped + self.errored
    }

    pub fn add_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }
}

/// Why a binding was classified as dangling.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GhostEvidence {
    /// The variable store no longer knows the id.
    Missing,
    /// Resolving the id raised a host error (after retries).
    ResolutionError { message: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct GhostBinding {
    pub node_id: String,
    pub node_name: String,
    pub kind: BindingKind,
    pub variable_id: String,
    pub evidence: GhostEvidence,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct NodeFailure {
    pub node_id: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ClearResult {
    pub requested: usize,
    pub successfully_cleared: usize,
    pub failed: usize,
    #[serde(default)]
    pub failures: Vec<NodeFailure>,
}

impl ClearResult {
    pub fn record_failure(&mut self, node_id: impl Into<String>, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(NodeFailure {
            node_id: node_id.into(),
            reason: reason.into(),
        });
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// JSON schema of [`Request`], stamped with [`PROTOCOL_SCHEMA_VERSION`].
pub fn request_schema_json() -> Result<String> {
    let schema = schemars::schema_for!(Request);
    let mut value = serde_json::to_value(&schema)?;
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "x-protocol-version".to_string(),
            serde_json::Value::from(PROTOCOL_SCHEMA_VERSION),
        );
    }
    serde_json::to_string_pretty(&value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn naming_mode_parses_case_insensitively() {
        assert_eq!("Simple".parse::<NamingMode>(), Ok(NamingMode::Simple));
        assert_eq!(
            " hierarchical ".parse::<NamingMode>(),
            Ok(NamingMode::Hierarchical)
        );
        assert!("flat".parse::<NamingMode>().is_err());
        assert_eq!(NamingMode::default(), NamingMode::Simple);
    }

    #[test]
    fn progress_reports_remaining_and_percent() {
        let update = ProgressUpdate::new(10, 25);
        assert_eq!(update.percent, 40);
        assert_eq!(update.remaining, 15);

        let done = ProgressUpdate::new(30, 25);
        assert_eq!(done.percent, 100);
        assert_eq!(done.remaining, 0);

        assert_eq!(percent_complete(0, 0), 100);
    }

    #[test]
    fn ghost_evidence_is_tagged() {
        let ghost = GhostBinding {
            node_id: "1:2".to_string(),
            node_name: "Title".to_string(),
            kind: BindingKind::Characters,
            variable_id: "VariableID:9".to_string(),
            evidence: GhostEvidence::ResolutionError {
                message: "boom".to_string(),
            },
        };
        let value = serde_json::to_value(&ghost).unwrap();
        assert_eq!(value["kind"], "characters");
        assert_eq!(value["evidence"]["type"], "resolution_error");
        assert_eq!(value["evidence"]["message"], "boom");
    }

    #[test]
    fn clear_result_counts_failures() {
        let mut result = ClearResult {
            requested: 2,
            ..Default::default()
        };
        result.record_failure("1:1", "no ghost bindings found");
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].reason, "no ghost bindings found");
    }

    #[test]
    fn request_schema_lists_every_request_type() {
        let schema = request_schema_json().unwrap();
        for name in ["scan_and_group", "process_batch", "clear_ghosts", "create_collection"] {
            assert!(schema.contains(name), "missing {name}");
        }
        let value: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(value["x-protocol-version"], PROTOCOL_SCHEMA_VERSION);
    }
}
