//! Capability interfaces onto the host document and its variable store.
//!
//! The engine never holds host objects across calls: everything is addressed
//! by stable id and re-read right before it is mutated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use textvar_naming::StructuralAncestor;
use textvar_protocol::BindingKind;
use thiserror::Error;

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Failure reported by a host collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}: {message}")]
pub struct HostError {
    pub operation: String,
    pub message: String,
}

impl HostError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Page,
    Section,
    Frame,
    Group,
    Component,
    ComponentSet,
    Instance,
    Text,
    Other,
}

impl NodeKind {
    /// Containers that delimit a reusable component.
    pub const fn is_component_boundary(self) -> bool {
        matches!(
            self,
            NodeKind::Component | NodeKind::ComponentSet | NodeKind::Instance
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorSnapshot {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub visible: bool,
}

/// Point-in-time view of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub visible: bool,
    pub locked: bool,
    /// Host still knows the id but the node was deleted from the tree
    pub removed: bool,
    pub characters: Option<String>,
    pub bindings: BTreeMap<BindingKind, String>,
    /// Nearest ancestor first
    pub ancestors: Vec<AncestorSnapshot>,
}

impl NodeSnapshot {
    pub fn binding(&self, kind: BindingKind) -> Option<&str> {
        self.bindings.get(&kind).map(String::as_str)
    }

    pub fn has_hidden_ancestor(&self) -> bool {
        self.ancestors.iter().any(|ancestor| !ancestor.visible)
    }

    /// Visible itself and through every ancestor.
    pub fn is_effectively_visible(&self) -> bool {
        self.visible && !self.has_hidden_ancestor()
    }

    pub fn structural_ancestors(&self) -> Vec<StructuralAncestor> {
        self.ancestors
            .iter()
            .filter(|ancestor| !matches!(ancestor.kind, NodeKind::Document | NodeKind::Page))
            .map(|ancestor| {
                StructuralAncestor::new(
                    ancestor.name.clone(),
                    ancestor.kind.is_component_boundary(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
    pub default_mode_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Float,
    Boolean,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub id: String,
    pub name: String,
    pub collection_id: String,
    pub resolved_type: VariableType,
    /// String value for the collection's default mode, when there is one
    pub value: Option<String>,
}

/// Read/mutate access to the node tree.
#[async_trait]
pub trait DocumentPort: Send + Sync {
    /// Ids of every text-bearing node, in document order.
    async fn text_node_ids(&self) -> HostResult<Vec<String>>;

    async fn node(&self, id: &str) -> HostResult<Option<NodeSnapshot>>;

    async fn set_binding(
        &self,
        node_id: &str,
        kind: BindingKind,
        variable_id: &str,
    ) -> HostResult<()>;

    async fn clear_binding(&self, node_id: &str, kind: BindingKind) -> HostResult<()>;

    /// Select the node and scroll it into view.
    async fn reveal_node(&self, node_id: &str) -> HostResult<()>;
}

/// Access to variable collections.
#[async_trait]
pub trait VariableStore: Send + Sync {
    async fn collections(&self) -> HostResult<Vec<CollectionInfo>>;

    async fn collection(&self, id: &str) -> HostResult<Option<CollectionInfo>>;

    async fn variable_ids(&self, collection_id: &str) -> HostResult<Vec<String>>;

    async fn variable(&self, id: &str) -> HostResult<Option<VariableInfo>>;

    async fn create_variable(
        &self,
        name: &str,
        collection_id: &str,
        resolved_type: VariableType,
    ) -> HostResult<VariableInfo>;

    async fn set_value(&self, variable_id: &str, mode_id: &str, value: &str) -> HostResult<()>;

    async fn create_collection(&self, name: &str) -> HostResult<CollectionInfo>;
}
