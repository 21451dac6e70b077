use crate::port::NodeSnapshot;
use serde::{Deserialize, Serialize};
use textvar_naming::{NamingSubject, StructuralAncestor};
use textvar_protocol::GroupPreview;

/// Scan-time snapshot of one text node that may become a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSource {
    pub node_id: String,
    pub label: String,
    pub content: String,
    /// Nearest ancestor first
    pub ancestors: Vec<StructuralAncestor>,
}

impl TextSource {
    pub fn new(
        node_id: impl Into<String>,
        label: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            label: label.into(),
            content: content.into(),
            ancestors: Vec::new(),
        }
    }

    pub fn with_ancestors(mut self, ancestors: Vec<StructuralAncestor>) -> Self {
        self.ancestors = ancestors;
        self
    }

    pub fn from_snapshot(node: &NodeSnapshot) -> Option<Self> {
        let content = node.characters.as_ref()?;
        Some(Self {
            node_id: node.id.clone(),
            label: node.name.clone(),
            content: content.clone(),
            ancestors: node.structural_ancestors(),
        })
    }

    pub fn naming_subject(&self) -> NamingSubject<'_> {
        NamingSubject {
            content: &self.content,
            label: &self.label,
            ancestors: &self.ancestors,
        }
    }
}

/// Sources sharing one content identity, destined for one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentGroup {
    pub key: String,
    /// Trimmed content of the first source seen
    pub content: String,
    pub variable_name: String,
    pub sources: Vec<TextSource>,
}

impl ContentGroup {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn is_duplicate(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn preview(&self) -> GroupPreview {
        GroupPreview {
            key: self.key.clone(),
            content: self.content.clone(),
            variable_name: self.variable_name.clone(),
            node_ids: self
                .sources
                .iter()
                .map(|source| source.node_id.clone())
                .collect(),
        }
    }
}
