//! In-process host backed by a serializable document snapshot.
//!
//! Used by the CLI (load JSON, mutate, write back) and by tests, which can
//! inject failures per variable name, variable id or node id.

use crate::port::{
    AncestorSnapshot, CollectionInfo, DocumentPort, HostError, HostResult, NodeKind, NodeSnapshot,
    VariableInfo, VariableStore, VariableType,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use textvar_protocol::BindingKind;

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<BindingKind, String>,
}

impl NodeRecord {
    pub fn text(id: impl Into<String>, name: impl Into<String>, characters: impl Into<String>) -> Self {
        Self {
            characters: Some(characters.into()),
            ..Self::container(id, name, NodeKind::Text)
        }
    }

    pub fn container(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            parent: None,
            visible: true,
            locked: false,
            removed: false,
            characters: None,
            bindings: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Text-content binding to `variable_id`, which need not exist.
    pub fn bound(mut self, variable_id: impl Into<String>) -> Self {
        self.bindings
            .insert(BindingKind::Characters, variable_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    pub name: String,
    pub default_mode_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVariable {
    pub id: String,
    pub name: String,
    pub collection_id: String,
    pub resolved_type: VariableType,
    /// Value per mode id
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Whole-document state in its on-disk form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub collections: Vec<CollectionRecord>,
    #[serde(default)]
    pub variables: Vec<StoredVariable>,
}

#[derive(Debug, Default)]
struct Faults {
    create_names: HashSet<String>,
    /// Remaining failing reads per variable id
    variable_reads: HashMap<String, usize>,
    node_reads: HashSet<String>,
    bind_nodes: HashSet<String>,
    /// Remaining failing value writes, any variable
    value_writes: usize,
}

#[derive(Debug, Default)]
struct HostState {
    doc: DocumentSnapshot,
    next_id: u64,
    revealed: Vec<String>,
    faults: Faults,
}

impl HostState {
    fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.doc.nodes.iter().find(|node| node.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut NodeRecord> {
        self.doc.nodes.iter_mut().find(|node| node.id == id)
    }

    fn collection(&self, id: &str) -> Option<&CollectionRecord> {
        self.doc.collections.iter().find(|c| c.id == id)
    }

    fn variable(&self, id: &str) -> Option<&StoredVariable> {
        self.doc.variables.iter().find(|v| v.id == id)
    }

    fn default_value(&self, variable: &StoredVariable) -> Option<String> {
        let collection = self.collection(&variable.collection_id)?;
        variable.values.get(&collection.default_mode_id).cloned()
    }

    fn id_taken(&self, id: &str) -> bool {
        self.doc.variables.iter().any(|v| v.id == id)
            || self
                .doc
                .collections
                .iter()
                .any(|c| c.id == id || c.default_mode_id == id)
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let candidate = format!("{prefix}:{}", self.next_id);
            if !self.id_taken(&candidate) {
                return candidate;
            }
        }
    }

    fn ancestors(&self, node: &NodeRecord) -> Vec<AncestorSnapshot> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::from([node.id.as_str()]);
        let mut next = node.parent.as_deref();
        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.node(parent_id) else {
                break;
            };
            ancestors.push(AncestorSnapshot {
                id: parent.id.clone(),
                name: parent.name.clone(),
                kind: parent.kind,
                visible: parent.visible,
            });
            next = parent.parent.as_deref();
        }
        ancestors
    }

    fn snapshot_of(&self, node: &NodeRecord) -> NodeSnapshot {
        NodeSnapshot {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            visible: node.visible,
            locked: node.locked,
            removed: node.removed,
            characters: node.characters.clone(),
            bindings: node.bindings.clone(),
            ancestors: self.ancestors(node),
        }
    }

    fn variable_info(&self, variable: &StoredVariable) -> VariableInfo {
        VariableInfo {
            id: variable.id.clone(),
            name: variable.name.clone(),
            collection_id: variable.collection_id.clone(),
            resolved_type: variable.resolved_type,
            value: self.default_value(variable),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(doc: DocumentSnapshot) -> Self {
        Self {
            state: Mutex::new(HostState {
                doc,
                ..Default::default()
            }),
        }
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw).map(Self::from_snapshot)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.state().doc.clone()
    }

    pub fn variable_count(&self) -> usize {
        self.state().doc.variables.len()
    }

    /// Node ids passed to `reveal_node`, oldest first.
    pub fn revealed(&self) -> Vec<String> {
        self.state().revealed.clone()
    }

    pub fn set_locked(&self, node_id: &str, locked: bool) {
        if let Some(node) = self.state().node_mut(node_id) {
            node.locked = locked;
        }
    }

    pub fn set_characters(&self, node_id: &str, characters: &str) {
        if let Some(node) = self.state().node_mut(node_id) {
            node.characters = Some(characters.to_string());
        }
    }

    /// Mark the node deleted while keeping its id resolvable.
    pub fn remove_node(&self, node_id: &str) {
        if let Some(node) = self.state().node_mut(node_id) {
            node.removed = true;
        }
    }

    /// Drop a variable, leaving any bindings to it dangling.
    pub fn delete_variable(&self, variable_id: &str) {
        self.state().doc.variables.retain(|v| v.id != variable_id);
    }

    pub fn fail_creation_of(&self, name: &str) {
        self.state().faults.create_names.insert(name.to_string());
    }

    /// The next `times` lookups of `variable_id` fail.
    pub fn fail_variable_reads_of(&self, variable_id: &str, times: usize) {
        self.state()
            .faults
            .variable_reads
            .insert(variable_id.to_string(), times);
    }

    /// The next `times` value writes fail after the variable exists.
    pub fn fail_value_writes(&self, times: usize) {
        self.state().faults.value_writes = times;
    }

    pub fn fail_node_reads_of(&self, node_id: &str) {
        self.state().faults.node_reads.insert(node_id.to_string());
    }

    pub fn fail_binding_of(&self, node_id: &str) {
        self.state().faults.bind_nodes.insert(node_id.to_string());
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentPort for MemoryHost {
    async fn text_node_ids(&self) -> HostResult<Vec<String>> {
        Ok(self
            .state()
            .doc
            .nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Text && !node.removed)
            .map(|node| node.id.clone())
            .collect())
    }

    async fn node(&self, id: &str) -> HostResult<Option<NodeSnapshot>> {
        let state = self.state();
        if state.faults.node_reads.contains(id) {
            return Err(HostError::new("get_node", format!("cannot read node {id}")));
        }
        Ok(state.node(id).map(|node| state.snapshot_of(node)))
    }

    async fn set_binding(
        &self,
        node_id: &str,
        kind: BindingKind,
        variable_id: &str,
    ) -> HostResult<()> {
        let mut state = self.state();
        if state.faults.bind_nodes.contains(node_id) {
            return Err(HostError::new("set_binding", format!("binding rejected for {node_id}")));
        }
        let value = match state.variable(variable_id) {
            Some(variable) => state.default_value(variable),
            None => {
                return Err(HostError::new(
                    "set_binding",
                    format!("variable not found: {variable_id}"),
                ))
            }
        };
        let node = match state.node_mut(node_id) {
            Some(node) if !node.removed => node,
            _ => {
                return Err(HostError::new(
                    "set_binding",
                    format!("node not found: {node_id}"),
                ))
            }
        };
        if node.locked {
            return Err(HostError::new("set_binding", format!("node {node_id} is locked")));
        }
        node.bindings.insert(kind, variable_id.to_string());
        if kind == BindingKind::Characters {
            if let Some(value) = value {
                node.characters = Some(value);
            }
        }
        Ok(())
    }

    async fn clear_binding(&self, node_id: &str, kind: BindingKind) -> HostResult<()> {
        let mut state = self.state();
        let node = state.node_mut(node_id).ok_or_else(|| {
            HostError::new("clear_binding", format!("node not found: {node_id}"))
        })?;
        node.bindings.remove(&kind);
        Ok(())
    }

    async fn reveal_node(&self, node_id: &str) -> HostResult<()> {
        let mut state = self.state();
        if !state.node(node_id).is_some_and(|node| !node.removed) {
            return Err(HostError::new(
                "reveal_node",
                format!("node not found: {node_id}"),
            ));
        }
        state.revealed.push(node_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl VariableStore for MemoryHost {
    async fn collections(&self) -> HostResult<Vec<CollectionInfo>> {
        Ok(self
            .state()
            .doc
            .collections
            .iter()
            .map(|c| CollectionInfo {
                id: c.id.clone(),
                name: c.name.clone(),
                default_mode_id: c.default_mode_id.clone(),
            })
            .collect())
    }

    async fn collection(&self, id: &str) -> HostResult<Option<CollectionInfo>> {
        Ok(self.state().collection(id).map(|c| CollectionInfo {
            id: c.id.clone(),
            name: c.name.clone(),
            default_mode_id: c.default_mode_id.clone(),
        }))
    }

    async fn variable_ids(&self, collection_id: &str) -> HostResult<Vec<String>> {
        Ok(self
            .state()
            .doc
            .variables
            .iter()
            .filter(|v| v.collection_id == collection_id)
            .map(|v| v.id.clone())
            .collect())
    }

    async fn variable(&self, id: &str) -> HostResult<Option<VariableInfo>> {
        let mut state = self.state();
        if let Some(remaining) = state.faults.variable_reads.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HostError::new(
                    "get_variable",
                    format!("lookup of {id} failed"),
                ));
            }
        }
        Ok(state.variable(id).map(|v| state.variable_info(v)))
    }

    async fn create_variable(
        &self,
        name: &str,
        collection_id: &str,
        resolved_type: VariableType,
    ) -> HostResult<VariableInfo> {
        let mut state = self.state();
        if state.faults.create_names.contains(name) {
            return Err(HostError::new(
                "create_variable",
                format!("host refused to create {name}"),
            ));
        }
        if state.collection(collection_id).is_none() {
            return Err(HostError::new(
                "create_variable",
                format!("collection not found: {collection_id}"),
            ));
        }
        let duplicate = state
            .doc
            .variables
            .iter()
            .any(|v| v.collection_id == collection_id && v.name == name);
        if duplicate {
            return Err(HostError::new(
                "create_variable",
                format!("duplicate variable name: {name}"),
            ));
        }

        let variable = StoredVariable {
            id: state.fresh_id("VariableID"),
            name: name.to_string(),
            collection_id: collection_id.to_string(),
            resolved_type,
            values: BTreeMap::new(),
        };
        let info = state.variable_info(&variable);
        state.doc.variables.push(variable);
        Ok(info)
    }

    async fn set_value(&self, variable_id: &str, mode_id: &str, value: &str) -> HostResult<()> {
        let mut state = self.state();
        if state.faults.value_writes > 0 {
            state.faults.value_writes -= 1;
            return Err(HostError::new(
                "set_value",
                format!("value write rejected for {variable_id}"),
            ));
        }
        let variable = state
            .doc
            .variables
            .iter_mut()
            .find(|v| v.id == variable_id)
            .ok_or_else(|| {
                HostError::new("set_value", format!("variable not found: {variable_id}"))
            })?;
        variable
            .values
            .insert(mode_id.to_string(), value.to_string());
        Ok(())
    }

    async fn create_collection(&self, name: &str) -> HostResult<CollectionInfo> {
        let mut state = self.state();
        let record = CollectionRecord {
            id: state.fresh_id("VariableCollectionId"),
            name: name.to_string(),
            default_mode_id: state.fresh_id("ModeId"),
        };
        state.doc.collections.push(record.clone());
        Ok(CollectionInfo {
            id: record.id,
            name: record.name,
            default_mode_id: record.default_mode_id,
        })
    }
}
