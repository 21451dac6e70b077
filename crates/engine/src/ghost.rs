use crate::port::{DocumentPort, HostResult, NodeKind, VariableStore};
use std::collections::HashSet;
use textvar_protocol::{BindingKind, ClearResult, GhostBinding, GhostEvidence};

/// What the variable store says about one referenced id.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Found,
    Missing,
    Failed(String),
}

impl Lookup {
    fn into_evidence(self) -> Option<GhostEvidence> {
        match self {
            Lookup::Found => None,
            Lookup::Missing => Some(GhostEvidence::Missing),
            Lookup::Failed(message) => Some(GhostEvidence::ResolutionError { message }),
        }
    }
}

/// Finds and clears bindings that point at variables which no longer resolve.
pub struct GhostReconciler<'a> {
    document: &'a dyn DocumentPort,
    store: &'a dyn VariableStore,
    retries: u32,
}

impl<'a> GhostReconciler<'a> {
    pub fn new(document: &'a dyn DocumentPort, store: &'a dyn VariableStore, retries: u32) -> Self {
        Self {
            document,
            store,
            retries,
        }
    }

    /// Ids of every variable in every local collection.
    pub async fn valid_variable_ids(&self) -> HostResult<HashSet<String>> {
        let mut ids = HashSet::new();
        for collection in self.store.collections().await? {
            ids.extend(self.store.variable_ids(&collection.id).await?);
        }
        Ok(ids)
    }

    /// Visible text nodes whose text binding is dangling.
    ///
    /// Ids in the valid set are never reported. An id outside it is only a
    /// candidate: library variables live in no local collection, so each
    /// candidate is looked up directly and reported only when the lookup
    /// misses or keeps failing. `clear` applies the same exception.
    pub async fn scan(&self) -> HostResult<Vec<GhostBinding>> {
        let valid = self.valid_variable_ids().await?;
        let mut ghosts = Vec::new();

        for node_id in self.document.text_node_ids().await? {
            let node = match self.document.node(&node_id).await {
                Ok(Some(node)) => node,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Ghost scan skipped node {node_id}: {err}");
                    continue;
                }
            };
            if node.removed || node.kind != NodeKind::Text || !node.is_effectively_visible() {
                continue;
            }
            let Some(variable_id) = node.binding(BindingKind::Characters) else {
                continue;
            };
            if valid.contains(variable_id) {
                continue;
            }
            if let Some(evidence) = self.lookup(variable_id).await.into_evidence() {
                ghosts.push(GhostBinding {
                    node_id: node.id.clone(),
                    node_name: node.name.clone(),
                    kind: BindingKind::Characters,
                    variable_id: variable_id.to_string(),
                    evidence,
                });
            }
        }

        log::info!("Ghost scan found {} dangling bindings", ghosts.len());
        Ok(ghosts)
    }

    /// Remove every dangling binding from each requested node.
    ///
    /// Nodes are handled independently; one failing node never stops the rest.
    pub async fn clear(&self, node_ids: &[String]) -> ClearResult {
        let mut result = ClearResult {
            requested: node_ids.len(),
            ..Default::default()
        };

        for node_id in node_ids {
            match self.clear_node(node_id).await {
                Ok(cleared) => {
                    log::debug!("Cleared {cleared} ghost bindings on {node_id}");
                    result.successfully_cleared += 1;
                }
                Err(reason) => {
                    log::warn!("Could not clear ghosts on {node_id}: {reason}");
                    result.record_failure(node_id, reason);
                }
            }
        }
        result
    }

    async fn clear_node(&self, node_id: &str) -> Result<usize, String> {
        let node = match self.document.node(node_id).await {
            Ok(Some(node)) => node,
            Ok(None) => return Err("node not found".to_string()),
            Err(err) => return Err(err.to_string()),
        };
        if node.removed {
            return Err("node was deleted".to_string());
        }
        if node.kind != NodeKind::Text {
            return Err("not a text node".to_string());
        }

        let mut cleared = 0;
        let mut last_error = None;
        for (kind, variable_id) in &node.bindings {
            if self.lookup(variable_id).await == Lookup::Found {
                continue;
            }
            match self.document.clear_binding(node_id, *kind).await {
                Ok(()) => cleared += 1,
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        match (cleared, last_error) {
            (0, Some(err)) => Err(err),
            (0, None) => Err("no ghost bindings found".to_string()),
            (cleared, _) => Ok(cleared),
        }
    }

    async fn lookup(&self, variable_id: &str) -> Lookup {
        let mut attempt = 0;
        loop {
            match self.store.variable(variable_id).await {
                Ok(Some(_)) => return Lookup::Found,
                Ok(None) => return Lookup::Missing,
                Err(err) if attempt < self.retries => {
                    log::debug!("Retrying lookup of {variable_id} after: {err}");
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(err) => return Lookup::Failed(err.to_string()),
            }
        }
    }
}
