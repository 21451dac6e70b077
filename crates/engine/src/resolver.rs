use crate::cache::{composite_key, VariableCache, VariableRecord};
use crate::error::{EngineError, Result};
use crate::port::{CollectionInfo, VariableStore, VariableType};
use std::collections::{HashMap, HashSet};
use textvar_naming::{truncate_name, DEFAULT_MAX_NAME_LEN};

/// Outcome of resolving one (name, content) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: VariableRecord,
    /// The variable was created by this resolver
    pub created: bool,
}

/// Existing variables of the target collection.
///
/// Only string variables with a value can be reused. Every other variable
/// still occupies its name.
#[derive(Debug, Default)]
struct CollectionIndex {
    by_key: HashMap<String, VariableRecord>,
    by_name: HashMap<String, Vec<VariableRecord>>,
    /// String variables that exist without a value (an interrupted create)
    unset: HashMap<String, VariableRecord>,
    /// Names held by non-string variables
    foreign: HashMap<String, usize>,
}

impl CollectionIndex {
    fn insert(&mut self, record: VariableRecord) {
        if record.value.is_empty() {
            self.unset.entry(record.name.clone()).or_insert(record);
            return;
        }
        self.by_key
            .insert(composite_key(&record.name, &record.value), record.clone());
        self.by_name
            .entry(record.name.clone())
            .or_default()
            .push(record);
    }

    fn insert_foreign(&mut self, name: String) {
        *self.foreign.entry(name).or_insert(0) += 1;
    }

    /// Move a previously unset record to its final value.
    fn settle(&mut self, record: VariableRecord) {
        self.unset.remove(&record.name);
        self.insert(record);
    }

    fn name_taken(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
            || self.unset.contains_key(name)
            || self.foreign.contains_key(name)
    }

    fn conflicts(&self, name: &str, content: &str) -> usize {
        let strings = self
            .by_name
            .get(name)
            .map(|records| records.iter().filter(|r| r.value != content).count())
            .unwrap_or(0);
        strings + self.foreign.get(name).copied().unwrap_or(0)
    }

    fn with_content(&self, name: &str, content: &str) -> Option<&VariableRecord> {
        self.by_key.get(&composite_key(name, content))
    }

    fn unset(&self, name: &str) -> Option<&VariableRecord> {
        self.unset.get(name)
    }

    fn string_count(&self) -> usize {
        self.by_key.len() + self.unset.len()
    }
}

/// Where a (name, content) pair lands.
#[derive(Debug)]
enum Target {
    Existing(VariableRecord),
    /// Reuse a valueless record; its value still has to be written
    Unset(VariableRecord),
    Free(String),
}

/// Finds or creates the variable for a content group within one collection.
///
/// Resolution order: session cache, existing collection variables, creation.
/// Repeating a call with the same arguments yields the same record.
pub struct VariableResolver<'a> {
    store: &'a dyn VariableStore,
    collection: CollectionInfo,
    max_name_len: usize,
    cache: VariableCache,
    index: Option<CollectionIndex>,
    created_ids: HashSet<String>,
}

impl<'a> VariableResolver<'a> {
    pub async fn for_collection(
        store: &'a dyn VariableStore,
        collection_id: &str,
    ) -> Result<VariableResolver<'a>> {
        let collection = store.collection(collection_id).await?.ok_or_else(|| {
            EngineError::CollectionNotFound {
                collection_id: collection_id.to_string(),
            }
        })?;
        Ok(Self::new(store, collection))
    }

    pub fn new(store: &'a dyn VariableStore, collection: CollectionInfo) -> Self {
        Self {
            store,
            collection,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            cache: VariableCache::new(),
            index: None,
            created_ids: HashSet::new(),
        }
    }

    /// Length bound applied to suffixed names.
    pub fn with_name_budget(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }

    pub fn collection(&self) -> &CollectionInfo {
        &self.collection
    }

    pub fn cache(&self) -> &VariableCache {
        &self.cache
    }

    pub async fn resolve(&mut self, name: &str, content: &str) -> Result<Resolution> {
        if let Some(record) = self.cache.get(name, content) {
            return Ok(Resolution {
                record,
                created: false,
            });
        }

        self.ensure_index().await?;
        let record = match self.disambiguate(name, content) {
            Target::Existing(record) => {
                log::debug!("Reusing variable {} ({}) for {content:?}", record.name, record.id);
                self.remember(name, content, record.clone());
                return Ok(Resolution {
                    record,
                    created: false,
                });
            }
            Target::Unset(record) => {
                log::debug!("Completing variable {} ({}) for {content:?}", record.name, record.id);
                self.fill(record, content).await?
            }
            Target::Free(target) => {
                let record = self.create(&target, content).await?;
                log::debug!("Created variable {} ({}) for {content:?}", record.name, record.id);
                record
            }
        };

        if let Some(index) = self.index.as_mut() {
            index.settle(record.clone());
        }
        self.remember(name, content, record.clone());
        Ok(Resolution {
            created: self.created_ids.contains(&record.id),
            record,
        })
    }

    fn disambiguate(&self, name: &str, content: &str) -> Target {
        let Some(index) = self.index.as_ref() else {
            return Target::Free(name.to_string());
        };
        if let Some(record) = index.with_content(name, content) {
            return Target::Existing(record.clone());
        }
        if let Some(record) = index.unset(name) {
            return Target::Unset(record.clone());
        }
        let conflicts = index.conflicts(name, content);
        if conflicts == 0 {
            return Target::Free(name.to_string());
        }

        let mut suffix = conflicts + 1;
        loop {
            let candidate = suffixed(name, suffix, self.max_name_len);
            if let Some(record) = index.with_content(&candidate, content) {
                return Target::Existing(record.clone());
            }
            if let Some(record) = index.unset(&candidate) {
                return Target::Unset(record.clone());
            }
            if !index.name_taken(&candidate) {
                return Target::Free(candidate);
            }
            suffix += 1;
        }
    }

    async fn ensure_index(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }
        let mut index = CollectionIndex::default();
        for id in self.store.variable_ids(&self.collection.id).await? {
            let variable = match self.store.variable(&id).await {
                Ok(Some(variable)) => variable,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Ignoring unreadable variable {id}: {err}");
                    continue;
                }
            };
            if variable.resolved_type != VariableType::String {
                index.insert_foreign(variable.name);
                continue;
            }
            index.insert(VariableRecord {
                id: variable.id,
                name: variable.name,
                value: variable.value.unwrap_or_default(),
                collection_id: variable.collection_id,
            });
        }
        log::debug!(
            "Indexed {} string variables in collection {}",
            index.string_count(),
            self.collection.name
        );
        self.index = Some(index);
        Ok(())
    }

    async fn create(&mut self, name: &str, content: &str) -> Result<VariableRecord> {
        let variable = self
            .store
            .create_variable(name, &self.collection.id, VariableType::String)
            .await
            .map_err(|err| EngineError::creation_failed(name, content, err.to_string()))?;
        self.created_ids.insert(variable.id.clone());
        let record = VariableRecord {
            id: variable.id,
            name: variable.name,
            value: String::new(),
            collection_id: self.collection.id.clone(),
        };
        self.fill(record, content).await
    }

    /// Write `content` as the default value. On failure the valueless record
    /// stays indexed so the next resolve of its name completes it.
    async fn fill(&mut self, mut record: VariableRecord, content: &str) -> Result<VariableRecord> {
        if let Err(err) = self
            .store
            .set_value(&record.id, &self.collection.default_mode_id, content)
            .await
        {
            let reason = format!("created {} but could not set its value: {err}", record.id);
            if let Some(index) = self.index.as_mut() {
                index.insert(record.clone());
            }
            return Err(EngineError::creation_failed(&record.name, content, reason));
        }
        record.value = content.to_string();
        Ok(record)
    }

    fn remember(&mut self, requested: &str, content: &str, record: VariableRecord) {
        if requested != record.name {
            self.cache.insert(&record.name, content, record.clone());
        }
        self.cache.insert(requested, content, record);
    }
}

/// `name_N`, shortening `name` so the result stays within `max_len`.
fn suffixed(name: &str, suffix: usize, max_len: usize) -> String {
    let tail = format!("_{suffix}");
    let budget = max_len.saturating_sub(tail.len());
    format!("{}{tail}", truncate_name(name, budget))
}
