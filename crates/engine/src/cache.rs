use std::collections::HashMap;

/// What the engine remembers about a variable it created or matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub id: String,
    pub name: String,
    pub value: String,
    pub collection_id: String,
}

/// `name:content` key identifying a (name, content) pair within one collection.
pub fn composite_key(name: &str, content: &str) -> String {
    format!("{name}:{content}")
}

/// Session cache of resolved variables, keyed by [`composite_key`].
///
/// Lives for one batch; a fresh cache is created per run.
#[derive(Debug, Default)]
pub struct VariableCache {
    entries: HashMap<String, VariableRecord>,
    hits: u64,
    misses: u64,
}

impl VariableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, name: &str, content: &str) -> Option<VariableRecord> {
        match self.entries.get(&composite_key(name, content)) {
            Some(record) => {
                self.hits += 1;
                Some(record.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, name: &str, content: &str, record: VariableRecord) {
        self.entries.insert(composite_key(name, content), record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
