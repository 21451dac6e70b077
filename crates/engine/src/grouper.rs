use crate::source::{ContentGroup, TextSource};
use std::collections::HashMap;
use textvar_naming::{NamingError, NamingStrategy};

/// Result of partitioning one batch of sources.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// In first-seen order
    pub groups: Vec<ContentGroup>,
    /// Sources whose group could not be named; never bound
    pub rejected: Vec<(TextSource, NamingError)>,
}

impl Grouping {
    pub fn source_count(&self) -> usize {
        self.groups.iter().map(ContentGroup::len).sum::<usize>() + self.rejected.len()
    }

    pub fn duplicate_group_count(&self) -> usize {
        self.groups.iter().filter(|group| group.is_duplicate()).count()
    }
}

/// Partition `sources` by the strategy's content key.
///
/// Every source lands in exactly one group (or in `rejected`). The first source
/// of a group fixes its displayed content and its variable name.
pub fn group_sources(sources: Vec<TextSource>, strategy: &dyn NamingStrategy) -> Grouping {
    let mut grouping = Grouping::default();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for source in sources {
        let key = strategy.group_key(&source.content);
        if let Some(&index) = by_key.get(&key) {
            grouping.groups[index].sources.push(source);
            continue;
        }

        let variable_name = match strategy.compose(&source.naming_subject()) {
            Ok(name) => name,
            Err(err) => {
                log::warn!("Cannot name text of node {}: {err}", source.node_id);
                grouping.rejected.push((source, err));
                continue;
            }
        };

        by_key.insert(key.clone(), grouping.groups.len());
        grouping.groups.push(ContentGroup {
            key,
            content: source.content.trim().to_string(),
            variable_name,
            sources: vec![source],
        });
    }

    log::debug!(
        "Grouped sources into {} groups ({} with duplicates, {} rejected) using {} naming",
        grouping.groups.len(),
        grouping.duplicate_group_count(),
        grouping.rejected.len(),
        strategy.mode()
    );
    grouping
}
