use crate::port::{CollectionInfo, HostResult, VariableStore};
use std::collections::HashSet;
use textvar_protocol::CollectionSummary;

pub const DEFAULT_COLLECTION_NAME: &str = "Text Variables";

pub async fn list_collections(store: &dyn VariableStore) -> HostResult<Vec<CollectionSummary>> {
    let mut summaries = Vec::new();
    for collection in store.collections().await? {
        let variable_count = store.variable_ids(&collection.id).await?.len();
        summaries.push(summary(collection, variable_count));
    }
    Ok(summaries)
}

/// Create a collection named `base`, or `base 2`, `base 3`, ... if taken.
pub async fn create_unique_collection(
    store: &dyn VariableStore,
    base: &str,
) -> HostResult<CollectionSummary> {
    let base = match base.trim() {
        "" => DEFAULT_COLLECTION_NAME,
        trimmed => trimmed,
    };
    let existing: HashSet<String> = store
        .collections()
        .await?
        .into_iter()
        .map(|collection| collection.name)
        .collect();
    let name = unique_collection_name(base, &existing);
    let collection = store.create_collection(&name).await?;
    log::info!("Created collection {} ({})", collection.name, collection.id);
    Ok(summary(collection, 0))
}

pub fn unique_collection_name(base: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }
    (2usize..)
        .map(|n| format!("{base} {n}"))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn summary(collection: CollectionInfo, variable_count: usize) -> CollectionSummary {
    CollectionSummary {
        id: collection.id,
        name: collection.name,
        default_mode_id: collection.default_mode_id,
        variable_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use pretty_assertions::assert_eq;

    #[test]
    fn unique_name_probes_numbered_suffixes() {
        let existing: HashSet<String> = ["Copy", "Copy 2", "Copy 3"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(unique_collection_name("Copy", &existing), "Copy 4");
        assert_eq!(unique_collection_name("Fresh", &existing), "Fresh");
    }

    #[tokio::test]
    async fn creates_and_lists_collections() {
        let host = MemoryHost::new();
        let first = create_unique_collection(&host, "").await.unwrap();
        let second = create_unique_collection(&host, "Text Variables").await.unwrap();
        assert_eq!(first.name, "Text Variables");
        assert_eq!(second.name, "Text Variables 2");

        let listed = list_collections(&host).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Text Variables", "Text Variables 2"]);
        assert!(listed.iter().all(|c| c.variable_count == 0));
    }
}
