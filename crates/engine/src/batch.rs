use crate::eligibility::{classify, Eligibility, EligibilityRules};
use crate::error::{EngineError, Result};
use crate::pacing::{CancelFlag, Pacer, ProgressSink};
use crate::port::DocumentPort;
use crate::resolver::VariableResolver;
use crate::source::{ContentGroup, TextSource};
use std::time::Instant;
use textvar_protocol::{BindingKind, ErrorKind, FailureRecord, ProcessingStats, ProgressUpdate};

/// Why one source was left unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BindOutcome {
    Bound,
    Skipped(String),
}

/// Converts content groups into bound variables, a chunk at a time.
pub struct BatchProcessor<'a> {
    document: &'a dyn DocumentPort,
    pacer: &'a dyn Pacer,
    rules: EligibilityRules,
    chunk_size: usize,
    cancel: CancelFlag,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        document: &'a dyn DocumentPort,
        pacer: &'a dyn Pacer,
        rules: EligibilityRules,
        chunk_size: usize,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            document,
            pacer,
            rules,
            chunk_size: chunk_size.max(1),
            cancel,
        }
    }

    /// Process every group; per-item problems become counters, never errors.
    pub async fn run(
        &self,
        groups: &[ContentGroup],
        resolver: &mut VariableResolver<'_>,
        progress: &dyn ProgressSink,
    ) -> ProcessingStats {
        let started = Instant::now();
        let mut stats = ProcessingStats {
            group_count: groups.len(),
            duplicate_group_count: groups.iter().filter(|g| g.is_duplicate()).count(),
            ..ProcessingStats::new()
        };
        log::info!(
            "Processing {} groups into collection {}",
            groups.len(),
            resolver.collection().name
        );

        let total = groups.len();
        let chunk_count = total.div_ceil(self.chunk_size);
        for (chunk_index, chunk) in groups.chunks(self.chunk_size).enumerate() {
            if self.cancel.is_cancelled() {
                log::info!(
                    "Batch cancelled after {} of {total} groups",
                    stats.processed_groups
                );
                stats.cancelled = true;
                break;
            }

            for group in chunk {
                self.process_group(group, resolver, &mut stats).await;
                stats.processed_groups += 1;
            }

            progress.report(ProgressUpdate::new(stats.processed_groups, total));
            log::debug!(
                "Chunk {}/{chunk_count} done ({}/{total} groups)",
                chunk_index + 1,
                stats.processed_groups
            );
            if chunk_index + 1 < chunk_count {
                self.pacer.pause().await;
            }
        }

        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Batch finished: {} created, {} connected, {} skipped, {} errored in {}ms",
            stats.created,
            stats.connected,
            stats.skipped,
            stats.errored,
            stats.elapsed_ms
        );
        stats
    }

    async fn process_group(
        &self,
        group: &ContentGroup,
        resolver: &mut VariableResolver<'_>,
        stats: &mut ProcessingStats,
    ) {
        let resolution = match resolver.resolve(&group.variable_name, &group.content).await {
            Ok(resolution) => resolution,
            Err(err) => {
                log::warn!("Group {:?} failed: {err}", group.variable_name);
                stats.errored += group.len();
                stats.add_failure(FailureRecord {
                    kind: err.kind(),
                    message: err.to_string(),
                    node_id: None,
                    variable_name: Some(group.variable_name.clone()),
                });
                return;
            }
        };

        let mut creation_counted = !resolution.created;
        for source in &group.sources {
            match self.bind_source(source, &resolution.record.id).await {
                Ok(BindOutcome::Bound) if !creation_counted => {
                    creation_counted = true;
                    stats.created += 1;
                }
                Ok(BindOutcome::Bound) => stats.connected += 1,
                Ok(BindOutcome::Skipped(reason)) => {
                    log::debug!("Skipped node {}: {reason}", source.node_id);
                    stats.skipped += 1;
                    stats.add_failure(FailureRecord {
                        kind: ErrorKind::BindingFailed,
                        message: reason,
                        node_id: Some(source.node_id.clone()),
                        variable_name: Some(resolution.record.name.clone()),
                    });
                }
                Err(err) => {
                    log::warn!("{err}");
                    stats.skipped += 1;
                    stats.add_failure(FailureRecord {
                        kind: err.kind(),
                        message: err.to_string(),
                        node_id: Some(source.node_id.clone()),
                        variable_name: Some(resolution.record.name.clone()),
                    });
                }
            }
        }
    }

    /// Re-validate `source` against the live document, then bind it.
    async fn bind_source(&self, source: &TextSource, variable_id: &str) -> Result<BindOutcome> {
        let node = match self.document.node(&source.node_id).await {
            Ok(Some(node)) => node,
            Ok(None) => return Ok(BindOutcome::Skipped("node no longer exists".to_string())),
            Err(err) => {
                return Err(EngineError::binding_failed(
                    &source.node_id,
                    variable_id,
                    err.to_string(),
                ))
            }
        };

        if node.binding(BindingKind::Characters) == Some(variable_id) {
            return Ok(BindOutcome::Bound);
        }
        if let Eligibility::Ineligible(reason) = classify(&node, &self.rules) {
            return Ok(BindOutcome::Skipped(reason.to_string()));
        }
        let current = node.characters.as_deref().unwrap_or_default().trim();
        if current != source.content.trim() {
            return Ok(BindOutcome::Skipped(
                "content changed since scan".to_string(),
            ));
        }

        self.document
            .set_binding(&source.node_id, BindingKind::Characters, variable_id)
            .await
            .map_err(|err| EngineError::binding_failed(&source.node_id, variable_id, err.to_string()))?;
        Ok(BindOutcome::Bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DocumentSnapshot, MemoryHost, NodeRecord};
    use crate::pacing::{NoPause, NullProgress};
    use crate::port::VariableStore;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn group(name: &str, content: &str, node_ids: &[&str]) -> ContentGroup {
        ContentGroup {
            key: content.to_string(),
            content: content.to_string(),
            variable_name: name.to_string(),
            sources: node_ids
                .iter()
                .map(|id| TextSource::new(*id, "Label", content))
                .collect(),
        }
    }

    async fn host(nodes: Vec<NodeRecord>) -> (MemoryHost, String) {
        let host = MemoryHost::from_snapshot(DocumentSnapshot {
            nodes,
            ..Default::default()
        });
        let collection = host.create_collection("Text Variables").await.unwrap();
        (host, collection.id)
    }

    #[tokio::test]
    async fn counts_created_then_connected() {
        let (host, collection_id) = host(vec![
            NodeRecord::text("1:1", "Primary", "Sign Up"),
            NodeRecord::text("1:2", "Secondary", "Sign Up"),
        ])
        .await;
        let mut resolver = VariableResolver::for_collection(&host, &collection_id)
            .await
            .unwrap();
        let processor = BatchProcessor::new(
            &host,
            &NoPause,
            EligibilityRules::default(),
            10,
            CancelFlag::new(),
        );

        let groups = vec![group("Sign_Up", "Sign Up", &["1:1", "1:2"])];
        let stats = processor.run(&groups, &mut resolver, &NullProgress).await;
        assert_eq!(stats.created, 1);
        assert_eq!(stats.connected, 1);
        assert_eq!(stats.accounted_sources(), 2);
        assert_eq!(stats.duplicate_group_count, 1);
    }

    #[tokio::test]
    async fn changed_content_is_skipped() {
        let (host, collection_id) = host(vec![NodeRecord::text("1:1", "Label", "Edited")]).await;
        let mut resolver = VariableResolver::for_collection(&host, &collection_id)
            .await
            .unwrap();
        let processor = BatchProcessor::new(
            &host,
            &NoPause,
            EligibilityRules::default(),
            10,
            CancelFlag::new(),
        );

        let stats = processor
            .run(&[group("Original", "Original", &["1:1"])], &mut resolver, &NullProgress)
            .await;
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.failures[0].message, "content changed since scan");
    }

    #[tokio::test]
    async fn reports_progress_per_chunk() {
        let nodes = (0..5)
            .map(|i| NodeRecord::text(format!("1:{i}"), "Label", format!("Text {i}")))
            .collect();
        let (host, collection_id) = host(nodes).await;
        let mut resolver = VariableResolver::for_collection(&host, &collection_id)
            .await
            .unwrap();
        let processor = BatchProcessor::new(
            &host,
            &NoPause,
            EligibilityRules::default(),
            2,
            CancelFlag::new(),
        );

        let groups: Vec<ContentGroup> = (0..5)
            .map(|i| {
                let id = format!("1:{i}");
                group(&format!("Text_{i}"), &format!("Text {i}"), &[id.as_str()])
            })
            .collect();
        let updates = Mutex::new(Vec::new());
        let sink = |update: ProgressUpdate| {
            updates.lock().unwrap().push((update.processed, update.remaining));
        };
        let stats = processor.run(&groups, &mut resolver, &sink).await;

        assert_eq!(stats.created, 5);
        assert_eq!(*updates.lock().unwrap(), vec![(2, 3), (4, 1), (5, 0)]);
    }

    #[tokio::test]
    async fn cancelled_run_stops_at_next_checkpoint() {
        let (host, collection_id) = host(vec![NodeRecord::text("1:1", "Label", "Hi")]).await;
        let mut resolver = VariableResolver::for_collection(&host, &collection_id)
            .await
            .unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let processor =
            BatchProcessor::new(&host, &NoPause, EligibilityRules::default(), 10, cancel);

        let stats = processor
            .run(&[group("Hi", "Hi", &["1:1"])], &mut resolver, &NullProgress)
            .await;
        assert!(stats.cancelled);
        assert_eq!(stats.processed_groups, 0);
        assert_eq!(host.variable_count(), 0);
    }
}
