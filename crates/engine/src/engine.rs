use crate::batch::BatchProcessor;
use crate::collections::{create_unique_collection, list_collections};
use crate::config::EngineConfig;
use crate::eligibility::{EligibilityRules, Ineligible};
use crate::error::{EngineError, Result};
use crate::ghost::GhostReconciler;
use crate::grouper::{group_sources, Grouping};
use crate::guard::BatchGate;
use crate::pacing::{pacer_for_ms, CancelFlag, Pacer, ProgressSink};
use crate::port::{DocumentPort, VariableStore};
use crate::prefs::{load_mode_or_default, PreferenceStore};
use crate::resolver::VariableResolver;
use crate::scanner::collect_sources;
use crate::source::{ContentGroup, TextSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use textvar_naming::{strategy_for, NamingError};
use textvar_protocol::{
    ClearResult, CollectionSummary, ErrorKind, FailureRecord, GhostBinding, NamingMode,
    ProcessingStats, Request, Response,
};

/// Result of a scan: eligible sources grouped under the active naming mode.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub mode: NamingMode,
    pub grouping: Grouping,
    pub ineligible: BTreeMap<Ineligible, usize>,
}

impl ScanReport {
    pub fn eligible_count(&self) -> usize {
        self.grouping.source_count()
    }

    pub fn ineligible_count(&self) -> usize {
        self.ineligible.values().sum()
    }

    pub fn to_response(&self) -> Response {
        Response::Groups {
            mode: self.mode,
            groups: self.grouping.groups.iter().map(ContentGroup::preview).collect(),
            eligible: self.eligible_count(),
            ineligible: self.ineligible_count(),
            rejected: self.grouping.rejected.len(),
        }
    }
}

/// Single entry point for every caller-visible operation.
///
/// At most one batch runs per engine; a second `process_batch` fails fast with
/// [`EngineError::ProcessingInProgress`] while the first keeps going.
pub struct TextVarEngine {
    document: Arc<dyn DocumentPort>,
    store: Arc<dyn VariableStore>,
    preferences: Arc<dyn PreferenceStore>,
    config: EngineConfig,
    pacer: Arc<dyn Pacer>,
    gate: BatchGate,
    cancel: CancelFlag,
}

impl TextVarEngine {
    pub fn new(
        document: Arc<dyn DocumentPort>,
        store: Arc<dyn VariableStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            document,
            store,
            preferences,
            pacer: pacer_for_ms(config.chunk_pause_ms),
            config,
            gate: BatchGate::new(),
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    fn rules(&self) -> EligibilityRules {
        EligibilityRules {
            max_text_len: self.config.max_text_len,
        }
    }

    pub async fn naming_mode(&self) -> NamingMode {
        load_mode_or_default(self.preferences.as_ref()).await
    }

    pub async fn set_naming_mode(&self, mode: NamingMode) -> Result<NamingMode> {
        self.preferences.save_naming_mode(mode).await?;
        log::info!("Naming mode set to {mode}");
        Ok(mode)
    }

    pub async fn scan_and_group(&self, node_ids: Option<&[String]>) -> Result<ScanReport> {
        let mode = self.naming_mode().await;
        let outcome = collect_sources(self.document.as_ref(), node_ids, &self.rules()).await?;
        let strategy = strategy_for(mode, self.config.naming);
        let grouping = group_sources(outcome.sources, strategy.as_ref());
        Ok(ScanReport {
            mode,
            grouping,
            ineligible: outcome.ineligible,
        })
    }

    /// Scan, group and convert in one guarded run.
    pub async fn process_batch(
        &self,
        collection_id: &str,
        node_ids: Option<&[String]>,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessingStats> {
        let _permit = self
            .gate
            .try_acquire()
            .ok_or(EngineError::ProcessingInProgress)?;
        self.cancel.reset();

        let mut resolver = VariableResolver::for_collection(self.store.as_ref(), collection_id)
            .await?
            .with_name_budget(self.config.naming.max_name_len);
        let report = self.scan_and_group(node_ids).await?;
        if report.grouping.groups.is_empty() {
            return Err(EngineError::NoSources);
        }

        let mut stats = self
            .run_groups(&report.grouping.groups, &mut resolver, progress)
            .await;
        record_rejected(&mut stats, &report.grouping.rejected);
        Ok(stats)
    }

    async fn run_groups(
        &self,
        groups: &[ContentGroup],
        resolver: &mut VariableResolver<'_>,
        progress: &dyn ProgressSink,
    ) -> ProcessingStats {
        let processor = BatchProcessor::new(
            self.document.as_ref(),
            self.pacer.as_ref(),
            self.rules(),
            self.config.chunk_size,
            self.cancel.clone(),
        );
        processor.run(groups, resolver, progress).await
    }

    /// Ask a running batch to stop. Returns whether one was running.
    pub fn request_cancel(&self) -> bool {
        let was_running = self.gate.is_busy();
        if was_running {
            self.cancel.cancel();
        }
        was_running
    }

    fn reconciler(&self) -> GhostReconciler<'_> {
        GhostReconciler::new(
            self.document.as_ref(),
            self.store.as_ref(),
            self.config.ghost_error_retries,
        )
    }

    pub async fn scan_ghosts(&self) -> Result<Vec<GhostBinding>> {
        Ok(self.reconciler().scan().await?)
    }

    pub async fn clear_ghosts(&self, node_ids: &[String]) -> ClearResult {
        self.reconciler().clear(node_ids).await
    }

    pub async fn reveal_node(&self, node_id: &str) -> Result<()> {
        Ok(self.document.reveal_node(node_id).await?)
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        Ok(list_collections(self.store.as_ref()).await?)
    }

    pub async fn create_collection(&self, name: &str) -> Result<CollectionSummary> {
        Ok(create_unique_collection(self.store.as_ref(), name).await?)
    }

    /// Dispatch one request; failures become [`Response::Error`].
    pub async fn handle(&self, request: Request, progress: &dyn ProgressSink) -> Response {
        let name = request.as_str();
        match self.dispatch(request, progress).await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("Request {name} failed: {err}");
                Response::Error {
                    error: err.to_envelope(),
                }
            }
        }
    }

    async fn dispatch(&self, request: Request, progress: &dyn ProgressSink) -> Result<Response> {
        let response = match request {
            Request::ScanAndGroup { node_ids } => {
                self.scan_and_group(node_ids.as_deref()).await?.to_response()
            }
            Request::ProcessBatch {
                collection_id,
                node_ids,
            } => Response::Completed {
                stats: self
                    .process_batch(&collection_id, node_ids.as_deref(), progress)
                    .await?,
            },
            Request::Cancel => Response::CancelRequested {
                was_running: self.request_cancel(),
            },
            Request::ScanGhosts => Response::Ghosts {
                ghosts: self.scan_ghosts().await?,
            },
            Request::ClearGhosts { node_ids } => Response::GhostsCleared {
                result: self.clear_ghosts(&node_ids).await,
            },
            Request::RevealNode { node_id } => {
                self.reveal_node(&node_id).await?;
                Response::Revealed { node_id }
            }
            Request::GetNamingMode => Response::NamingMode {
                mode: self.naming_mode().await,
            },
            Request::SetNamingMode { mode } => Response::NamingMode {
                mode: self.set_naming_mode(mode).await?,
            },
            Request::ListCollections => Response::Collections {
                collections: self.list_collections().await?,
            },
            Request::CreateCollection { name } => Response::CollectionCreated {
                collection: self.create_collection(&name).await?,
            },
        };
        Ok(response)
    }
}

fn record_rejected(stats: &mut ProcessingStats, rejected: &[(TextSource, NamingError)]) {
    for (source, err) in rejected {
        stats.errored += 1;
        stats.add_failure(FailureRecord {
            kind: ErrorKind::InvalidText,
            message: err.to_string(),
            node_id: Some(source.node_id.clone()),
            variable_name: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DocumentSnapshot, MemoryHost, NodeRecord};
    use crate::pacing::NullProgress;
    use crate::prefs::MemoryPreferences;

    fn engine(nodes: Vec<NodeRecord>) -> (Arc<MemoryHost>, TextVarEngine) {
        let host = Arc::new(MemoryHost::from_snapshot(DocumentSnapshot {
            nodes,
            ..Default::default()
        }));
        let engine = TextVarEngine::new(
            host.clone(),
            host.clone(),
            Arc::new(MemoryPreferences::new()),
            EngineConfig::headless(),
        )
        .unwrap();
        (host, engine)
    }

    #[test]
    fn rejects_invalid_config() {
        let host = Arc::new(MemoryHost::new());
        let config = EngineConfig {
            chunk_size: 0,
            ..EngineConfig::headless()
        };
        let result = TextVarEngine::new(
            host.clone(),
            host,
            Arc::new(MemoryPreferences::new()),
            config,
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn unknown_collection_is_an_error_response() {
        let (_host, engine) = engine(vec![NodeRecord::text("1:1", "Label", "Hi")]);
        let response = engine
            .handle(
                Request::ProcessBatch {
                    collection_id: "VariableCollectionId:missing".to_string(),
                    node_ids: None,
                },
                &NullProgress,
            )
            .await;
        assert_eq!(response.error_kind(), Some(ErrorKind::CollectionNotFound));
        assert!(!engine.is_busy());
    }

    #[tokio::test]
    async fn empty_selection_reports_no_sources() {
        let (_host, engine) = engine(vec![NodeRecord::text("1:1", "Label", "Hi").locked()]);
        let collection = engine.create_collection("").await.unwrap();
        let err = engine
            .process_batch(&collection.id, None, &NullProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoSources));
    }

    #[tokio::test]
    async fn cancel_without_a_running_batch_is_a_no_op() {
        let (_host, engine) = engine(Vec::new());
        let response = engine.handle(Request::Cancel, &NullProgress).await;
        assert_eq!(response, Response::CancelRequested { was_running: false });
    }

    #[tokio::test]
    async fn naming_mode_round_trips_through_requests() {
        let (_host, engine) = engine(Vec::new());
        let set = engine
            .handle(
                Request::SetNamingMode {
                    mode: NamingMode::Hierarchical,
                },
                &NullProgress,
            )
            .await;
        assert_eq!(
            set,
            Response::NamingMode {
                mode: NamingMode::Hierarchical
            }
        );
        assert_eq!(engine.naming_mode().await, NamingMode::Hierarchical);
    }

    #[tokio::test]
    async fn reveal_records_the_node() {
        let (host, engine) = engine(vec![NodeRecord::text("1:1", "Label", "Hi")]);
        let response = engine
            .handle(
                Request::RevealNode {
                    node_id: "1:1".to_string(),
                },
                &NullProgress,
            )
            .await;
        assert!(!response.is_error());
        assert_eq!(host.revealed(), vec!["1:1".to_string()]);

        let missing = engine
            .handle(
                Request::RevealNode {
                    node_id: "9:9".to_string(),
                },
                &NullProgress,
            )
            .await;
        assert_eq!(missing.error_kind(), Some(ErrorKind::Host));
    }
}
