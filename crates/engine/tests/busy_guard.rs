use async_trait::async_trait;
use std::sync::Arc;
use textvar_engine::{
    DocumentSnapshot, EngineConfig, EngineError, MemoryHost, MemoryPreferences, NodeRecord,
    NullProgress, Pacer, TextVarEngine,
};
use textvar_protocol::{Request, Response};
use tokio::sync::Notify;

/// Parks the batch at its first chunk boundary until released.
#[derive(Default)]
struct GatedPacer {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Pacer for GatedPacer {
    async fn pause(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

fn setup(texts: &[&str]) -> (Arc<MemoryHost>, Arc<GatedPacer>, TextVarEngine) {
    let host = Arc::new(MemoryHost::from_snapshot(DocumentSnapshot {
        nodes: texts
            .iter()
            .enumerate()
            .map(|(i, text)| NodeRecord::text(format!("1:{i}"), "Text", *text))
            .collect(),
        ..Default::default()
    }));
    let pacer = Arc::new(GatedPacer::default());
    let config = EngineConfig {
        chunk_size: 1,
        ..EngineConfig::headless()
    };
    let engine = TextVarEngine::new(
        host.clone(),
        host.clone(),
        Arc::new(MemoryPreferences::new()),
        config,
    )
    .expect("engine")
    .with_pacer(pacer.clone());
    (host, pacer, engine)
}

#[tokio::test]
async fn second_batch_is_rejected_while_first_runs() {
    let (host, pacer, engine) = setup(&["One", "Two"]);
    let collection = engine.create_collection("").await.expect("collection");

    let first = engine.process_batch(&collection.id, None, &NullProgress);
    let second = async {
        pacer.entered.notified().await;
        assert!(engine.is_busy());
        let result = engine.process_batch(&collection.id, None, &NullProgress).await;
        pacer.release.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(second, Err(EngineError::ProcessingInProgress)));
    let stats = first.expect("first batch");
    assert_eq!(stats.created, 2);
    assert_eq!(stats.processed_groups, 2);
    assert!(!stats.cancelled);
    assert_eq!(host.variable_count(), 2);
    assert!(!engine.is_busy());
}

#[tokio::test]
async fn cancel_stops_the_running_batch_at_the_next_chunk() {
    let (host, pacer, engine) = setup(&["One", "Two", "Three"]);
    let collection = engine.create_collection("").await.expect("collection");

    let run = engine.process_batch(&collection.id, None, &NullProgress);
    let cancel = async {
        pacer.entered.notified().await;
        let response = engine.handle(Request::Cancel, &NullProgress).await;
        pacer.release.notify_one();
        response
    };
    let (run, cancel) = tokio::join!(run, cancel);

    assert_eq!(cancel, Response::CancelRequested { was_running: true });
    let stats = run.expect("batch");
    assert!(stats.cancelled);
    assert_eq!(stats.processed_groups, 1);
    assert_eq!(stats.created, 1);
    assert_eq!(host.variable_count(), 1);
}
