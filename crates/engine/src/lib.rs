//! # textvar engine
//!
//! Converts static text layers into string variables and keeps the bindings
//! healthy afterwards.
//!
//! ## Architecture
//!
//! ```text
//! DocumentPort ──> Scanner ──> Eligibility ──> Grouper (NamingStrategy)
//!                                                  │
//!                                                  v
//! VariableStore <── Resolver (cache, suffixing) <── BatchProcessor (chunks, Pacer)
//!
//! GhostReconciler: audit + clear bindings whose variable no longer resolves
//! ```
//!
//! Every host interaction goes through the async [`DocumentPort`] and
//! [`VariableStore`] traits. [`MemoryHost`] implements both over a JSON
//! snapshot.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use textvar_engine::{EngineConfig, MemoryHost, MemoryPreferences, NullProgress, TextVarEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = Arc::new(MemoryHost::from_json_str(&std::fs::read_to_string("doc.json")?)?);
//!     let engine = TextVarEngine::new(
//!         host.clone(),
//!         host.clone(),
//!         Arc::new(MemoryPreferences::new()),
//!         EngineConfig::default(),
//!     )?;
//!
//!     let collection = engine.create_collection("Text Variables").await?;
//!     let stats = engine.process_batch(&collection.id, None, &NullProgress).await?;
//!     println!("{} created, {} connected", stats.created, stats.connected);
//!     Ok(())
//! }
//! ```

mod batch;
mod cache;
mod collections;
mod config;
mod eligibility;
mod engine;
mod error;
mod ghost;
mod grouper;
mod guard;
pub mod memory;
mod pacing;
pub mod port;
mod prefs;
mod resolver;
mod scanner;
mod source;

pub use batch::BatchProcessor;
pub use cache::{composite_key, VariableCache, VariableRecord};
pub use collections::{
    create_unique_collection, list_collections, unique_collection_name, DEFAULT_COLLECTION_NAME,
};
pub use config::{EngineConfig, CHUNK_PAUSE_ENV, CHUNK_SIZE_ENV, GHOST_RETRIES_ENV};
pub use eligibility::{classify, is_eligible, Eligibility, EligibilityRules, Ineligible};
pub use engine::{ScanReport, TextVarEngine};
pub use error::{EngineError, Result};
pub use ghost::GhostReconciler;
pub use grouper::{group_sources, Grouping};
pub use guard::{BatchGate, BatchPermit};
pub use memory::{DocumentSnapshot, MemoryHost, NodeRecord};
pub use pacing::{
    pacer_for_ms, CancelFlag, NoPause, NullProgress, Pacer, ProgressSink, SleepPause, YieldNow,
};
pub use port::{
    CollectionInfo, DocumentPort, HostError, HostResult, NodeKind, NodeSnapshot, VariableInfo,
    VariableStore, VariableType,
};
pub use prefs::{load_mode_or_default, MemoryPreferences, PreferenceStore};
pub use resolver::{Resolution, VariableResolver};
pub use scanner::{collect_sources, ScanOutcome};
pub use source::{ContentGroup, TextSource};
