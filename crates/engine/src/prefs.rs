use crate::port::{HostError, HostResult};
use async_trait::async_trait;
use std::sync::Mutex;
use textvar_protocol::NamingMode;

/// Persists the user's naming-mode choice between sessions.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_naming_mode(&self) -> HostResult<Option<NamingMode>>;

    async fn save_naming_mode(&self, mode: NamingMode) -> HostResult<()>;
}

/// Stored mode, or `simple` when nothing is stored or the read fails.
pub async fn load_mode_or_default(prefs: &dyn PreferenceStore) -> NamingMode {
    match prefs.load_naming_mode().await {
        Ok(Some(mode)) => mode,
        Ok(None) => NamingMode::default(),
        Err(err) => {
            log::warn!("Failed to load naming mode, using default: {err}");
            NamingMode::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    mode: Mutex<Option<NamingMode>>,
    fail_reads: bool,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: NamingMode) -> Self {
        Self {
            mode: Mutex::new(Some(mode)),
            fail_reads: false,
        }
    }

    /// Every load fails, as with corrupt client storage.
    pub fn failing() -> Self {
        Self {
            mode: Mutex::new(None),
            fail_reads: true,
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferences {
    async fn load_naming_mode(&self) -> HostResult<Option<NamingMode>> {
        if self.fail_reads {
            return Err(HostError::new("load_naming_mode", "storage unavailable"));
        }
        Ok(*self.mode.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn save_naming_mode(&self, mode: NamingMode) -> HostResult<()> {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = Some(mode);
        Ok(())
    }
}
