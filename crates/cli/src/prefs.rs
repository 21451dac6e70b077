use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use textvar_engine::{HostError, HostResult, PreferenceStore};
use textvar_protocol::NamingMode;

const PREFS_FILE_NAME: &str = "preferences.json";

/// `<config dir>/textvar/preferences.json`, or `./.textvar/...` without a config dir.
pub fn default_prefs_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("textvar"))
        .unwrap_or_else(|| PathBuf::from(".textvar"))
        .join(PREFS_FILE_NAME)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    naming_mode: Option<NamingMode>,
}

/// Naming-mode preference persisted as a small JSON file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self, operation: &str) -> HostResult<PreferencesFile> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreferencesFile::default())
            }
            Err(err) => {
                return Err(HostError::new(
                    operation,
                    format!("read {}: {err}", self.path.display()),
                ))
            }
        };
        serde_json::from_str(&raw).map_err(|err| {
            HostError::new(operation, format!("parse {}: {err}", self.path.display()))
        })
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn load_naming_mode(&self) -> HostResult<Option<NamingMode>> {
        Ok(self.read("load_naming_mode").await?.naming_mode)
    }

    async fn save_naming_mode(&self, mode: NamingMode) -> HostResult<()> {
        // Corrupt files are overwritten.
        let mut prefs = self.read("save_naming_mode").await.unwrap_or_default();
        prefs.naming_mode = Some(mode);

        let write_err = |err: std::io::Error| {
            HostError::new(
                "save_naming_mode",
                format!("write {}: {err}", self.path.display()),
            )
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let body = serde_json::to_string_pretty(&prefs)
            .map_err(|err| HostError::new("save_naming_mode", err.to_string()))?;
        tokio::fs::write(&self.path, body).await.map_err(write_err)?;
        log::debug!("Saved naming mode {mode} to {}", self.path.display());
        Ok(())
    }
}
