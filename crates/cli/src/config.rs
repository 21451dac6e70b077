use anyhow::{Context, Result};
use std::path::Path;
use textvar_engine::EngineConfig;

/// Engine config from an optional TOML file, then `TEXTVAR_*` env overrides.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<EngineConfig>(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate().context("Invalid engine configuration")?;
    log::debug!("Engine config: {config:?}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_partial_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("textvar.toml");
        std::fs::write(&path, "max_text_len = 200\n\n[naming]\nmax_name_len = 40\n").unwrap();

        let config = load_engine_config(Some(&path)).unwrap();
        assert_eq!(config.max_text_len, 200);
        assert_eq!(config.naming.max_name_len, 40);
        assert_eq!(config.ghost_error_retries, 1);
    }

    #[test]
    fn rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("textvar.toml");
        std::fs::write(&path, "[naming]\nmax_name_len = 1\n").unwrap();
        assert!(load_engine_config(Some(&path)).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_engine_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
