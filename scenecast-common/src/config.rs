//! Configuration loading for SceneCast services
//!
//! Resolution follows a fixed priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive (e.g. "info", "scenecast_vo=debug")
    pub level: Option<String>,
}

/// On-disk TOML configuration shared by the voiceover service
///
/// Every field is optional; unset fields fall back to environment
/// variables and then to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP bind address (e.g. "127.0.0.1:5731")
    pub bind_address: Option<String>,
    /// Directory holding synthesized audio artifacts and the task database
    pub media_dir: Option<String>,
    /// Base URL of the speech synthesis provider
    pub synthesis_url: Option<String>,
    /// Base URL of the transcription provider
    pub transcription_url: Option<String>,
    /// Bearer token for both providers
    pub provider_api_key: Option<String>,
    /// Concurrent verification workers
    pub worker_count: Option<usize>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default config file path for the platform (~/.config/scenecast/scenecast-vo.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scenecast").join("scenecast-vo.toml"))
}

/// Load the TOML config from an explicit path
pub fn load_toml_config(path: &std::path::Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
}

/// Load the TOML config from the default location, if present
///
/// A missing file is not an error; a present-but-malformed file is.
pub fn load_default_toml_config() -> Result<TomlConfig> {
    match default_config_path() {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Write the TOML config back to disk (best-effort persistence of settings)
pub fn write_toml_config(config: &TomlConfig, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Create config dir failed: {}", e)))?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
    std::fs::write(path, content)
        .map_err(|e| Error::Config(format!("Write config failed ({}): {}", path.display(), e)))?;
    Ok(())
}

/// Resolve a single string setting with ENV → TOML → default priority
pub fn resolve_setting(
    env_var_name: &str,
    toml_value: Option<&str>,
    default: &str,
) -> String {
    if let Ok(value) = std::env::var(env_var_name) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    if let Some(value) = toml_value {
        if !value.trim().is_empty() {
            return value.to_string();
        }
    }
    default.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses_partial_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            bind_address = "0.0.0.0:5731"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0:5731"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert!(config.synthesis_url.is_none());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenecast-vo.toml");

        let config = TomlConfig {
            media_dir: Some("/var/lib/scenecast".to_string()),
            worker_count: Some(8),
            ..Default::default()
        };

        write_toml_config(&config, &path).unwrap();
        let loaded = load_toml_config(&path).unwrap();

        assert_eq!(loaded.media_dir.as_deref(), Some("/var/lib/scenecast"));
        assert_eq!(loaded.worker_count, Some(8));
    }

    #[test]
    fn resolve_setting_prefers_toml_over_default() {
        // Unset env var name so the TOML value wins
        let value = resolve_setting(
            "SCENECAST_TEST_UNSET_SETTING",
            Some("from-toml"),
            "compiled-default",
        );
        assert_eq!(value, "from-toml");

        let fallback = resolve_setting("SCENECAST_TEST_UNSET_SETTING", None, "compiled-default");
        assert_eq!(fallback, "compiled-default");
    }
}
