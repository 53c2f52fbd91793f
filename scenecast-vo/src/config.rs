//! Configuration resolution for scenecast-vo
//!
//! Per-setting priority: environment variable → TOML config file →
//! compiled default. The TOML file lives at
//! `~/.config/scenecast/scenecast-vo.toml`.

use scenecast_common::config::{load_default_toml_config, resolve_setting, TomlConfig};
use scenecast_common::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::{DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_TRANSPORT_RETRY_ATTEMPTS};

/// Default HTTP bind address
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5731";

/// Default concurrent verification workers
const DEFAULT_WORKER_COUNT: usize = 4;

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    /// Directory holding audio artifacts and the task database
    pub media_dir: PathBuf,
    pub database_path: PathBuf,
    pub synthesis_url: String,
    pub transcription_url: String,
    pub provider_api_key: Option<String>,
    pub worker_count: usize,
    pub transport_retry_attempts: u32,
    pub provider_timeout: Duration,
    /// Tracing filter directive when RUST_LOG is unset
    pub log_level: String,
}

impl ServiceConfig {
    /// Resolve configuration from environment, TOML, and defaults
    pub fn resolve() -> Result<Self> {
        let toml = load_default_toml_config()?;
        Ok(Self::from_toml(&toml))
    }

    /// Resolve against an already-loaded TOML config (test harnesses)
    pub fn from_toml(toml: &TomlConfig) -> Self {
        let bind_address = resolve_setting(
            "SCENECAST_VO_BIND",
            toml.bind_address.as_deref(),
            DEFAULT_BIND_ADDRESS,
        );

        let media_dir = PathBuf::from(resolve_setting(
            "SCENECAST_MEDIA_DIR",
            toml.media_dir.as_deref(),
            &default_media_dir().to_string_lossy(),
        ));
        let database_path = media_dir.join("scenecast-vo.db");

        let synthesis_url = resolve_setting(
            "SCENECAST_SYNTHESIS_URL",
            toml.synthesis_url.as_deref(),
            "http://127.0.0.1:8801",
        );
        let transcription_url = resolve_setting(
            "SCENECAST_TRANSCRIPTION_URL",
            toml.transcription_url.as_deref(),
            "http://127.0.0.1:8802",
        );

        let provider_api_key = resolve_api_key(toml);

        let worker_count = resolve_setting(
            "SCENECAST_WORKER_COUNT",
            toml.worker_count.map(|n| n.to_string()).as_deref(),
            &DEFAULT_WORKER_COUNT.to_string(),
        )
        .parse()
        .unwrap_or(DEFAULT_WORKER_COUNT)
        .max(1);

        let log_level = resolve_setting(
            "SCENECAST_LOG_LEVEL",
            toml.logging.level.as_deref(),
            "info",
        );

        Self {
            bind_address,
            media_dir,
            database_path,
            synthesis_url,
            transcription_url,
            provider_api_key,
            worker_count,
            transport_retry_attempts: DEFAULT_TRANSPORT_RETRY_ATTEMPTS,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            log_level,
        }
    }
}

/// Resolve the provider API key with ENV → TOML priority
///
/// Warns when the key is configured in more than one place, since a stale
/// duplicate is an easy way to end up authenticating with the wrong key.
fn resolve_api_key(toml: &TomlConfig) -> Option<String> {
    let env_key = std::env::var("SCENECAST_PROVIDER_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let toml_key = toml
        .provider_api_key
        .clone()
        .filter(|k| !k.trim().is_empty());

    if env_key.is_some() && toml_key.is_some() {
        tracing::warn!(
            "Provider API key found in both environment and TOML; using environment (highest priority)"
        );
    }

    match (env_key, toml_key) {
        (Some(key), _) => {
            tracing::info!("Provider API key loaded from environment variable");
            Some(key)
        }
        (None, Some(key)) => {
            tracing::info!("Provider API key loaded from TOML config");
            Some(key)
        }
        (None, None) => {
            tracing::warn!("No provider API key configured; provider calls go out unauthenticated");
            None
        }
    }
}

/// Default media directory (~/.local/share/scenecast on Linux)
fn default_media_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("scenecast"))
        .unwrap_or_else(|| PathBuf::from("./scenecast_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_common::config::LoggingConfig;

    #[test]
    fn defaults_apply_with_empty_toml() {
        let config = ServiceConfig::from_toml(&TomlConfig::default());

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(config.transport_retry_attempts, DEFAULT_TRANSPORT_RETRY_ATTEMPTS);
        assert!(config
            .database_path
            .to_string_lossy()
            .ends_with("scenecast-vo.db"));
    }

    #[test]
    fn toml_values_override_defaults() {
        let toml = TomlConfig {
            bind_address: Some("0.0.0.0:9000".to_string()),
            media_dir: Some("/tmp/scenecast-test".to_string()),
            synthesis_url: Some("http://synth.internal:8080".to_string()),
            worker_count: Some(2),
            logging: LoggingConfig {
                level: Some("debug".to_string()),
            },
            ..Default::default()
        };

        let config = ServiceConfig::from_toml(&toml);
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.media_dir, PathBuf::from("/tmp/scenecast-test"));
        assert_eq!(config.synthesis_url, "http://synth.internal:8080");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn worker_count_has_a_floor_of_one() {
        let toml = TomlConfig {
            worker_count: Some(0),
            ..Default::default()
        };
        let config = ServiceConfig::from_toml(&toml);
        assert_eq!(config.worker_count, 1);
    }
}
