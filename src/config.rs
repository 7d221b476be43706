use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Context, Result};

/// Runtime configuration for both sides of the pipeline. Every field has a
/// default, so a missing config file just means "run with defaults".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

/// Vendor device-status API. The auth key usually lives in the environment,
/// referenced from the config file as `${VAR}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub inside_device_id: String,
    pub outside_device_id: String,
    pub auth_key: String,
    /// Pause between the two device calls. The upstream throttles
    /// back-to-back requests, so this gap is load-bearing.
    pub call_gap_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://shelly-211-eu.shelly.cloud".to_string(),
            inside_device_id: String::new(),
            outside_device_id: String::new(),
            auth_key: "${SHELLY_AUTH_KEY}".to_string(),
            call_gap_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Directory for the durable history blob. History is kept in memory
    /// only when this is unset.
    pub history_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            history_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the facade the watch command polls.
    pub endpoint: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787".to_string(),
            poll_interval_secs: 60,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Expand `${VAR}` placeholders so secrets stay out of the config file.
pub fn expand_env_vars(value: &str) -> Result<String> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }

            if name.is_empty() {
                return Err(AppError::message(
                    "Encountered empty environment placeholder in config",
                ));
            }

            if !closed {
                return Err(AppError::message(
                    "Unterminated environment placeholder in config",
                ));
            }

            let value = std::env::var(&name).with_context(|| {
                format!("Environment variable {} required by config is not set", name)
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("no_such_config.json")).unwrap();
        assert_eq!(config.upstream.call_gap_ms, 1000);
        assert_eq!(config.client.poll_interval_secs, 60);
        assert_eq!(config.client.request_timeout_secs, 10);
        assert!(config.server.history_dir.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"upstream": {"inside_device_id": "abc", "outside_device_id": "def"}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.upstream.inside_device_id, "abc");
        assert_eq!(config.upstream.call_gap_ms, 1000);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8787");
    }

    #[test]
    fn expands_placeholders_from_environment() {
        std::env::set_var("TEMP_RELAY_TEST_KEY", "s3cret");
        let expanded = expand_env_vars("key-${TEMP_RELAY_TEST_KEY}-end").unwrap();
        assert_eq!(expanded, "key-s3cret-end");
    }

    #[test]
    fn rejects_unterminated_placeholder() {
        assert!(expand_env_vars("${NOT_CLOSED").is_err());
    }

    #[test]
    fn rejects_unset_variable() {
        assert!(expand_env_vars("${TEMP_RELAY_TEST_DEFINITELY_UNSET}").is_err());
    }
}
