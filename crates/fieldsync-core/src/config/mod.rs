//! Client configuration for the remote gateway and local store.
//!
//! `ClientConfig` is read from a JSON file, then overridden by environment
//! variables. The bearer token is issued elsewhere; this crate only forwards it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "FIELDSYNC_API_URL";
pub const ENV_API_TOKEN: &str = "FIELDSYNC_API_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "FIELDSYNC_TIMEOUT_SECS";
pub const ENV_DB_PATH: &str = "FIELDSYNC_DB_PATH";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("database_path", &self.database_path)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|error| Error::Config(format!("invalid config: {error}")))
    }

    /// Load from `path`; a missing file yields the default config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_json(&raw)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Override fields from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_API_TOKEN)) {
            self.api_token = Some(token);
        }
        if let Some(timeout) = normalize_text_option(lookup(ENV_TIMEOUT_SECS)) {
            let secs = timeout.parse().map_err(|_| {
                Error::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))
            })?;
            self.request_timeout_secs = Some(secs);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.database_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = normalize_text_option(self.api_base_url.clone()) {
            if !is_http_url(&url) {
                return Err(Error::Config(
                    "api_base_url must include http:// or https://".to_string(),
                ));
            }
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Normalized base URL without a trailing slash
    pub fn api_base_url(&self) -> Option<String> {
        normalize_text_option(self.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn from_json_rejects_unknown_fields() {
        let error = ClientConfig::from_json(r#"{"api_base_url":"https://x","bogus":1}"#)
            .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn debug_redacts_token() {
        let config = ClientConfig {
            api_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env = HashMap::from([
            (ENV_API_URL, "https://api.example.com/"),
            (ENV_TIMEOUT_SECS, "3"),
            (ENV_DB_PATH, "/tmp/fieldsync.db"),
        ]);
        let mut config = ClientConfig {
            api_base_url: Some("http://localhost:8080".to_string()),
            ..Default::default()
        };

        config
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(
            config.api_base_url().as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/tmp/fieldsync.db"))
        );
    }

    #[test]
    fn invalid_timeout_override_is_a_config_error() {
        let mut config = ClientConfig::default();
        let error = config
            .apply_overrides(|key| (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_url_and_zero_timeout() {
        let bad_url = ClientConfig {
            api_base_url: Some("api.example.com".to_string()),
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());

        let zero_timeout = ClientConfig {
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        assert!(ClientConfig::default().validate().is_ok());
        assert_eq!(
            ClientConfig::default().request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[test]
    fn save_and_load_roundtrip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        assert_eq!(ClientConfig::load_from_path(&path).unwrap(), ClientConfig::default());

        let config = ClientConfig {
            api_base_url: Some("https://api.example.com".to_string()),
            request_timeout_secs: Some(5),
            ..Default::default()
        };
        config.save_to_path(&path).unwrap();
        assert_eq!(ClientConfig::load_from_path(&path).unwrap(), config);
    }
}
