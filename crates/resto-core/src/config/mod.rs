//! Client configuration.
//!
//! A JSON file supplies the persistent values and `RESTO_*` environment
//! variables override them. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const DEFAULT_DATA_SERVICE_URL: &str = "http://localhost:1337";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_DATA_SERVICE_URL: &str = "RESTO_DATA_SERVICE_URL";
pub const ENV_DB_PATH: &str = "RESTO_DB_PATH";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RESTO_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// What a pass does with a review the data service has but the mirror lacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteOnlyReviewPolicy {
    /// The review was deleted locally while offline; delete it remotely.
    #[default]
    PropagateDelete,
    /// The review is new to this client; copy it into the mirror.
    MirrorLocally,
}

/// Runtime settings shared by the core and its hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_data_service_url")]
    pub data_service_url: String,
    /// Per-request timeout; `0` disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Period of background wake-ups while watching
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default)]
    pub remote_only_reviews: RemoteOnlyReviewPolicy,
    /// Mirror database file; hosts pick a platform default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

fn default_data_service_url() -> String {
    DEFAULT_DATA_SERVICE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_service_url: default_data_service_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            remote_only_reviews: RemoteOnlyReviewPolicy::default(),
            db_path: None,
        }
    }
}

impl ClientConfig {
    /// Read the file at `path`; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.validated()
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `RESTO_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, then validate.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_DATA_SERVICE_URL)) {
            self.data_service_url = url;
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_REQUEST_TIMEOUT_SECS)) {
            self.request_timeout_secs = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "{ENV_REQUEST_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
        }
        self.validated()
    }

    /// Request timeout, `None` when disabled.
    pub const fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    fn validated(mut self) -> Result<Self> {
        let url = normalize_text_option(Some(self.data_service_url))
            .ok_or_else(|| Error::Config("data_service_url must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::Config(format!(
                "data_service_url must include http:// or https://, got {url:?}"
            )));
        }
        self.data_service_url = url.trim_end_matches('/').to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = ClientConfig::load_from_path(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn file_values_are_normalized() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"data_service_url": " https://api.example.com/ ",
                "remote_only_reviews": "mirror-locally",
                "request_timeout_secs": 0}"#,
        )
        .unwrap();

        let config = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(config.data_service_url, "https://api.example.com");
        assert_eq!(config.remote_only_reviews, RemoteOnlyReviewPolicy::MirrorLocally);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"server": "http://localhost"}"#).unwrap();

        assert!(matches!(
            ClientConfig::load_from_path(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = ClientConfig {
            db_path: Some(tmp.path().join("resto.db")),
            sync_interval_secs: 5,
            ..ClientConfig::default()
        };

        config.save_to_path(&path).unwrap();
        assert_eq!(ClientConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn env_overrides_win() {
        let config = ClientConfig::default()
            .with_overrides(lookup(&[
                (ENV_DATA_SERVICE_URL, "http://10.0.0.2:1337/"),
                (ENV_DB_PATH, "/tmp/resto.db"),
                (ENV_REQUEST_TIMEOUT_SECS, "3"),
            ]))
            .unwrap();

        assert_eq!(config.data_service_url, "http://10.0.0.2:1337");
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/resto.db")));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn invalid_overrides_are_errors() {
        assert!(ClientConfig::default()
            .with_overrides(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .is_err());
        assert!(ClientConfig::default()
            .with_overrides(lookup(&[(ENV_DATA_SERVICE_URL, "localhost:1337")]))
            .is_err());
    }
}
