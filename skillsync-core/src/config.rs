//! Layered configuration.
//!
//! # Sources
//!
//! ```text
//! ~/.skillsync/config.yaml   (optional, flat KEY: value mapping)
//! process environment        (wins over the file)
//! ```
//!
//! Every key is optional and has a default. Keys use the same upper-case
//! names in the file and in the environment, e.g. `SLEEP_TIME: 250`.
//!
//! # API pattern
//!
//! - `load_at(home, lookup)`: explicit home and env lookup; used in tests
//! - `load()`: derives home from `dirs::home_dir()` and reads `std::env`

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::ConfigError;

pub const DEFAULT_LOG_LEVEL: &str = "debug";
pub const DEFAULT_KAFKA_URL: &str = "localhost:9092";
pub const DEFAULT_KAFKA_GROUP_ID: &str = "skill-record-processor";
pub const DEFAULT_SKILL_SYNC_TOPIC: &str = "backgroundjob.sync.user.skills";
pub const DEFAULT_UBAHN_API_URL: &str = "https://api.topcoder-dev.com/v5";
pub const DEFAULT_MEMBERS_API_URL: &str = "https://api.topcoder-dev.com/v5/members";
pub const DEFAULT_AUTH0_URL: &str = "https://topcoder-dev.auth0.com/oauth/token";
pub const DEFAULT_AUTH0_UBAHN_AUDIENCE: &str = "https://u-bahn.topcoder.com";
pub const DEFAULT_AUTH0_TOPCODER_AUDIENCE: &str = "https://m2m.topcoder-dev.com/";
pub const DEFAULT_SKILL_PROVIDER_NAME: &str = "Topcoder";
pub const DEFAULT_SLEEP_TIME_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never shows up in `Debug` output or serialized config.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Log output format for the daemon and CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Event transport settings. The pipeline itself never reads these; the
/// daemon uses the topic to filter events and reports the rest in status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportConfig {
    pub url: String,
    pub group_id: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert_key: Option<Secret>,
}

impl TransportConfig {
    /// TLS is only enabled when both certificate and key are configured.
    pub fn tls_enabled(&self) -> bool {
        self.client_cert.is_some() && self.client_cert_key.is_some()
    }
}

/// Machine-to-machine OAuth settings shared by both token providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthConfig {
    pub url: String,
    pub ubahn_audience: String,
    pub topcoder_audience: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_cache_time_secs: Option<u64>,
}

impl AuthConfig {
    pub fn token_cache_time(&self) -> Option<Duration> {
        self.token_cache_time_secs.map(Duration::from_secs)
    }
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub transport: TransportConfig,
    pub ubahn_api_url: String,
    pub members_api_url: String,
    pub auth: AuthConfig,
    pub skill_provider_name: String,
    pub sleep_time_ms: u64,
    pub request_timeout_ms: u64,
}

impl Config {
    /// Pause after every downstream write.
    pub fn sleep_time(&self) -> Duration {
        Duration::from_millis(self.sleep_time_ms)
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build a config from a key lookup. Missing keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT",
                        value: v,
                    })
                }
            },
        };

        Ok(Self {
            log_level: or("LOG_LEVEL", DEFAULT_LOG_LEVEL),
            log_format,
            transport: TransportConfig {
                url: or("KAFKA_URL", DEFAULT_KAFKA_URL),
                group_id: or("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
                topic: or("SKILL_SYNC_TOPIC", DEFAULT_SKILL_SYNC_TOPIC),
                client_cert: get("KAFKA_CLIENT_CERT"),
                client_cert_key: get("KAFKA_CLIENT_CERT_KEY").map(Secret::new),
            },
            ubahn_api_url: trim_trailing_slash(or("UBAHN_API_URL", DEFAULT_UBAHN_API_URL)),
            members_api_url: trim_trailing_slash(or("MEMBERS_API_URL", DEFAULT_MEMBERS_API_URL)),
            auth: AuthConfig {
                url: or("AUTH0_URL", DEFAULT_AUTH0_URL),
                ubahn_audience: or("AUTH0_UBAHN_AUDIENCE", DEFAULT_AUTH0_UBAHN_AUDIENCE),
                topcoder_audience: or("AUTH0_TOPCODER_AUDIENCE", DEFAULT_AUTH0_TOPCODER_AUDIENCE),
                client_id: get("AUTH0_CLIENT_ID"),
                client_secret: get("AUTH0_CLIENT_SECRET").map(Secret::new),
                proxy_server_url: get("AUTH0_PROXY_SERVER_URL"),
                token_cache_time_secs: get("TOKEN_CACHE_TIME")
                    .map(|v| parse_u64("TOKEN_CACHE_TIME", v))
                    .transpose()?,
            },
            skill_provider_name: or("SKILL_PROVIDER_NAME", DEFAULT_SKILL_PROVIDER_NAME),
            sleep_time_ms: get("SLEEP_TIME")
                .map(|v| parse_u64("SLEEP_TIME", v))
                .transpose()?
                .unwrap_or(DEFAULT_SLEEP_TIME_MS),
            request_timeout_ms: get("REQUEST_TIMEOUT_MS")
                .map(|v| parse_u64("REQUEST_TIMEOUT_MS", v))
                .transpose()?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        })
    }

    /// Load `<home>/.skillsync/config.yaml` (if present) layered under
    /// `lookup`.
    pub fn load_at<F>(home: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = load_file_at(home)?;
        Self::from_lookup(|key| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .or_else(|| file.get(key).cloned())
        })
    }

    /// `load_at` convenience wrapper over the real home directory and env.
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Self::load_at(&home, |key| std::env::var(key).ok())
    }
}

/// `<home>/.skillsync/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".skillsync").join("config.yaml")
}

/// Read the config file into a flat key → string map. Missing file is empty.
fn load_file_at(home: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let text = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "config.yaml",
                    value: format!("{key} must be a scalar"),
                })
            }
        };
        values.insert(key, text);
    }
    Ok(values)
}

fn parse_u64(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

fn trim_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
