//! Error types for skillsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A key was present but its value could not be interpreted.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    /// `dirs::home_dir()` returned `None`, so `~/.skillsync/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Rejection reasons for an inbound sync event.
///
/// Raised before any outbound call is made.
#[derive(Debug, Error)]
pub enum EventError {
    /// The event is not valid JSON or does not have the expected shape
    /// (missing required field, wrong type, unparseable timestamp).
    #[error("malformed sync event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required string field is present but empty.
    #[error("\"{field}\" is not allowed to be empty")]
    EmptyField { field: &'static str },
}
