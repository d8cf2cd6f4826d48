//! Error types for slider-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading, validating or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.slider/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `slider init` first")]
    ConfigNotFound { path: PathBuf },

    /// `init` refuses to clobber an existing config.
    #[error("config already exists at {path}")]
    AlreadyExists { path: PathBuf },

    /// A course selector is not a valid regular expression.
    #[error("invalid course pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Semantically invalid value (empty root URL, zero chunk size, …).
    #[error("invalid config: {0}")]
    Invalid(String),
}
