//! User configuration stored as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.slider/
//!   config.yaml   (mode 0600, holds portal credentials and store token)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::courses::{CourseMatcher, CourseSelector};
use crate::error::ConfigError;

pub const CONFIG_VERSION: u32 = 1;

/// Files at or above this many bytes are skipped (about 50 MB).
pub const DEFAULT_MAX_FILE_SIZE: f64 = 5e7;

/// Largest payload sent in one remote upload request (32 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024 * 1024;

pub const DEFAULT_PASSTHROUGH_LABEL: &str = "Files";
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

pub const PASSWORD_ENV: &str = "SLIDER_PASSWORD";
pub const REMOTE_TOKEN_ENV: &str = "SLIDER_REMOTE_TOKEN";

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub source: SourceConfig,
    #[serde(default)]
    pub courses: Vec<CourseSelector>,
    pub destination: DestinationConfig,
    /// Second destination, picked by `slider sync --remote` when it is remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_destination: Option<DestinationConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Portal connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub root_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Text in the login response that means the credentials were rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_failure_marker: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where synchronized files end up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DestinationConfig {
    Local {
        path: PathBuf,
    },
    Remote {
        base_path: String,
        #[serde(default)]
        token: String,
        #[serde(default = "default_chunk_size")]
        chunk_size: u64,
    },
}

/// Knobs of the crawl-and-sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: f64,
    /// Folder label the portal injects at one depth; elided from local paths.
    #[serde(default = "default_passthrough_label")]
    pub passthrough_label: String,
    /// Record skipped and already-synced items in the changelog too.
    #[serde(default)]
    pub log_all: bool,
    /// Flush the ledger to the store after this many recorded items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_every: Option<usize>,
    /// Directory for the ledger working copy (default: OS temp dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            passthrough_label: DEFAULT_PASSTHROUGH_LABEL.to_string(),
            log_all: false,
            checkpoint_every: None,
            work_dir: None,
        }
    }
}

/// Mail summary after runs with new downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default = "default_sendmail")]
    pub sendmail: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            to: None,
            from: None,
            sendmail: default_sendmail(),
        }
    }
}

impl DestinationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DestinationConfig::Local { path } if path.as_os_str().is_empty() => {
                Err(ConfigError::Invalid("destination.path is empty".to_string()))
            }
            DestinationConfig::Remote { chunk_size: 0, .. } => Err(ConfigError::Invalid(
                "destination.chunk_size must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> f64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_passthrough_label() -> String {
    DEFAULT_PASSTHROUGH_LABEL.to_string()
}

fn default_sendmail() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}

impl Config {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.root_url.trim().is_empty() {
            return Err(ConfigError::Invalid("source.root_url is empty".to_string()));
        }
        if !(self.sync.max_file_size > 0.0) {
            return Err(ConfigError::Invalid(
                "sync.max_file_size must be positive".to_string(),
            ));
        }
        if self.sync.checkpoint_every == Some(0) {
            return Err(ConfigError::Invalid(
                "sync.checkpoint_every must be at least 1".to_string(),
            ));
        }
        for destination in std::iter::once(&self.destination).chain(&self.alternate_destination) {
            destination.validate()?;
        }
        self.course_matcher()?;
        Ok(())
    }

    /// Destination for one run: the primary one, or with `remote` set the
    /// first configured remote destination.
    pub fn select_destination(&self, remote: bool) -> Result<&DestinationConfig, ConfigError> {
        if !remote {
            return Ok(&self.destination);
        }
        std::iter::once(&self.destination)
            .chain(&self.alternate_destination)
            .find(|d| matches!(d, DestinationConfig::Remote { .. }))
            .ok_or_else(|| ConfigError::Invalid("no remote destination configured".to_string()))
    }

    /// Compile the course allow-list.
    pub fn course_matcher(&self) -> Result<CourseMatcher, ConfigError> {
        CourseMatcher::compile(&self.courses)
    }

    /// Fill secrets from the environment when present (`SLIDER_PASSWORD`,
    /// `SLIDER_REMOTE_TOKEN`).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.source.password = password;
        }
        let token_override = lookup(REMOTE_TOKEN_ENV).filter(|v| !v.is_empty());
        let destinations = std::iter::once(&mut self.destination).chain(&mut self.alternate_destination);
        for destination in destinations {
            if let (DestinationConfig::Remote { token, .. }, Some(value)) = (destination, &token_override) {
                *token = value.clone();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.slider/`, pure, no I/O.
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".slider")
}

/// `<home>/.slider/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.slider/config.yaml`, applying environment
/// overrides.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut config: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.apply_overrides_from(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save `config` to `<home>/.slider/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(config)?;
    write_config(home, &yaml)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

fn write_config(home: &Path, contents: &str) -> Result<(), ConfigError> {
    let dir = config_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");
    std::fs::write(&tmp_path, contents)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Commented starter config written by `slider init`.
pub const CONFIG_TEMPLATE: &str = r#"# slider configuration
version: 1

# Portal credentials. SLIDER_PASSWORD overrides `password` when set.
source:
  root_url: https://portal.example.org/api/tree
  login_url: https://portal.example.org/login
  username: ''
  password: ''
  # Text in the login response meaning the credentials were rejected.
  auth_failure_marker: Anmeldedaten wurden nicht akzeptiert
  timeout_secs: 180

# Which top-level courses to crawl (regular expressions, tried in order).
courses: []
#  - Statistik
#  - pattern: '^Algorithmen'
#    folder: Algorithms

# Local folder (e.g. inside a sync client folder) ...
destination:
  kind: local
  path: ''
# Optional remote object store, used by `slider sync --remote`.
# SLIDER_REMOTE_TOKEN overrides `token`.
#alternate_destination:
#  kind: remote
#  base_path: /uni
#  token: ''

sync:
  max_file_size: 5.0e7
  passthrough_label: Files
  log_all: false

notify:
  enabled: false
"#;

/// Write [`CONFIG_TEMPLATE`] to `<home>/.slider/config.yaml`.
///
/// Refuses to overwrite an existing config unless `force` is set.
pub fn init_at(home: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(home);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path });
    }
    write_config(home, CONFIG_TEMPLATE)?;
    Ok(path)
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<PathBuf, ConfigError> {
    init_at(&home()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
