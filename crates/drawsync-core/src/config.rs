use serde::Deserialize;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorCode;
use crate::fetch::{
    Credential, DEFAULT_ATTEMPTS, DEFAULT_BASE_URL, DEFAULT_MULTIPLIER, DEFAULT_TIMEOUT, Fetcher,
    RemoteApi, RetryPolicy,
};
use crate::model::{InvalidSeriesId, MAX_KEEP, SeriesId, default_series};
use crate::reconcile::Reconciler;
use crate::store::{DEFAULT_LOCK_TIMEOUT, HistoryStore};

pub const TOKEN_ENV: &str = "LOT_TOKEN";
pub const BASE_URL_ENV: &str = "DRAWSYNC_BASE_URL";
pub const OUT_DIR_ENV: &str = "DRAWSYNC_OUT_DIR";
pub const PROJECT_CONFIG_FILE: &str = "drawsync.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{}: {var} is not set", ErrorCode::MissingCredential.code())]
    MissingCredential { var: &'static str },

    #[error("{}: failed to read {}: {source}", ErrorCode::ConfigParseError.code(), .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: failed to parse {}: {source}", ErrorCode::ConfigParseError.code(), .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}: {0}", ErrorCode::InvalidConfig.code())]
    Invalid(String),

    #[error(transparent)]
    InvalidSeries(#[from] InvalidSeriesId),
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingCredential { .. } => ErrorCode::MissingCredential,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Invalid(_) => ErrorCode::InvalidConfig,
            Self::InvalidSeries(err) => err.code(),
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_series_keys")]
    pub series: Vec<String>,
    #[serde(default = "default_max_keep")]
    pub max_keep: usize,
    #[serde(default)]
    pub keep_going: bool,
    /// How long to wait for another run holding a series lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            out_dir: default_out_dir(),
            series: default_series_keys(),
            max_keep: default_max_keep(),
            keep_going: false,
            lock_timeout_ms: default_lock_timeout_ms(),
            fetch: FetchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_series_keys() -> Vec<String> {
    default_series().iter().map(ToString::to_string).collect()
}

fn default_lock_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_LOCK_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

const fn default_max_keep() -> usize {
    MAX_KEEP
}

const fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// A config file that was found and parsed.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FileConfig,
    /// Where it came from; `None` when built-in defaults apply.
    pub source: Option<PathBuf>,
}

/// Load the project file, else the user file, else defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the first
/// existing file cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<LoadedConfig, ConfigError> {
    let user_path = dirs::config_dir().map(|dir| dir.join("drawsync/config.toml"));
    load_config_from(&project_root.join(PROJECT_CONFIG_FILE), user_path.as_deref())
}

fn load_config_from(project: &Path, user: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    for path in std::iter::once(project).chain(user) {
        if path.exists() {
            return Ok(LoadedConfig {
                config: read_config_file(path)?,
                source: Some(path.to_path_buf()),
            });
        }
    }

    Ok(LoadedConfig {
        config: FileConfig::default(),
        source: None,
    })
}

fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<FileConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Resolve the API credential from `--token` or the environment.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredential`] when neither is set to a
/// non-blank value.
pub fn resolve_credential(explicit: Option<&str>) -> Result<Credential, ConfigError> {
    resolve_credential_inner(explicit, env::var(TOKEN_ENV).ok())
}

fn resolve_credential_inner(
    explicit: Option<&str>,
    env_value: Option<String>,
) -> Result<Credential, ConfigError> {
    explicit
        .and_then(Credential::new)
        .or_else(|| env_value.as_deref().and_then(Credential::new))
        .ok_or(ConfigError::MissingCredential { var: TOKEN_ENV })
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Values from the command line; `None` / empty leaves lower layers in
/// effect.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub series: Vec<String>,
    pub keep_going: bool,
}

/// Values from `DRAWSYNC_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub base_url: Option<String>,
    pub out_dir: Option<PathBuf>,
}

impl EnvOverrides {
    #[must_use]
    pub fn from_env() -> Self {
        let non_blank = |var: &str| env::var(var).ok().filter(|value| !value.trim().is_empty());
        Self {
            base_url: non_blank(BASE_URL_ENV),
            out_dir: non_blank(OUT_DIR_ENV).map(PathBuf::from),
        }
    }
}

/// Fully layered and validated settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub out_dir: PathBuf,
    pub series: Vec<SeriesId>,
    pub max_keep: usize,
    pub keep_going: bool,
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Settings {
    /// Layer command-line values over environment values over `file`.
    ///
    /// Relative `out_dir` values are kept relative to the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::InvalidSeries`]
    /// for values that cannot drive a run.
    pub fn resolve(
        file: FileConfig,
        env: EnvOverrides,
        cli: Overrides,
    ) -> Result<Self, ConfigError> {
        let base_url = cli.base_url.or(env.base_url).unwrap_or(file.base_url);
        let out_dir = cli.out_dir.or(env.out_dir).unwrap_or(file.out_dir);
        let series_keys = if cli.series.is_empty() {
            file.series
        } else {
            cli.series
        };

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got {base_url:?}"
            )));
        }
        if out_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("out_dir must not be empty".into()));
        }
        if series_keys.is_empty() {
            return Err(ConfigError::Invalid("no series configured".into()));
        }
        if file.max_keep == 0 {
            return Err(ConfigError::Invalid("max_keep must be at least 1".into()));
        }

        let fetch = file.fetch;
        if fetch.attempts == 0 {
            return Err(ConfigError::Invalid("fetch.attempts must be at least 1".into()));
        }
        if !fetch.multiplier.is_finite() || fetch.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "fetch.multiplier must be a finite number >= 1, got {}",
                fetch.multiplier
            )));
        }
        if fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be at least 1".into()));
        }

        let mut series = Vec::with_capacity(series_keys.len());
        for key in series_keys {
            let id = SeriesId::new(key)?;
            if !series.contains(&id) {
                series.push(id);
            }
        }

        Ok(Self {
            base_url,
            out_dir,
            series,
            max_keep: file.max_keep,
            keep_going: cli.keep_going || file.keep_going,
            lock_timeout: Duration::from_millis(file.lock_timeout_ms),
            retry: RetryPolicy {
                attempts: fetch.attempts,
                base_delay: Duration::from_millis(fetch.base_delay_ms),
                multiplier: fetch.multiplier,
            },
            timeout: Duration::from_secs(fetch.timeout_secs),
        })
    }

    #[must_use]
    pub fn store(&self) -> HistoryStore {
        HistoryStore::new(&self.out_dir)
    }

    /// A reconciler over the real HTTP transport.
    #[must_use]
    pub fn reconciler(&self, credential: Credential) -> Reconciler {
        Reconciler::new(
            RemoteApi::new(self.base_url.clone(), credential),
            Fetcher::http(self.timeout, self.retry),
            self.store(),
        )
        .with_max_keep(self.max_keep)
        .with_lock_timeout(self.lock_timeout)
    }
}
