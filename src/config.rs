use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::GoldError;

pub const DEFAULT_CONFIG_FILE: &str = "clams-utils.json";
pub const DEFAULT_REMOTE_BASE: &str = "https://github.com/clamsproject/aapb-annotations/tree/main";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// On-disk shape of `clams-utils.json`. Every key is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache_root: Option<String>,
    #[serde(default)]
    pub remote_base: Option<String>,
    #[serde(default)]
    pub raw_base: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cache_root: Option<Utf8PathBuf>,
    pub remote_base: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Directory under which each dataset gets its own subdirectory.
    pub cache_root: Utf8PathBuf,
    /// GitHub tree URL of the annotation repository at a given ref.
    pub remote_base: String,
    pub raw_base: String,
    pub timeout_secs: u64,
    /// Bypass the local cache.
    pub force: bool,
}

impl RetrieverConfig {
    pub fn new(cache_root: Utf8PathBuf) -> Self {
        Self {
            cache_root,
            remote_base: DEFAULT_REMOTE_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            force: false,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file (explicit path, or `clams-utils.json` in the
    /// working directory if present) and applies overrides on top.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<RetrieverConfig, GoldError> {
        let config = match path {
            Some(path) => Self::read(Path::new(path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<RetrieverConfig, GoldError> {
        let cache_root = match (overrides.cache_root, config.cache_root) {
            (Some(root), _) => root,
            (None, Some(root)) => Utf8PathBuf::from(root),
            (None, None) => default_cache_root()?,
        };

        Ok(RetrieverConfig {
            cache_root,
            remote_base: overrides
                .remote_base
                .or(config.remote_base)
                .unwrap_or_else(|| DEFAULT_REMOTE_BASE.to_string()),
            raw_base: config
                .raw_base
                .unwrap_or_else(|| DEFAULT_RAW_BASE.to_string()),
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            force: overrides.force,
        })
    }

    fn read(path: &Path) -> Result<Config, GoldError> {
        let content = fs::read_to_string(path)
            .map_err(|_| GoldError::ConfigRead(path.display().to_string()))?;
        serde_json::from_str(&content).map_err(|err| GoldError::ConfigParse(err.to_string()))
    }
}

pub fn default_cache_root() -> Result<Utf8PathBuf, GoldError> {
    BaseDirs::new()
        .and_then(|dirs| {
            let root = dirs.home_dir().join(".cache").join("clams-utils").join("golds");
            Utf8PathBuf::from_path_buf(root).ok()
        })
        .ok_or_else(|| GoldError::Filesystem("unable to resolve cache directory".to_string()))
}
