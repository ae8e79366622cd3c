use crate::core::config::data::{path_display, Config};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at an alternate config file.
pub const CONFIG_PATH_ENV: &str = "RELAYCHAT_CONFIG";

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl Config {
    /// Loads configuration for this run: the file named on the command line,
    /// else the one in `RELAYCHAT_CONFIG`, else the platform default, with
    /// environment overrides applied on top.
    pub fn load(explicit_path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        {
            Some(path) => Self::read_from_path(&path)?,
            None => match Self::get_config_path() {
                Some(path) => Self::load_from_path(&path)?,
                None => Config::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Reads the file at `config_path`, returning defaults if it is absent.
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if config_path.exists() {
            Self::read_from_path(config_path)
        } else {
            debug!(path = %path_display(config_path), "No config file, using defaults");
            Ok(Config::default())
        }
    }

    fn read_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
        debug!(path = %path_display(config_path), "Loaded config file");
        Ok(config)
    }

    pub fn get_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "relaychat", "relaychat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
