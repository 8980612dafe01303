//! Optional TOML configuration file.
//!
//! The file is read from `--config` when given, otherwise from the platform
//! configuration folder:
//! - Linux: ~/.config/medianalyze/config.toml
//! - macOS: ~/Library/Application Support/org.medianalyze.MediAnalyze-Pro/config.toml
//! - Windows: %APPDATA%/medianalyze/MediAnalyze Pro/config/config.toml
//!
//! Command-line flags always win over values from the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use medi_ingest::DEFAULT_SAMPLING_RATE;
use medi_model::{DEFAULT_BATCH_SIZE, DuplicatePolicy};

const APP_QUALIFIER: &str = "org";
const APP_ORG: &str = "medianalyze";
const APP_NAME: &str = "MediAnalyze Pro";
const CONFIG_FILENAME: &str = "config.toml";
const DATABASE_FILENAME: &str = "medianalyze.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub signal: SignalConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file; the platform data folder is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub duplicates: DuplicatePolicy,
    /// `,` `;` `|` or `tab`. Detected per file when unset.
    pub delimiter: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            duplicates: DuplicatePolicy::default(),
            delimiter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalConfig {
    /// Hz, for signal files without a usable time column.
    pub default_sampling_rate: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            default_sampling_rate: DEFAULT_SAMPLING_RATE,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
}

/// Default location of the configuration file.
///
/// Returns `None` if the platform-specific directory cannot be determined.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Database used when neither the flag nor the file names one.
pub fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DATABASE_FILENAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILENAME))
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("parse configuration")?;
        config.check()?;
        Ok(config)
    }

    /// Load `explicit`, or the default file when it exists, or the defaults.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read config file {}", path.display()))?;
            let config = Self::from_toml(&text)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            info!(path = %path.display(), "configuration loaded");
            return Ok(config);
        }
        let Some(path) = config_path() else {
            debug!("no platform config directory, using defaults");
            return Ok(Self::default());
        };
        match fs::read_to_string(&path) {
            Ok(text) => {
                let config = Self::from_toml(&text)
                    .with_context(|| format!("invalid config file {}", path.display()))?;
                info!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("read config file {}", path.display())),
        }
    }

    fn check(&self) -> Result<()> {
        if let Some(delimiter) = &self.import.delimiter {
            parse_delimiter(delimiter).context("import.delimiter")?;
        }
        let rate = self.signal.default_sampling_rate;
        if !(rate.is_finite() && rate > 0.0) {
            bail!("signal.default_sampling_rate must be positive, got {rate}");
        }
        Ok(())
    }

    /// The flag, else the configured path, else the platform default.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.path.clone())
            .unwrap_or_else(default_database_path)
    }

    /// Delimiter byte from the flag or the file; `None` means detect.
    pub fn delimiter(&self, flag: Option<&str>) -> Result<Option<u8>> {
        flag.or(self.import.delimiter.as_deref())
            .map(parse_delimiter)
            .transpose()
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value.trim_matches(|c: char| c == ' ') {
        "," | "comma" => Ok(b','),
        ";" | "semicolon" => Ok(b';'),
        "\t" | "\\t" | "tab" => Ok(b'\t'),
        "|" | "pipe" => Ok(b'|'),
        other => bail!("unsupported delimiter {other:?} (use , ; | or tab)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.import.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.signal.default_sampling_rate, DEFAULT_SAMPLING_RATE);
    }

    #[test]
    fn sections_are_read() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "/tmp/medi.db"

            [import]
            batch_size = 50
            duplicates = "update"
            delimiter = "tab"

            [signal]
            default_sampling_rate = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/medi.db")));
        assert_eq!(config.import.batch_size, 50);
        assert_eq!(config.import.duplicates, DuplicatePolicy::Update);
        assert_eq!(config.delimiter(None).unwrap(), Some(b'\t'));
        assert_eq!(config.signal.default_sampling_rate, 500.0);
    }

    #[test]
    fn flags_override_the_file() {
        let config = Config::from_toml("[database]\npath = \"from-file.db\"\n").unwrap();
        assert_eq!(
            config.database_path(Some(Path::new("flag.db"))),
            PathBuf::from("flag.db")
        );
        assert_eq!(config.database_path(None), PathBuf::from("from-file.db"));
        let config = Config::from_toml("[import]\ndelimiter = \";\"\n").unwrap();
        assert_eq!(config.delimiter(Some("|")).unwrap(), Some(b'|'));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml("[import]\ndelimiter = \"#\"\n").is_err());
        assert!(Config::from_toml("[signal]\ndefault_sampling_rate = 0\n").is_err());
        assert!(Config::from_toml("[unknown]\nkey = 1\n").is_err());
        assert!(Config::from_toml("[import]\nduplicates = \"maybe\"\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/medianalyze.toml"))).is_err());
    }
}
