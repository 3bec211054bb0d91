//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. config.kdl (`$BUNDLEVER_CONFIG_DIR` or `~/.config/bundlever/`)
//! 3. Built-in defaults

use std::fs;
use std::path::PathBuf;

use kdl::KdlDocument;
use serde::Serialize;
use tracing::debug;

use crate::config::{BundleverConfig, OutputFormat};
use crate::{Error, Result};

/// Environment variable that relocates the config directory.
pub const CONFIG_DIR_ENV: &str = "BUNDLEVER_CONFIG_DIR";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// Value from CLI flag
    #[serde(rename = "cli")]
    CliFlag,
    /// Value from config.kdl
    #[serde(rename = "config")]
    ConfigFile,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    /// Path of config.kdl, if one could be located
    pub path: Option<PathBuf>,
    pub backup: Resolved<bool>,
    pub output_format: Resolved<OutputFormat>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            path: None,
            backup: Resolved::new(false, ValueSource::Default),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    pub fn backup(&self) -> bool {
        self.backup.value
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    /// The effective values as a config document.
    pub fn effective(&self) -> BundleverConfig {
        BundleverConfig {
            backup: Some(self.backup()),
            output_format: Some(self.output_format()),
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backup: Option<bool>,
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Location of config.kdl.
pub fn config_path() -> Option<PathBuf> {
    let dir = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()?.join("bundlever"),
    };
    Some(dir.join("config.kdl"))
}

/// Read config.kdl, returning an empty config if it does not exist.
pub fn load_config_file(path: &std::path::Path) -> Result<BundleverConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file");
            return Ok(BundleverConfig::default());
        }
        Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
    };
    let doc: KdlDocument = text
        .parse()
        .map_err(|e: kdl::KdlError| Error::Config(format!("{}: {}", path.display(), e)))?;
    BundleverConfig::from_kdl(&doc).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Resolve configuration with full precedence chain.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let path = config_path();
    let file_config = match &path {
        Some(path) => load_config_file(path)?,
        None => BundleverConfig::default(),
    };
    Ok(resolve_with(path, &file_config, overrides))
}

fn resolve_with(
    path: Option<PathBuf>,
    file_config: &BundleverConfig,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let mut result = ResolvedConfig {
        path,
        ..ResolvedConfig::default()
    };

    if let Some(backup) = overrides.backup {
        result.backup = Resolved::new(backup, ValueSource::CliFlag);
    } else if let Some(backup) = file_config.backup {
        result.backup = Resolved::new(backup, ValueSource::ConfigFile);
    }

    if let Some(format) = overrides.output_format {
        result.output_format = Resolved::new(format, ValueSource::CliFlag);
    } else if let Some(format) = file_config.output_format {
        result.output_format = Resolved::new(format, ValueSource::ConfigFile);
    }

    result
}
