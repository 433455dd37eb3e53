//! # Modhost Runtime Configuration
//!
//! [`RuntimeConfig`] collects everything the boot sequence needs: extra search
//! roots, discovery conventions, boot priority, the debug flag, readiness
//! signals, logging preferences and per-module settings. Every field has a
//! default, so an empty file (or no file) is a valid configuration.
//!
//! Files are JSON, or TOML / YAML when the `toml-config` / `yaml-config`
//! features are on; the format follows the file extension.
pub mod error;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::event::MEMORY_READY;
use crate::kernel::constants::{
    DEFAULT_BOOT_PRIORITY, DEFAULT_NAMESPACE_PREFIX, MEMORY_MODULE_NAME, MODULES_DIR_NAME,
};
use crate::module_system::settings::ModuleSetting;

pub use error::ConfigError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    fn label(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "JSON",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "YAML",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "TOML",
        }
    }
}

/// A readiness signal raised after `SystemBoot`, carrying the provider
/// module's wrapper as payload when that module is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSignal {
    pub event: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    /// `plain` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Register the install directory, the working directory and its
    /// modules folder before `search_paths`
    pub use_default_search_paths: bool,
    /// Extra roots registered after the defaults
    pub search_paths: Vec<PathBuf>,
    pub modules_dir: String,
    pub namespace_prefix: String,
    pub require_marker: bool,
    pub boot_priority: Vec<String>,
    pub debug_logging: bool,
    /// Invocation timeout given to every module, 0 for none
    pub default_timeout_ms: u64,
    pub readiness: Vec<ReadinessSignal>,
    pub logging: LoggingConfig,
    pub modules: Vec<ModuleSetting>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            use_default_search_paths: true,
            search_paths: Vec::new(),
            modules_dir: MODULES_DIR_NAME.to_string(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            require_marker: true,
            boot_priority: DEFAULT_BOOT_PRIORITY.iter().map(|s| s.to_string()).collect(),
            debug_logging: false,
            default_timeout_ms: 0,
            readiness: vec![ReadinessSignal {
                event: MEMORY_READY.to_string(),
                provider: MEMORY_MODULE_NAME.to_string(),
            }],
            logging: LoggingConfig::default(),
            modules: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_str(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            format: format.label(),
            message,
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        match format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        }
    }

    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        let serialize_error = |message: String| ConfigError::Serialize {
            format: format.label(),
            message,
        };
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| serialize_error(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| serialize_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| serialize_error(e.to_string())),
        }
    }

    /// Reads a configuration file, picking the format from its extension
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content, format)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let content = self.render(format)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
