use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format for '{}'", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to parse {format} configuration: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Failed to serialize {format} configuration: {message}")]
    Serialize { format: &'static str, message: String },
}
