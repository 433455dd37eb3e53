//! # Modhost Kernel Errors
//!
//! Defines [`Error`], the crate-wide error enum that wraps the typed errors of
//! each subsystem, plus the `Result` alias used by fallible host operations.
//!
//! Per-module failures during load, dispatch and event delivery never surface
//! here: they are recorded in a `LoadResult`, turned into a dispatch string or
//! logged. This type covers host-level failures such as unreadable
//! configuration or booting twice.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigError;
use crate::event::error::EventSystemError;
use crate::module_system::error::ModuleSystemError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed module system error
    #[error("Module system error: {0}")]
    ModuleSystem(#[from] ModuleSystemError),

    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
