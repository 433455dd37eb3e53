//! # Modhost Module System Errors
//!
//! [`ModuleSystemError`] describes what went wrong while loading a binary,
//! enumerating its catalog, constructing or initializing a module, or calling
//! across the native ABI. The loader renders these into `LoadResult.errors`.
//!
//! [`ModuleError`] is the error type module authors return from contract
//! methods ([`ModuleResult`]).
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ModuleSystemError {
    #[error("Failed to load module binary '{binary}' from '{}': {source}", path.display())]
    LoadingError {
        binary: String,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Module binary '{binary}' does not export the module catalog symbol: {source}")]
    MissingCatalog {
        binary: String,
        #[source]
        source: libloading::Error,
    },

    #[error("Module binary '{binary}' returned an invalid catalog: {message}")]
    InvalidCatalog {
        binary: String,
        message: String,
    },

    #[error("Module binary '{binary}' targets API {found}, host requires {required}")]
    IncompatibleApi {
        binary: String,
        found: String,
        required: String,
    },

    #[error("FFI error in module '{module}' during operation '{operation}': {message}")]
    FfiError {
        module: String,
        operation: String,
        message: String,
    },

    #[error("Failed to instantiate module {type_name}: {message}")]
    InstantiationError {
        type_name: String,
        message: String,
    },

    #[error("Failed to initialize module {type_name}: {message}")]
    InitializationError {
        type_name: String,
        message: String,
    },

    #[error("Failed to dispose module '{module}': {message}")]
    DisposeError {
        module: String,
        message: String,
    },

    #[error("Dependency '{dependency}' required by '{binary}' was not found under any search root")]
    UnresolvedDependency {
        binary: String,
        dependency: String,
    },

    #[error("Internal module system error: {0}")]
    InternalError(String),
}

/// Error returned by module code through the contract traits.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("{0}")]
    Message(String),

    #[error("{0} is not supported by this module")]
    Unsupported(String),

    /// Raised by the runtime, e.g. a native call that failed at the boundary
    #[error(transparent)]
    System(#[from] ModuleSystemError),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ModuleError {
    pub fn msg(message: impl Into<String>) -> Self {
        ModuleError::Message(message.into())
    }
}

impl From<&str> for ModuleError {
    fn from(msg: &str) -> Self {
        ModuleError::Message(msg.to_string())
    }
}

impl From<String> for ModuleError {
    fn from(msg: String) -> Self {
        ModuleError::Message(msg)
    }
}

/// Result alias for module contract methods
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;
