//! # Modhost Kernel
//!
//! Process-level glue around the module runtime.
//!
//! - **Boot sequence**: [`Host`](bootstrap::Host) builds a
//!   [`ModuleManager`](crate::module_system::ModuleManager) from a
//!   [`RuntimeConfig`](crate::config::RuntimeConfig), registers the default
//!   search roots, loads modules and raises the readiness and wake signals.
//! - **Constants**: well-known names and defaults in the `constants` submodule.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result` alias.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{BootReport, Host};
pub use error::{Error, Result};
