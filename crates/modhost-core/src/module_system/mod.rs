//! # Modhost Module System
//!
//! Discovers, loads, initializes, tracks, invokes and tears down modules whose
//! concrete types the host does not know ahead of time.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the capability contract ([`Module`]) and the optional
//!   capabilities dispatch and the event bus look for ([`Processor`],
//!   [`LastResponseProvider`], [`Toggleable`], plus
//!   [`EventReceiver`](crate::event::EventReceiver)).
//! - **[`context`]**: [`ModuleContext`], what a module sees of the runtime
//!   while it initializes.
//! - **[`wrapper`]**: [`ModuleWrapper`], the uniform handle owning one instance
//!   and its lifecycle state.
//! - **[`registry`]**: ordered, first-match-wins collection of wrappers.
//! - **[`loader`]** and **[`resolver`]**: search roots, native library loading,
//!   candidate enumeration and on-demand loading of required binaries.
//! - **[`candidate`]**: discovered types, the eligibility filter and boot priority.
//! - **[`dispatch`]**: `invoke_by_name` and friends, sync and async.
//! - **[`ffi`]** and **[`export`]**: the C ABI between host and module
//!   libraries, from both sides.
//! - **[`settings`]**: per-module runtime controls.
//! - **[`manager`]**: [`ModuleManager`], the runtime context tying it together.
pub mod candidate;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod ffi;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod traits;
pub mod wrapper;

pub use candidate::{ModuleCandidate, StaticConstructor, apply_boot_priority};
pub use context::ModuleContext;
pub use error::{ModuleError, ModuleResult, ModuleSystemError};
pub use export::{ExportEntry, ExportedCatalog};
pub use loader::ModuleLoader;
pub use manager::{DiscoverySettings, LoadResult, ModuleManager};
pub use registry::ModuleRegistry;
pub use settings::ModuleSetting;
pub use traits::{LastResponseProvider, Module, ModuleType, Processor, Toggleable, WakeLatch};
pub use wrapper::{ModuleOrigin, ModuleState, ModuleView, ModuleWrapper};

#[cfg(test)]
mod tests;
