//! # Modhost Core
//!
//! Runtime for independently compiled modules: discovery under search roots,
//! native library loading, ordered boot, capability-probing dispatch and a
//! broadcast event bus. The binary in `crates/modhost` and every module crate
//! depend on this library.
pub mod config;
pub mod environment;
pub mod event;
pub mod kernel;
pub mod module_system;
pub mod utils;

// Re-export key public types/traits for easier use by the binary and modules
pub use config::RuntimeConfig;
pub use event::{Delivery, EventEnvelope, EventReceiver, Payload};
pub use kernel::error::Error as KernelError;
pub use kernel::{BootReport, Host};
pub use module_system::{
    LastResponseProvider, LoadResult, Module, ModuleCandidate, ModuleContext, ModuleError, ModuleManager, ModuleResult,
    ModuleSetting, ModuleType, ModuleView, ModuleWrapper, Processor, Toggleable, WakeLatch,
};
