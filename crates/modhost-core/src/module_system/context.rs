//! The handle a module receives in [`Module::initialize`](crate::module_system::Module::initialize).
//!
//! In-process modules get the [`ModuleManager`] itself and may reach it
//! through [`ModuleContext::manager`]. Modules living in a native library get
//! a proxy over the host's callback table instead, so no host type ever
//! crosses the library boundary.
use crate::module_system::manager::ModuleManager;

/// Sibling lookup and dispatch available to a module while it initializes
pub trait ModuleContext {
    fn module_count(&self) -> usize;

    /// Declared names in registration order
    fn all_names(&self) -> Vec<String>;

    /// Whether a module answers to `name` (declared or type name)
    fn has_module(&self, name: &str) -> bool;

    /// Same contract as [`ModuleManager::invoke_by_name`]
    fn invoke_by_name(&self, name: &str, input: &str) -> Option<String>;

    /// The in-process manager; `None` across the native boundary
    fn manager(&self) -> Option<&ModuleManager> {
        None
    }
}

impl ModuleContext for ModuleManager {
    fn module_count(&self) -> usize {
        ModuleManager::module_count(self)
    }

    fn all_names(&self) -> Vec<String> {
        ModuleManager::all_names(self)
    }

    fn has_module(&self, name: &str) -> bool {
        self.get_instance_by_name(name).is_some()
    }

    fn invoke_by_name(&self, name: &str, input: &str) -> Option<String> {
        ModuleManager::invoke_by_name(self, name, input)
    }

    fn manager(&self) -> Option<&ModuleManager> {
        Some(self)
    }
}
