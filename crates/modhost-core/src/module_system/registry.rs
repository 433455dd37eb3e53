use std::sync::Arc;

use crate::kernel::constants::CORE_CATEGORY;
use crate::module_system::wrapper::ModuleWrapper;
use crate::utils::names_match;

/// Ordered collection of module wrappers.
///
/// Order is registration order, with boot-priority modules already moved to
/// the front by the loader. Names are not forced unique: every lookup returns
/// the first match.
#[derive(Default)]
pub struct ModuleRegistry {
    wrappers: Vec<Arc<ModuleWrapper>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, wrapper: Arc<ModuleWrapper>) {
        self.wrappers.push(wrapper);
    }

    pub fn extend(&mut self, wrappers: impl IntoIterator<Item = Arc<ModuleWrapper>>) {
        self.wrappers.extend(wrappers);
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleWrapper>> {
        self.wrappers.iter()
    }

    pub fn snapshot(&self) -> Vec<Arc<ModuleWrapper>> {
        self.wrappers.clone()
    }

    /// Case-insensitive match on the declared name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<ModuleWrapper>> {
        if name.trim().is_empty() {
            return None;
        }
        self.wrappers
            .iter()
            .find(|w| names_match(w.declared_name(), name))
            .cloned()
    }

    /// Declared name first, then the concrete type name (simple or full)
    pub fn get_instance_by_name(&self, name: &str) -> Option<Arc<ModuleWrapper>> {
        if name.trim().is_empty() {
            return None;
        }
        self.get_by_name(name).or_else(|| {
            self.wrappers
                .iter()
                .find(|w| names_match(w.simple_type_name(), name) || names_match(w.type_name(), name))
                .cloned()
        })
    }

    /// Every non-empty declared name, in registration order
    pub fn all_names(&self) -> Vec<String> {
        self.wrappers
            .iter()
            .map(|w| w.declared_name())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn core_modules(&self) -> Vec<Arc<ModuleWrapper>> {
        self.wrappers
            .iter()
            .filter(|w| names_match(w.category(), CORE_CATEGORY))
            .cloned()
            .collect()
    }

    /// Removes the first wrapper matching `name` (declared name, then type name)
    pub fn remove(&mut self, name: &str) -> Option<Arc<ModuleWrapper>> {
        let target = self.get_instance_by_name(name)?;
        let pos = self.wrappers.iter().position(|w| Arc::ptr_eq(w, &target))?;
        Some(self.wrappers.remove(pos))
    }

    /// Empties the registry, returning wrappers in registration order
    pub fn drain(&mut self) -> Vec<Arc<ModuleWrapper>> {
        std::mem::take(&mut self.wrappers)
    }
}
