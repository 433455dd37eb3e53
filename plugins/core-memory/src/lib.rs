//! # Core Memory Module
//!
//! The bootstrap module every host loads first. It keeps an in-process
//! key/value store that later modules read through the `MemoryReady` payload
//! or [`ModuleManager::with_module`](modhost_core::ModuleManager::with_module).
//!
//! Linked statically through [`candidates`], or dropped into a `Modules`
//! folder as a native binary (the crate also builds as a `cdylib`).
use std::collections::BTreeMap;
use std::sync::RwLock;

use log::{debug, info};
use modhost_core::event::{Delivery, EventReceiver, WAKE};
use modhost_core::kernel::constants::{CORE_CATEGORY, MEMORY_MODULE_NAME};
use modhost_core::module_system::{
    Module, ModuleCandidate, ModuleContext, ModuleError, ModuleResult, ModuleType, Processor, WakeLatch,
};

/// Shared key/value state, initialized before any other module
#[derive(Default)]
pub struct MemoryModule {
    store: RwLock<BTreeMap<String, String>>,
    latch: WakeLatch,
}

impl MemoryModule {
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.store
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.store.write().unwrap_or_else(|e| e.into_inner()).remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.store.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_awake(&self) -> bool {
        self.latch.is_awake()
    }

    /// Runs one text command: `set <key> <value>`, `get <key>`, `del <key>`,
    /// `keys` or `dump` (JSON object).
    fn run_command(&self, input: &str) -> ModuleResult<Option<String>> {
        let input = input.trim();
        let (command, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        let rest = rest.trim();
        match command.to_ascii_lowercase().as_str() {
            "set" => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| ModuleError::msg("usage: set <key> <value>"))?;
                self.set(key, value.trim());
                Ok(Some("ok".to_string()))
            }
            "get" if !rest.is_empty() => Ok(self.get(rest)),
            "del" if !rest.is_empty() => Ok(self.remove(rest).map(|_| "ok".to_string())),
            "keys" => Ok(Some(self.keys().join(","))),
            "dump" => serde_json::to_string(&self.snapshot())
                .map(Some)
                .map_err(|e| ModuleError::Other(Box::new(e))),
            "" => Ok(None),
            other => Err(ModuleError::Unsupported(format!("command '{}'", other))),
        }
    }
}

impl Module for MemoryModule {
    fn name(&self) -> &str {
        MEMORY_MODULE_NAME
    }

    fn initialize(&self, ctx: &dyn ModuleContext) -> ModuleResult<()> {
        info!("Memory module ready ({} modules registered)", ctx.module_count());
        Ok(())
    }

    fn dispose(&self) -> ModuleResult<()> {
        self.store.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.latch.reset();
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl Processor for MemoryModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        self.run_command(input)
    }
}

impl EventReceiver for MemoryModule {
    fn on_named_event(&self, name: &str) -> ModuleResult<Delivery> {
        if !name.eq_ignore_ascii_case(WAKE) {
            return Ok(Delivery::Unhandled);
        }
        if self.latch.wake() {
            debug!("Memory module awake with {} keys", self.keys().len());
        }
        Ok(Delivery::Handled)
    }
}

impl ModuleType for MemoryModule {
    const CATEGORY: &'static str = CORE_CATEGORY;

    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

/// Candidates for static registration with
/// [`ModuleManager::register_static_catalog`](modhost_core::ModuleManager::register_static_catalog)
pub fn candidates() -> Vec<ModuleCandidate> {
    vec![ModuleCandidate::of::<MemoryModule>()]
}

modhost_core::export_modules!(MemoryModule);

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_core::module_system::ModuleManager;

    #[test]
    fn test_text_commands() {
        let memory = MemoryModule::default();
        assert_eq!(memory.process("set greeting hello world").unwrap().as_deref(), Some("ok"));
        assert_eq!(memory.process("get greeting").unwrap().as_deref(), Some("hello world"));
        assert_eq!(memory.process("set other 1").unwrap().as_deref(), Some("ok"));
        assert_eq!(memory.process("keys").unwrap().as_deref(), Some("greeting,other"));
        assert_eq!(
            memory.process("dump").unwrap().as_deref(),
            Some(r#"{"greeting":"hello world","other":"1"}"#)
        );
        assert_eq!(memory.process("DEL other").unwrap().as_deref(), Some("ok"));
        assert_eq!(memory.process("get other").unwrap(), None);
        assert_eq!(memory.process("   ").unwrap(), None);
    }

    #[test]
    fn test_bad_commands_are_errors() {
        let memory = MemoryModule::default();
        assert!(memory.process("set lonely").is_err());
        assert!(matches!(memory.process("explode"), Err(ModuleError::Unsupported(_))));
    }

    #[test]
    fn test_wake_once_and_dispose_resets() {
        let memory = MemoryModule::default();
        assert_eq!(memory.on_named_event("SystemBoot").unwrap(), Delivery::Unhandled);
        assert_eq!(memory.on_named_event("Wake").unwrap(), Delivery::Handled);
        assert!(memory.is_awake());

        memory.set("k", "v");
        memory.dispose().unwrap();
        assert!(!memory.is_awake());
        assert!(memory.keys().is_empty());
    }

    #[test]
    fn test_boots_first_through_manager() {
        let manager = ModuleManager::new();
        manager.register_static_catalog("core_memory", candidates());
        let result = manager.load_modules(true);

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.loaded_names(), vec!["Memory"]);
        assert_eq!(manager.core_modules().len(), 1);
        manager.invoke_by_name("memory", "set answer 42");
        let answer = manager.with_module::<MemoryModule, _>("Memory", |m| m.get("answer"));
        assert_eq!(answer.flatten().as_deref(), Some("42"));
    }
}
