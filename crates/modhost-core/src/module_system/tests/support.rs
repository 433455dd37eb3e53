#![cfg(test)]

// Small modules shared by the module system tests

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::event::{Delivery, EventReceiver, WAKE};
use crate::module_system::candidate::ModuleCandidate;
use crate::module_system::error::{ModuleError, ModuleResult};
use crate::module_system::context::ModuleContext;
use crate::module_system::manager::ModuleManager;
use crate::module_system::traits::{LastResponseProvider, Module, ModuleType, Processor, Toggleable, WakeLatch};
use crate::module_system::wrapper::{ModuleOrigin, ModuleWrapper};

/// Answers `foo:<input>`, records every event it sees and wakes once
#[derive(Default)]
pub struct FooModule {
    pub events: Mutex<Vec<String>>,
    pub wake_count: AtomicUsize,
    pub latch: WakeLatch,
    pub siblings_at_init: Mutex<Vec<String>>,
}

impl FooModule {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Module for FooModule {
    fn name(&self) -> &str {
        "Foo"
    }

    fn initialize(&self, ctx: &dyn ModuleContext) -> ModuleResult<()> {
        *self.siblings_at_init.lock().unwrap() = ctx.all_names();
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl Processor for FooModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        Ok(Some(format!("foo:{}", input)))
    }
}

impl EventReceiver for FooModule {
    fn on_named_event(&self, name: &str) -> ModuleResult<Delivery> {
        self.events.lock().unwrap().push(name.to_string());
        if name.eq_ignore_ascii_case(WAKE) && self.latch.wake() {
            self.wake_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Delivery::Handled)
    }
}

impl ModuleType for FooModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

/// Bootstrap module; listens for nothing and answers nothing
#[derive(Default)]
pub struct MemoryModule;

impl Module for MemoryModule {
    fn name(&self) -> &str {
        "Memory"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}

impl ModuleType for MemoryModule {
    const CATEGORY: &'static str = "core";

    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

pub struct FailingCtorModule;

impl Module for FailingCtorModule {
    fn name(&self) -> &str {
        "FailingCtor"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}

impl ModuleType for FailingCtorModule {
    fn construct() -> ModuleResult<Self> {
        Err(ModuleError::msg("constructor refused"))
    }
}

pub struct PanickingCtorModule;

impl Module for PanickingCtorModule {
    fn name(&self) -> &str {
        "PanickingCtor"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}

impl ModuleType for PanickingCtorModule {
    fn construct() -> ModuleResult<Self> {
        panic!("constructor exploded")
    }
}

/// Fails to initialize but still answers dispatch
pub struct FailingInitModule;

impl Module for FailingInitModule {
    fn name(&self) -> &str {
        "FailingInit"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Err(ModuleError::msg("init refused"))
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }
}

impl Processor for FailingInitModule {
    fn process(&self, _input: &str) -> ModuleResult<Option<String>> {
        Ok(Some("still here".to_string()))
    }
}

impl ModuleType for FailingInitModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self)
    }
}

/// `error` returns an error, `panic` panics, anything else is echoed
pub struct ThrowingModule;

impl Module for ThrowingModule {
    fn name(&self) -> &str {
        "Thrower"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }
}

impl Processor for ThrowingModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        match input {
            "error" => Err(ModuleError::msg("bad input")),
            "panic" => panic!("process exploded"),
            other => Ok(Some(other.to_string())),
        }
    }
}

impl ModuleType for ThrowingModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self)
    }
}

/// No entry point, only a memoized last response
pub struct LastOnlyModule;

impl Module for LastOnlyModule {
    fn name(&self) -> &str {
        "LastOnly"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn as_last_response(&self) -> Option<&dyn LastResponseProvider> {
        Some(self)
    }
}

impl LastResponseProvider for LastOnlyModule {
    fn last_response(&self) -> Option<String> {
        Some("remembered".to_string())
    }
}

/// Has an entry point that never answers, plus a stale last response
pub struct SilentModule;

impl Module for SilentModule {
    fn name(&self) -> &str {
        "Silent"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }

    fn as_last_response(&self) -> Option<&dyn LastResponseProvider> {
        Some(self)
    }
}

impl Processor for SilentModule {
    fn process(&self, _input: &str) -> ModuleResult<Option<String>> {
        Ok(Some(String::new()))
    }
}

impl LastResponseProvider for SilentModule {
    fn last_response(&self) -> Option<String> {
        Some("stale".to_string())
    }
}

/// Sleeps for the number of milliseconds given as input
pub struct SlowModule;

impl Module for SlowModule {
    fn name(&self) -> &str {
        "Slow"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }
}

impl Processor for SlowModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        let ms: u64 = input.parse().map_err(|_| ModuleError::msg("expected milliseconds"))?;
        std::thread::sleep(Duration::from_millis(ms));
        Ok(Some(format!("slept {}", ms)))
    }
}

impl ModuleType for SlowModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self)
    }
}

/// Declares no name; the registry falls back to the type name
pub struct AnonymousModule;

impl Module for AnonymousModule {
    fn name(&self) -> &str {
        ""
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}

impl ModuleType for AnonymousModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self)
    }
}

/// Binds to the provider wrapper delivered with a readiness signal
#[derive(Default)]
pub struct TypedListener {
    pub bound_to: Mutex<Option<String>>,
    pub failures: AtomicUsize,
}

impl Module for TypedListener {
    fn name(&self) -> &str {
        "Listener"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl EventReceiver for TypedListener {
    fn on_typed(&self, _name: &str, payload: &dyn Any) -> ModuleResult<Delivery> {
        match payload.downcast_ref::<ModuleWrapper>() {
            Some(wrapper) => {
                *self.bound_to.lock().unwrap() = Some(wrapper.name().to_string());
                Ok(Delivery::Handled)
            }
            None => Ok(Delivery::Unhandled),
        }
    }
}

impl ModuleType for TypedListener {
    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

/// Counts enable/disable hook calls; disposing fails
#[derive(Default)]
pub struct ToggleModule {
    pub enabled_calls: AtomicUsize,
    pub disabled_calls: AtomicUsize,
}

impl Module for ToggleModule {
    fn name(&self) -> &str {
        "Toggle"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn dispose(&self) -> ModuleResult<()> {
        Err(ModuleError::msg("dispose refused"))
    }

    fn as_toggleable(&self) -> Option<&dyn Toggleable> {
        Some(self)
    }
}

impl Toggleable for ToggleModule {
    fn on_enable(&self) -> ModuleResult<()> {
        self.enabled_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_disable(&self) -> ModuleResult<()> {
        self.disabled_calls.fetch_add(1, Ordering::SeqCst);
        Err(ModuleError::msg("hook failures are swallowed"))
    }
}

/// Records the order in which modules are disposed
pub struct DisposeRecorder {
    pub label: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Module for DisposeRecorder {
    fn name(&self) -> &str {
        self.label
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }

    fn dispose(&self) -> ModuleResult<()> {
        self.log.lock().unwrap().push(self.label.to_string());
        Ok(())
    }
}

/// Both declare `Shared`; each answers with the catalog it was meant for
pub struct SharedFirst;
pub struct SharedSecond;

macro_rules! shared_module {
    ($ty:ident, $answer:literal) => {
        impl Module for $ty {
            fn name(&self) -> &str {
                "Shared"
            }

            fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
                Ok(())
            }

            fn as_processor(&self) -> Option<&dyn Processor> {
                Some(self)
            }
        }

        impl Processor for $ty {
            fn process(&self, _input: &str) -> ModuleResult<Option<String>> {
                Ok(Some($answer.to_string()))
            }
        }

        impl ModuleType for $ty {
            fn construct() -> ModuleResult<Self> {
                Ok(Self)
            }
        }
    };
}

shared_module!(SharedFirst, "first");
shared_module!(SharedSecond, "second");

/// A named module with no capabilities, built directly into a wrapper
pub struct Named(pub &'static str);

impl Module for Named {
    fn name(&self) -> &str {
        self.0
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}

pub fn wrap(module: impl Module + 'static, category: &str) -> Arc<ModuleWrapper> {
    Arc::new(ModuleWrapper::new(
        Box::new(module),
        ModuleOrigin {
            type_name: String::new(),
            category: category.to_string(),
            binary: String::new(),
        },
    ))
}

/// Manager with one static catalog already registered
pub fn manager_with(candidates: Vec<ModuleCandidate>) -> ModuleManager {
    let manager = ModuleManager::new();
    assert!(manager.register_static_catalog("host", candidates));
    manager
}
