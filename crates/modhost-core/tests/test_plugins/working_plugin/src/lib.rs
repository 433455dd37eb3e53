use std::sync::Mutex;

use modhost_core::event::{Delivery, EventReceiver};
use modhost_core::module_system::{Module, ModuleContext, ModuleError, ModuleResult, ModuleType, Processor};

#[derive(Default)]
pub struct FooModule {
    events: Mutex<Vec<String>>,
}

impl Module for FooModule {
    fn name(&self) -> &str {
        "Foo"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
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
        match input {
            "events" => Ok(Some(self.events.lock().map(|e| e.join(",")).unwrap_or_default())),
            "panic" => panic!("native module exploded"),
            "fail" => Err(ModuleError::msg("refused on purpose")),
            // Escaped so control bytes in the input stay visible in the answer
            other => Ok(Some(format!("native:{}", other.escape_default()))),
        }
    }
}

impl EventReceiver for FooModule {
    fn on_named_event(&self, name: &str) -> ModuleResult<Delivery> {
        if let Ok(mut events) = self.events.lock() {
            events.push(name.to_string());
        }
        Ok(Delivery::Handled)
    }
}

impl ModuleType for FooModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

modhost_core::export_modules!(FooModule);
