use std::sync::Mutex;

use modhost_core::module_system::{Module, ModuleContext, ModuleResult, ModuleType, Processor};

/// Talks to its sibling `Foo` while initializing
#[derive(Default)]
pub struct ConsumerModule {
    sibling_answer: Mutex<Option<String>>,
    siblings: Mutex<Vec<String>>,
    context: Mutex<&'static str>,
}

impl Module for ConsumerModule {
    fn name(&self) -> &str {
        "Consumer"
    }

    fn initialize(&self, ctx: &dyn ModuleContext) -> ModuleResult<()> {
        log::info!(target: "consumer_plugin", "Consumer initialized next to {} modules", ctx.module_count());
        if !ctx.has_module("Foo") {
            return Err("Foo is not registered".into());
        }
        if let Ok(mut answer) = self.sibling_answer.lock() {
            *answer = ctx.invoke_by_name("Foo", "ping");
        }
        if let Ok(mut siblings) = self.siblings.lock() {
            *siblings = ctx.all_names();
        }
        if let Ok(mut context) = self.context.lock() {
            *context = if ctx.manager().is_some() { "in-process" } else { "native" };
        }
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }
}

impl Processor for ConsumerModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        let answer = match input {
            "sibling" => self.sibling_answer.lock().ok().and_then(|a| a.clone()),
            "siblings" => self.siblings.lock().ok().map(|s| s.join(",")),
            "context" => self.context.lock().ok().map(|c| c.to_string()),
            _ => None,
        };
        Ok(answer)
    }
}

impl ModuleType for ConsumerModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

modhost_core::export_modules!(requires = ["working_plugin"]; ConsumerModule);
