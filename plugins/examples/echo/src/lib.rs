//! Example drop-in module. Build it and copy the library into any `Modules`
//! folder under a search root; the host picks it up on the next load.
use std::sync::Mutex;

use log::debug;
use modhost_core::event::{Delivery, EventReceiver, WAKE};
use modhost_core::module_system::{
    LastResponseProvider, Module, ModuleContext, ModuleResult, ModuleType, Processor, WakeLatch,
};

/// Echoes its input back and remembers the last answer
#[derive(Default)]
pub struct EchoModule {
    last: Mutex<Option<String>>,
    latch: WakeLatch,
}

impl Module for EchoModule {
    fn name(&self) -> &str {
        "Echo"
    }

    fn initialize(&self, ctx: &dyn ModuleContext) -> ModuleResult<()> {
        debug!("Echo initialized next to {:?}", ctx.all_names());
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }

    fn as_last_response(&self) -> Option<&dyn LastResponseProvider> {
        Some(self)
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl Processor for EchoModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        let answer = format!("echo: {}", input);
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(answer.clone());
        Ok(Some(answer))
    }
}

impl LastResponseProvider for EchoModule {
    fn last_response(&self) -> Option<String> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventReceiver for EchoModule {
    fn on_named_event(&self, name: &str) -> ModuleResult<Delivery> {
        if name.eq_ignore_ascii_case(WAKE) && self.latch.wake() {
            debug!("Echo is awake");
        }
        Ok(Delivery::Handled)
    }
}

impl ModuleType for EchoModule {
    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

modhost_core::export_modules!(requires = ["core_memory"]; EchoModule);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_remembers_last_answer() {
        let echo = EchoModule::default();
        assert_eq!(echo.last_response(), None);
        assert_eq!(echo.process("hi").unwrap().as_deref(), Some("echo: hi"));
        assert_eq!(echo.last_response().as_deref(), Some("echo: hi"));
    }
}
