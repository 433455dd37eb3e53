use modhost_core::module_system::{Module, ModuleContext, ModuleError, ModuleResult, ModuleType};

pub struct RefusingModule;

impl Module for RefusingModule {
    fn name(&self) -> &str {
        "Refusing"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        Ok(())
    }
}

impl ModuleType for RefusingModule {
    fn construct() -> ModuleResult<Self> {
        Err(ModuleError::msg("native constructor refused"))
    }
}

modhost_core::export_modules!(RefusingModule);
