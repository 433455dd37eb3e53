use log::debug;
use serde::{Deserialize, Serialize};

use crate::kernel::constants::DIAG_TARGET;
use crate::module_system::manager::ModuleManager;
use crate::utils::names_match;

/// Runtime controls for one module, matched by name case-insensitively.
/// Unset fields leave the wrapper as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSetting {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ModuleSetting {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

impl ModuleManager {
    /// Applies `settings` to every registered module whose name matches.
    /// Returns how many settings matched a module; the rest are ignored.
    pub fn apply_settings(&self, settings: &[ModuleSetting]) -> usize {
        let diagnostics = self.debug_logging();
        let modules = self.modules();
        let mut applied = 0;
        for setting in settings {
            let Some(wrapper) = modules.iter().find(|w| names_match(w.name(), &setting.name)) else {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "No module matches setting for '{}'", setting.name);
                }
                continue;
            };
            if let Some(enabled) = setting.enabled {
                wrapper.set_enabled(enabled);
            }
            if let Some(timeout_ms) = setting.timeout_ms {
                wrapper.set_timeout_ms(timeout_ms);
            }
            if diagnostics {
                debug!(
                    target: DIAG_TARGET,
                    "Settings applied to {}: enabled={} timeout_ms={}",
                    wrapper.name(),
                    wrapper.is_enabled(),
                    wrapper.timeout_ms()
                );
            }
            applied += 1;
        }
        applied
    }

    /// Current controls of every module, suitable for persisting and feeding
    /// back to [`apply_settings`](Self::apply_settings).
    pub fn module_settings(&self) -> Vec<ModuleSetting> {
        self.views()
            .into_iter()
            .map(|v| ModuleSetting {
                name: v.name,
                enabled: Some(v.enabled),
                timeout_ms: Some(v.timeout_ms),
            })
            .collect()
    }
}
