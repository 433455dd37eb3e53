use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::event::{Payload, WAKE};
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::module_system::candidate::ModuleCandidate;
use crate::module_system::manager::{LoadResult, ModuleManager};

/// Outcome of one readiness signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalReport {
    pub event: String,
    pub provider: String,
    /// `false` when the provider module is not registered; the signal is then skipped
    pub raised: bool,
    pub handled: usize,
}

/// Everything one boot (or reboot) produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootReport {
    pub load: LoadResult,
    pub settings_applied: usize,
    pub readiness: Vec<SignalReport>,
    pub wake_handled: usize,
}

/// Drives the boot sequence of a [`ModuleManager`] from a [`RuntimeConfig`]:
/// search roots, load, settings, readiness signals, then `Wake`.
pub struct Host {
    config: RuntimeConfig,
    manager: Arc<ModuleManager>,
    booted: bool,
}

impl Host {
    /// Builds a manager configured from `config`. Nothing is loaded yet.
    pub fn new(config: RuntimeConfig) -> Self {
        let manager = ModuleManager::with_modules_dir(config.modules_dir.clone());
        manager.set_debug_logging(config.debug_logging);
        manager.set_namespace_prefix(config.namespace_prefix.clone());
        manager.set_boot_priority(config.boot_priority.iter().cloned());
        manager.set_default_timeout_ms(config.default_timeout_ms);

        Self {
            config,
            manager: Arc::new(manager),
            booted: false,
        }
    }

    /// Reads the configuration file at `path`, then [`new`](Self::new)
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(Self::new(RuntimeConfig::load_from_path(path)?))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<ModuleManager> {
        &self.manager
    }

    pub fn is_booted(&self) -> bool {
        self.booted
    }

    /// Adds host-linked module types, picked up by the next boot or reboot
    pub fn register_static_catalog(&self, name: &str, candidates: Vec<ModuleCandidate>) -> bool {
        self.manager.register_static_catalog(name, candidates)
    }

    fn register_search_paths(&self) {
        if self.config.use_default_search_paths {
            self.manager.add_default_search_paths();
        }
        for path in &self.config.search_paths {
            if !self.manager.add_search_path(path) {
                log::debug!("Configured search path ignored: {}", path.display());
            }
        }
    }

    /// Runs the full boot sequence once
    pub fn boot(&mut self) -> Result<BootReport> {
        if self.booted {
            return Err(Error::Other("host is already booted".to_string()));
        }
        log::info!("Booting {} v{}", constants::APP_NAME, constants::APP_VERSION);
        self.register_search_paths();

        let load = self.manager.load_modules(self.config.require_marker);
        let report = self.after_load(load);
        self.booted = true;
        Ok(report)
    }

    /// Unloads everything and boots again. Search roots are kept.
    pub fn reboot(&mut self) -> BootReport {
        log::info!("Rebooting module runtime");
        let load = self.manager.reload_modules(self.config.require_marker);
        let report = self.after_load(load);
        self.booted = true;
        report
    }

    fn after_load(&self, load: LoadResult) -> BootReport {
        for error in &load.errors {
            log::warn!("{}", error);
        }
        let settings_applied = self.manager.apply_settings(&self.config.modules);
        let readiness = self.raise_readiness();
        let wake_handled = self.wake();
        log::info!(
            "Boot complete: {} modules loaded, {} errors",
            load.loaded.len(),
            load.errors.len()
        );
        BootReport {
            load,
            settings_applied,
            readiness,
            wake_handled,
        }
    }

    /// Raises each configured readiness signal with its provider module as
    /// payload. Signals whose provider is not registered are skipped.
    pub fn raise_readiness(&self) -> Vec<SignalReport> {
        self.config
            .readiness
            .iter()
            .map(|signal| {
                let Some(provider) = self.manager.get_instance_by_name(&signal.provider) else {
                    log::debug!("Readiness signal {} skipped: {} not loaded", signal.event, signal.provider);
                    return SignalReport {
                        event: signal.event.clone(),
                        provider: signal.provider.clone(),
                        raised: false,
                        handled: 0,
                    };
                };
                let payload: Payload = provider;
                let handled = self.manager.raise_system_event(&signal.event, Some(payload));
                SignalReport {
                    event: signal.event.clone(),
                    provider: signal.provider.clone(),
                    raised: true,
                    handled,
                }
            })
            .collect()
    }

    /// Raises `Wake`. Safe to repeat: modules honour wake once.
    pub fn wake(&self) -> usize {
        self.manager.raise_system_event(WAKE, None)
    }

    /// Unloads every module in reverse order
    pub fn shutdown(&mut self) {
        if !self.booted {
            return;
        }
        log::info!("Shutting down module runtime");
        self.manager.unload_all_modules();
        self.booted = false;
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("booted", &self.booted)
            .field("manager", &self.manager)
            .finish()
    }
}
