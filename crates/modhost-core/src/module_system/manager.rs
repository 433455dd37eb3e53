use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::environment::{self, EnvironmentReport, UpdateScan};
use crate::event::{self, EventEnvelope, Payload, SYSTEM_BOOT};
use crate::kernel::constants::{DEFAULT_BOOT_PRIORITY, DEFAULT_NAMESPACE_PREFIX, DIAG_TARGET, MODULES_DIR_NAME};
use crate::module_system::candidate::{ModuleCandidate, apply_boot_priority};
use crate::module_system::loader::ModuleLoader;
use crate::module_system::registry::ModuleRegistry;
use crate::module_system::traits::Module;
use crate::module_system::wrapper::{ModuleOrigin, ModuleView, ModuleWrapper};

/// Outcome of one load or reload cycle. Per-module failures are collected in
/// `errors`; they never abort the cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    /// Modules initialized during this cycle, in initialization order
    pub loaded: Vec<ModuleView>,
    pub errors: Vec<String>,
}

impl LoadResult {
    pub fn loaded_names(&self) -> Vec<&str> {
        self.loaded.iter().map(|v| v.name.as_str()).collect()
    }
}

/// Conventions applied when filtering and ordering candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub namespace_prefix: String,
    /// Type names (simple or full) instantiated and initialized first, in order
    pub boot_priority: Vec<String>,
    /// Timeout given to new wrappers, 0 for none
    pub default_timeout_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            boot_priority: DEFAULT_BOOT_PRIORITY.iter().map(|s| s.to_string()).collect(),
            default_timeout_ms: 0,
        }
    }
}

/// The module runtime context: search roots, loaded binaries, the registry
/// and the debug flag.
///
/// Load, reload and unload are serialized internally. Lookups, dispatch and
/// event broadcast only take the registry read lock long enough to clone the
/// wrappers they need, so they may run concurrently once boot completes and
/// may be called from inside module code. Calling load or reload from inside
/// a module's `initialize` deadlocks.
pub struct ModuleManager {
    boot_lock: Mutex<()>,
    loader: Mutex<ModuleLoader>,
    registry: RwLock<ModuleRegistry>,
    discovery: RwLock<DiscoverySettings>,
    debug_logging: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("search_paths", &self.search_paths())
            .field("modules", &self.all_names())
            .field("debug_logging", &self.debug_logging())
            .finish_non_exhaustive()
    }
}

impl ModuleManager {
    pub fn new() -> Self {
        Self::with_modules_dir(MODULES_DIR_NAME)
    }

    /// Manager whose discovery folder is named `modules_dir` instead of `Modules`
    pub fn with_modules_dir(modules_dir: impl Into<String>) -> Self {
        Self {
            boot_lock: Mutex::new(()),
            loader: Mutex::new(ModuleLoader::new(modules_dir)),
            registry: RwLock::new(ModuleRegistry::new()),
            discovery: RwLock::new(DiscoverySettings::default()),
            debug_logging: AtomicBool::new(false),
        }
    }

    /// Registers the conventional roots: the executable's directory, the
    /// working directory and its `Modules` folder.
    pub fn add_default_search_paths(&self) {
        if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
            self.add_search_path(exe_dir);
        }
        if let Ok(cwd) = std::env::current_dir() {
            let modules_dir = cwd.join(self.modules_dir());
            self.add_search_path(cwd);
            self.add_search_path(modules_dir);
        }
    }

    fn registry_read(&self) -> RwLockReadGuard<'_, ModuleRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_write(&self) -> RwLockWriteGuard<'_, ModuleRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn discovery(&self) -> DiscoverySettings {
        self.discovery.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_debug_logging(&self, enabled: bool) {
        self.debug_logging.store(enabled, Ordering::SeqCst);
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging.load(Ordering::SeqCst)
    }

    pub fn set_namespace_prefix(&self, prefix: impl Into<String>) {
        self.discovery.write().unwrap_or_else(PoisonError::into_inner).namespace_prefix = prefix.into();
    }

    pub fn set_boot_priority<S: Into<String>>(&self, priority: impl IntoIterator<Item = S>) {
        self.discovery.write().unwrap_or_else(PoisonError::into_inner).boot_priority =
            priority.into_iter().map(Into::into).collect();
    }

    pub fn boot_priority(&self) -> Vec<String> {
        self.discovery().boot_priority
    }

    /// Timeout given to wrappers created from now on
    pub fn set_default_timeout_ms(&self, timeout_ms: u64) {
        self.discovery.write().unwrap_or_else(PoisonError::into_inner).default_timeout_ms = timeout_ms;
    }

    pub fn modules_dir(&self) -> String {
        lock(&self.loader).modules_dir().to_string()
    }

    /// Registers a discovery root. Missing paths and duplicates are ignored.
    pub fn add_search_path(&self, path: impl AsRef<Path>) -> bool {
        let added = lock(&self.loader).add_search_path(path.as_ref());
        if self.debug_logging() {
            debug!(
                target: DIAG_TARGET,
                "Search path {} {}",
                path.as_ref().display(),
                if added { "registered" } else { "ignored" }
            );
        }
        added
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        lock(&self.loader).search_roots().to_vec()
    }

    /// Simple names of every binary loaded into the process
    pub fn loaded_binaries(&self) -> Vec<String> {
        lock(&self.loader).loaded_binaries()
    }

    /// Adds candidate types linked into the host, as if they came from a
    /// binary called `name`. They are picked up by the next load cycle.
    pub fn register_static_catalog(&self, name: &str, candidates: Vec<ModuleCandidate>) -> bool {
        lock(&self.loader).register_static(name, candidates)
    }

    /// Registers an already constructed module without discovery. The module is
    /// not initialized; it receives events and dispatch like any other.
    pub fn register_builtin_module(&self, module: Box<dyn Module>, category: &str) -> Arc<ModuleWrapper> {
        let origin = ModuleOrigin {
            type_name: String::new(),
            category: category.to_string(),
            binary: String::new(),
        };
        let wrapper = Arc::new(ModuleWrapper::new(module, origin));
        wrapper.set_timeout_ms(self.discovery().default_timeout_ms);
        self.registry_write().add(Arc::clone(&wrapper));
        if self.debug_logging() {
            debug!(target: DIAG_TARGET, "Built-in module registered: {}", wrapper.name());
        }
        wrapper
    }

    /// Discovers, instantiates, registers and initializes modules, then raises
    /// `SystemBoot`.
    ///
    /// With `require_marker` off, unmarked types outside the namespace
    /// convention are accepted too.
    pub fn load_modules(&self, require_marker: bool) -> LoadResult {
        let _boot = lock(&self.boot_lock);
        self.load_locked(require_marker)
    }

    /// Unloads everything, then runs a full load cycle. Binaries already in the
    /// process stay loaded and their types are enumerated again.
    pub fn reload_modules(&self, require_marker: bool) -> LoadResult {
        let _boot = lock(&self.boot_lock);
        self.unload_locked();
        self.load_locked(require_marker)
    }

    fn load_locked(&self, require_marker: bool) -> LoadResult {
        let diagnostics = self.debug_logging();
        let discovery = self.discovery();
        let mut result = LoadResult::default();

        let candidates = {
            let mut loader = lock(&self.loader);
            loader.load_from_roots(&mut result.errors, diagnostics);
            loader.enumerate_candidates(&mut result.errors, diagnostics)
        };

        let mut eligible: Vec<ModuleCandidate> = Vec::new();
        for candidate in candidates {
            if !candidate.is_eligible(require_marker, &discovery.namespace_prefix) {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Skipping type {}: not an eligible module", candidate.type_name);
                }
                continue;
            }
            if eligible
                .iter()
                .any(|c| c.type_name == candidate.type_name && c.binary == candidate.binary)
            {
                continue;
            }
            eligible.push(candidate);
        }
        let ordered = apply_boot_priority(eligible, &discovery.boot_priority);
        if diagnostics {
            debug!(target: DIAG_TARGET, "Module candidates found: {}", ordered.len());
        }

        let mut created = Vec::with_capacity(ordered.len());
        for candidate in &ordered {
            if diagnostics {
                debug!(target: DIAG_TARGET, "Instantiating module: {}", candidate.type_name);
            }
            match candidate.instantiate() {
                Ok(module) => {
                    let wrapper = Arc::new(ModuleWrapper::new(module, candidate.origin()));
                    wrapper.set_timeout_ms(discovery.default_timeout_ms);
                    created.push(wrapper);
                }
                Err(e) => {
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "ERROR: {}", e);
                    }
                    result.errors.push(e.to_string());
                }
            }
        }

        // Registered before initialization so modules can find their siblings
        self.registry_write().extend(created.iter().cloned());

        for wrapper in &created {
            match wrapper.initialize(self) {
                Ok(()) => {
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "Module initialized: {}", wrapper.name());
                    }
                    result.loaded.push(wrapper.view());
                }
                Err(e) => {
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "ERROR: {}", e);
                    }
                    result.errors.push(e.to_string());
                }
            }
        }

        self.raise_system_event(SYSTEM_BOOT, None);

        if diagnostics {
            for error in &result.errors {
                debug!(target: DIAG_TARGET, "Load error: {}", error);
            }
        }
        info!(
            "Module load complete: {} initialized, {} errors",
            result.loaded.len(),
            result.errors.len()
        );
        result
    }

    /// Disposes every module in reverse registration order and empties the
    /// registry. Dispose failures are logged and ignored.
    pub fn unload_all_modules(&self) {
        let _boot = lock(&self.boot_lock);
        self.unload_locked();
    }

    fn unload_locked(&self) {
        let wrappers = self.registry_write().drain();
        for wrapper in wrappers.iter().rev() {
            self.dispose_wrapper(wrapper);
        }
    }

    fn dispose_wrapper(&self, wrapper: &ModuleWrapper) {
        match wrapper.dispose() {
            Ok(()) => {
                if self.debug_logging() {
                    debug!(target: DIAG_TARGET, "Module disposed: {}", wrapper.name());
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    /// Removes and disposes the first module matching `name`
    pub fn unload_module(&self, name: &str) -> bool {
        let _boot = lock(&self.boot_lock);
        let removed = self.registry_write().remove(name);
        match removed {
            Some(wrapper) => {
                self.dispose_wrapper(&wrapper);
                true
            }
            None => false,
        }
    }

    /// Case-insensitive lookup by declared name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<ModuleWrapper>> {
        self.registry_read().get_by_name(name)
    }

    /// Lookup by declared name, falling back to the concrete type name
    pub fn get_instance_by_name(&self, name: &str) -> Option<Arc<ModuleWrapper>> {
        self.registry_read().get_instance_by_name(name)
    }

    /// Runs `f` against the module called `name` if it is a `T`
    pub fn with_module<T: Module + 'static, R>(&self, name: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let wrapper = self.get_instance_by_name(name)?;
        wrapper.downcast_ref::<T>().map(f)
    }

    pub fn all_names(&self) -> Vec<String> {
        self.registry_read().all_names()
    }

    /// Every registered wrapper, in registration order
    pub fn modules(&self) -> Vec<Arc<ModuleWrapper>> {
        self.registry_read().snapshot()
    }

    pub fn views(&self) -> Vec<ModuleView> {
        self.registry_read().iter().map(|w| w.view()).collect()
    }

    pub fn core_modules(&self) -> Vec<Arc<ModuleWrapper>> {
        self.registry_read().core_modules()
    }

    pub fn module_count(&self) -> usize {
        self.registry_read().len()
    }

    /// Broadcasts `name` to every module in registration order. Returns how
    /// many receivers handled it.
    pub fn raise_system_event(&self, name: &str, payload: Option<Payload>) -> usize {
        let envelope = match payload {
            Some(payload) => EventEnvelope::with_payload(name, payload),
            None => EventEnvelope::new(name),
        };
        self.raise_event(&envelope)
    }

    pub fn raise_event(&self, envelope: &EventEnvelope) -> usize {
        let diagnostics = self.debug_logging();
        let wrappers = self.modules();
        if diagnostics {
            debug!(target: DIAG_TARGET, "Raising event '{}' to {} modules", envelope.name, wrappers.len());
        }
        event::broadcast(&wrappers, envelope, diagnostics)
    }

    /// Read-only scan of the working directory and the registered roots
    pub fn discover_environment(&self) -> EnvironmentReport {
        let roots = self.search_paths();
        let modules_dir = self.modules_dir();
        environment::discover_environment(&roots, &modules_dir)
    }

    pub fn scan_for_updates<P: AsRef<Path>>(&self, folders: &[P]) -> UpdateScan {
        environment::scan_for_updates(folders)
    }
}
