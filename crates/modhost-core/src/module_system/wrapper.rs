use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::kernel::constants::DIAG_TARGET;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::manager::ModuleManager;
use crate::module_system::traits::{Module, Processor};
use crate::utils::guarded;

const MAX_LOG_ENTRIES: usize = 100;

/// Lifecycle state of a wrapped module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    Uninitialized,
    Initialized,
    Disposed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Uninitialized => write!(f, "uninitialized"),
            ModuleState::Initialized => write!(f, "initialized"),
            ModuleState::Disposed => write!(f, "disposed"),
        }
    }
}

/// Where a module came from: its type, category tag and binary.
#[derive(Debug, Clone, Default)]
pub struct ModuleOrigin {
    pub type_name: String,
    pub category: String,
    pub binary: String,
}

/// Serializable snapshot of a wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleView {
    pub name: String,
    pub type_name: String,
    pub category: String,
    pub binary: String,
    pub state: ModuleState,
    pub enabled: bool,
    pub timeout_ms: u64,
}

/// Uniform handle around one module instance.
///
/// The wrapper exclusively owns the instance for its whole life. Name,
/// category and type are fixed at construction; lifecycle state, the enabled
/// flag, the timeout and diagnostics are interior-mutable so wrappers can be
/// shared as `Arc<ModuleWrapper>` between the registry, dispatch and events.
pub struct ModuleWrapper {
    module: Box<dyn Module>,
    declared_name: String,
    type_name: String,
    category: String,
    binary: String,
    state: Mutex<ModuleState>,
    enabled: AtomicBool,
    timeout_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_timed_out: AtomicBool,
    logs: Mutex<Vec<String>>,
    interceptor: RwLock<Option<Arc<dyn Processor>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ModuleWrapper {
    pub fn new(module: Box<dyn Module>, origin: ModuleOrigin) -> Self {
        let declared_name = module.name().trim().to_string();
        let type_name = if origin.type_name.is_empty() {
            module.type_name().to_string()
        } else {
            origin.type_name
        };
        Self {
            module,
            declared_name,
            type_name,
            category: origin.category,
            binary: origin.binary,
            state: Mutex::new(ModuleState::Uninitialized),
            enabled: AtomicBool::new(true),
            timeout_ms: AtomicU64::new(0),
            last_error: Mutex::new(None),
            last_timed_out: AtomicBool::new(false),
            logs: Mutex::new(Vec::new()),
            interceptor: RwLock::new(None),
        }
    }

    /// Declared name, or the simple type name when the module declares none
    pub fn name(&self) -> &str {
        if self.declared_name.is_empty() {
            self.simple_type_name()
        } else {
            &self.declared_name
        }
    }

    /// The name the module declared itself, possibly empty
    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Last path segment of the type name (`core_memory::MemoryModule` -> `MemoryModule`)
    pub fn simple_type_name(&self) -> &str {
        simple_type_name(&self.type_name)
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    /// Downcast the instance to its concrete type
    pub fn downcast_ref<T: Module + 'static>(&self) -> Option<&T> {
        self.module().as_any().downcast_ref::<T>()
    }

    pub fn state(&self) -> ModuleState {
        *lock(&self.state)
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == ModuleState::Initialized
    }

    /// Initializes the module once. Repeated calls on an initialized wrapper are no-ops.
    pub fn initialize(&self, manager: &ModuleManager) -> Result<(), ModuleSystemError> {
        match self.state() {
            ModuleState::Initialized => return Ok(()),
            ModuleState::Disposed => {
                return Err(ModuleSystemError::InitializationError {
                    type_name: self.type_name.clone(),
                    message: "module has been disposed".to_string(),
                });
            }
            ModuleState::Uninitialized => {}
        }

        let outcome = guarded(|| self.module.initialize(manager));
        let message = match outcome {
            Ok(Ok(())) => {
                *lock(&self.state) = ModuleState::Initialized;
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic_msg) => format!("panic: {}", panic_msg),
        };
        self.record_error(message.clone());
        Err(ModuleSystemError::InitializationError {
            type_name: self.type_name.clone(),
            message,
        })
    }

    /// Disposes the module. The wrapper is marked disposed even if the module's
    /// dispose hook fails; the failure is returned for logging only.
    pub fn dispose(&self) -> Result<(), ModuleSystemError> {
        {
            let mut state = lock(&self.state);
            if *state == ModuleState::Disposed {
                return Ok(());
            }
            *state = ModuleState::Disposed;
        }
        let message = match guarded(|| self.module.dispose()) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(panic_msg) => format!("panic: {}", panic_msg),
        };
        Err(ModuleSystemError::DisposeError {
            module: self.name().to_string(),
            message,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flips the enabled flag and runs the module's enable/disable hook.
    /// Hook failures are swallowed.
    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::SeqCst) == enabled {
            return;
        }
        let Some(toggle) = self.module.as_toggleable() else {
            return;
        };
        let outcome = guarded(|| if enabled { toggle.on_enable() } else { toggle.on_disable() });
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(target: DIAG_TARGET, "Toggle hook failed for {}: {}", self.name(), e),
            Err(panic_msg) => debug!(target: DIAG_TARGET, "Toggle hook panicked for {}: {}", self.name(), panic_msg),
        }
    }

    /// Invocation timeout for async dispatch, 0 for none
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::SeqCst)
    }

    pub fn set_timeout_ms(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::SeqCst);
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.push_log(format!("error: {}", message));
        *lock(&self.last_error) = Some(message);
    }

    pub fn last_invocation_timed_out(&self) -> bool {
        self.last_timed_out.load(Ordering::SeqCst)
    }

    pub fn set_last_invocation_timed_out(&self, timed_out: bool) {
        self.last_timed_out.store(timed_out, Ordering::SeqCst);
    }

    /// Recent diagnostic entries for this module, oldest first
    pub fn logs(&self) -> Vec<String> {
        lock(&self.logs).clone()
    }

    pub fn push_log(&self, entry: impl Into<String>) {
        let mut logs = lock(&self.logs);
        if logs.len() >= MAX_LOG_ENTRIES {
            logs.remove(0);
        }
        logs.push(entry.into());
    }

    /// Installs a processor that answers on the module's behalf when the
    /// module itself gives no answer.
    pub fn set_interceptor(&self, interceptor: Option<Arc<dyn Processor>>) {
        *self.interceptor.write().unwrap_or_else(PoisonError::into_inner) = interceptor;
    }

    pub fn interceptor(&self) -> Option<Arc<dyn Processor>> {
        self.interceptor.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn view(&self) -> ModuleView {
        ModuleView {
            name: self.name().to_string(),
            type_name: self.type_name.clone(),
            category: self.category.clone(),
            binary: self.binary.clone(),
            state: self.state(),
            enabled: self.is_enabled(),
            timeout_ms: self.timeout_ms(),
        }
    }
}

impl fmt::Debug for ModuleWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleWrapper")
            .field("name", &self.name())
            .field("type_name", &self.type_name)
            .field("category", &self.category)
            .field("state", &self.state())
            .finish()
    }
}

pub(crate) fn simple_type_name(type_name: &str) -> &str {
    // Generic arguments may contain `::` too; cut them off first
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
