use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::EventReceiver;
use crate::module_system::error::ModuleResult;
use crate::module_system::context::ModuleContext;

/// Upcast helper so callers can downcast a `&dyn Module` to its concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Core trait that every module must implement.
///
/// Everything beyond name, initialize and dispose is optional and is exposed
/// through the `as_*` capability accessors. Dispatch and the event bus try
/// those accessors in a fixed order instead of requiring one exact shape.
///
/// All methods take `&self`: once boot completes, dispatch may reach a module
/// from several threads at once, so modules guard their own mutable state.
pub trait Module: AsAny + Send + Sync {
    /// Declared name. An empty name makes the registry fall back to the type name.
    fn name(&self) -> &str;

    /// Concrete type name, used for type-based lookup and boot ordering.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called once after registration. `ctx` lets the module look up and
    /// invoke siblings; it is only valid for the duration of the call.
    fn initialize(&self, ctx: &dyn ModuleContext) -> ModuleResult<()>;

    /// Called on unload. Failures are logged and ignored.
    fn dispose(&self) -> ModuleResult<()> {
        Ok(())
    }

    /// The string-in/string-out entry point, if the module has one.
    fn as_processor(&self) -> Option<&dyn Processor> {
        None
    }

    /// Memoized "last produced response", consulted when no entry point exists.
    fn as_last_response(&self) -> Option<&dyn LastResponseProvider> {
        None
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        None
    }

    fn as_toggleable(&self) -> Option<&dyn Toggleable> {
        None
    }
}

/// Canonical process entry point. `Ok(None)` and `Ok(Some(""))` both mean "no answer".
pub trait Processor: Send + Sync {
    fn process(&self, input: &str) -> ModuleResult<Option<String>>;
}

pub trait LastResponseProvider: Send + Sync {
    fn last_response(&self) -> Option<String>;
}

/// Hooks run when a wrapper's `enabled` flag flips.
pub trait Toggleable: Send + Sync {
    fn on_enable(&self) -> ModuleResult<()> {
        Ok(())
    }

    fn on_disable(&self) -> ModuleResult<()> {
        Ok(())
    }
}

/// Type-level metadata for modules that can be discovered and constructed
/// without arguments. Statically registered catalogs and
/// [`export_modules!`](crate::export_modules) both build candidates from it.
pub trait ModuleType: Module + Sized + 'static {
    /// Namespace used by the namespace convention. Empty means the Rust module path.
    const NAMESPACE: &'static str = "";

    /// Free-form category tag, e.g. "core" or "extensions".
    const CATEGORY: &'static str = "";

    /// Explicit module marker. Unmarked types are only eligible through the
    /// namespace convention.
    const MARKED: bool = true;

    /// Parameterless constructor.
    fn construct() -> ModuleResult<Self>;
}

/// Latch for the "Wake once" contract. `wake` returns `true` only on the first call.
#[derive(Debug, Default)]
pub struct WakeLatch {
    awake: AtomicBool,
}

impl WakeLatch {
    pub const fn new() -> Self {
        Self { awake: AtomicBool::new(false) }
    }

    pub fn wake(&self) -> bool {
        !self.awake.swap(true, Ordering::SeqCst)
    }

    pub fn is_awake(&self) -> bool {
        self.awake.load(Ordering::SeqCst)
    }

    /// Puts the latch back to sleep, e.g. on dispose.
    pub fn reset(&self) {
        self.awake.store(false, Ordering::SeqCst);
    }
}
