//! Plugin-side glue for the native module ABI.
//!
//! Module crates built as `cdylib` call [`export_modules!`](crate::export_modules)
//! once with their module types. The macro exports the catalog symbol; the
//! generic thunks below translate each vtable slot into calls on the Rust
//! traits, catching panics at the boundary.
//!
//! A library carries its own copy of the `log` crate. On the first
//! `initialize` the library's logger is pointed at the host (see
//! [`FfiHostContext::log`]), so records logged before that are dropped.
use std::any::Any;
use std::ffi::{CString, c_void};
use std::os::raw::c_char;
use std::ptr;
use std::sync::OnceLock;

use crate::event::Delivery;
use crate::kernel::constants::API_VERSION;
use crate::module_system::context::ModuleContext;
use crate::module_system::error::ModuleResult;
use crate::module_system::ffi::{
    CAP_EVENTS, CAP_LAST_RESPONSE, CAP_PROCESS, CAP_TOGGLE, FfiConstruct, FfiHostContext, FfiLogFn,
    FfiModuleCatalog, FfiModuleEntry, FfiModuleVTable, FfiResult, FfiStringOut, ffi_opt_string_from_ptr,
    ffi_str_from_raw, ffi_string_from_ptr, level_filter_from_usize, take_string,
};
use crate::module_system::traits::ModuleType;
use crate::utils::guarded;

/// Catalog description of one exported module type
pub struct ExportEntry {
    type_name: String,
    namespace: String,
    category: String,
    marked: bool,
    construct: FfiConstruct,
}

impl ExportEntry {
    pub fn of<T: ModuleType>() -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            type_name: type_name.to_string(),
            namespace: namespace_of::<T>(),
            category: T::CATEGORY.to_string(),
            marked: T::MARKED,
            construct: construct_thunk::<T>,
        }
    }
}

/// Namespace of `T`: its declared `NAMESPACE`, else the Rust module path
pub(crate) fn namespace_of<T: ModuleType>() -> String {
    if !T::NAMESPACE.is_empty() {
        return T::NAMESPACE.to_string();
    }
    let type_name = std::any::type_name::<T>();
    match type_name.rfind("::") {
        Some(idx) => type_name[..idx].to_string(),
        None => String::new(),
    }
}

/// Owns a catalog and every allocation it points into
pub struct ExportedCatalog {
    catalog: FfiModuleCatalog,
    _entries: Vec<FfiModuleEntry>,
    _strings: Vec<CString>,
    _requires: Vec<*const c_char>,
}

// Immutable after `build`; only handed out as a const pointer.
unsafe impl Send for ExportedCatalog {}
unsafe impl Sync for ExportedCatalog {}

impl ExportedCatalog {
    pub fn build(entries: Vec<ExportEntry>, requires: &[&str]) -> Self {
        let mut strings = Vec::new();
        let mut intern = |s: &str| -> *const c_char {
            let c = to_c_string(s);
            let p = c.as_ptr();
            strings.push(c);
            p
        };

        let api_version = intern(API_VERSION);
        let ffi_entries: Vec<FfiModuleEntry> = entries
            .iter()
            .map(|e| FfiModuleEntry {
                type_name: intern(&e.type_name),
                namespace: intern(&e.namespace),
                category: intern(&e.category),
                marked: e.marked,
                construct: Some(e.construct),
            })
            .collect();
        let requires: Vec<*const c_char> = requires.iter().map(|r| intern(r)).collect();

        let catalog = FfiModuleCatalog {
            api_version,
            entries: if ffi_entries.is_empty() { ptr::null() } else { ffi_entries.as_ptr() },
            entry_count: ffi_entries.len(),
            requires: if requires.is_empty() { ptr::null() } else { requires.as_ptr() },
            requires_count: requires.len(),
            free_string: free_string_thunk,
        };

        Self {
            catalog,
            _entries: ffi_entries,
            _strings: strings,
            _requires: requires,
        }
    }

    pub fn as_ptr(&self) -> *const FfiModuleCatalog {
        &self.catalog
    }
}

fn to_c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

fn write_string(out: FfiStringOut, value: Option<String>) {
    if out.is_null() {
        return;
    }
    if let Some(v) = value {
        unsafe { *out = to_c_string(&v).into_raw() };
    }
}

fn finish(outcome: Result<ModuleResult<Delivery>, String>, err_out: FfiStringOut) -> FfiResult {
    match outcome {
        Ok(Ok(Delivery::Handled)) => FfiResult::Ok,
        Ok(Ok(Delivery::Unhandled)) => FfiResult::Unhandled,
        Ok(Err(e)) => {
            write_string(err_out, Some(e.to_string()));
            FfiResult::Err
        }
        Err(panic_msg) => {
            write_string(err_out, Some(format!("panic: {}", panic_msg)));
            FfiResult::Panic
        }
    }
}

fn parse_payload(ptr: *const c_char) -> Option<serde_json::Value> {
    let raw = unsafe { ffi_opt_string_from_ptr(ptr) }.ok().flatten()?;
    Some(serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)))
}

/// Library-side view of the host's callback table
pub(crate) struct HostContext<'a> {
    table: &'a FfiHostContext,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(table: &'a FfiHostContext) -> Self {
        Self { table }
    }
}

impl ModuleContext for HostContext<'_> {
    fn module_count(&self) -> usize {
        (self.table.module_count)(self.table.host)
    }

    fn all_names(&self) -> Vec<String> {
        let json = unsafe { take_string((self.table.all_names)(self.table.host), self.table.free_string) };
        json.and_then(|j| serde_json::from_str(&j).ok()).unwrap_or_default()
    }

    fn has_module(&self, name: &str) -> bool {
        (self.table.has_module)(self.table.host, name.as_ptr(), name.len())
    }

    fn invoke_by_name(&self, name: &str, input: &str) -> Option<String> {
        let mut out: *mut c_char = ptr::null_mut();
        let res = (self.table.invoke_by_name)(
            self.table.host,
            name.as_ptr(),
            name.len(),
            input.as_ptr(),
            input.len(),
            &mut out,
        );
        let text = unsafe { take_string(out, self.table.free_string) };
        match res {
            FfiResult::Unhandled => None,
            _ => text,
        }
    }
}

static HOST_LOG: OnceLock<FfiLogFn> = OnceLock::new();
static HOST_LOGGER: HostLogger = HostLogger;

/// Forwards this library's `log` records to the host's logger
struct HostLogger;

impl log::Log for HostLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        let Some(forward) = HOST_LOG.get() else {
            return;
        };
        if !self.enabled(record.metadata()) {
            return;
        }
        let target = record.target();
        let message = record.args().to_string();
        forward(record.level() as usize, target.as_ptr(), target.len(), message.as_ptr(), message.len());
    }

    fn flush(&self) {}
}

fn forward_logs_to_host(table: &FfiHostContext) {
    if HOST_LOG.set(table.log).is_ok() && log::set_logger(&HOST_LOGGER).is_ok() {
        log::set_max_level(level_filter_from_usize(table.max_level));
    }
}

// Every thunk receives the pointer produced by `construct_thunk::<T>` for the same `T`
fn instance<'a, T>(instance: *const c_void) -> &'a T {
    unsafe { &*(instance as *const T) }
}

extern "C-unwind" fn free_string_thunk(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

extern "C-unwind" fn construct_thunk<T: ModuleType>(err_out: FfiStringOut) -> *mut FfiModuleVTable {
    let module = match guarded(T::construct) {
        Ok(Ok(m)) => m,
        Ok(Err(e)) => {
            write_string(err_out, Some(e.to_string()));
            return ptr::null_mut();
        }
        Err(panic_msg) => {
            write_string(err_out, Some(format!("panic: {}", panic_msg)));
            return ptr::null_mut();
        }
    };

    let mut capabilities = 0;
    if module.as_processor().is_some() {
        capabilities |= CAP_PROCESS;
    }
    if module.as_last_response().is_some() {
        capabilities |= CAP_LAST_RESPONSE;
    }
    if module.as_event_receiver().is_some() {
        capabilities |= CAP_EVENTS;
    }
    if module.as_toggleable().is_some() {
        capabilities |= CAP_TOGGLE;
    }

    let vtable = FfiModuleVTable {
        instance: Box::into_raw(Box::new(module)) as *mut c_void,
        capabilities,
        name: name_thunk::<T>,
        initialize: initialize_thunk::<T>,
        dispose: dispose_thunk::<T>,
        destroy: destroy_thunk::<T>,
        free_string: free_string_thunk,
        process: Some(process_thunk::<T>),
        last_response: Some(last_response_thunk::<T>),
        on_typed: Some(on_typed_thunk::<T>),
        on_warmup: Some(on_warmup_thunk::<T>),
        on_system_event: Some(on_system_event_thunk::<T>),
        on_named_event: Some(on_named_event_thunk::<T>),
        on_enable: Some(on_enable_thunk::<T>),
        on_disable: Some(on_disable_thunk::<T>),
    };
    Box::into_raw(Box::new(vtable))
}

extern "C-unwind" fn name_thunk<T: ModuleType>(this: *const c_void) -> *mut c_char {
    let module = instance::<T>(this);
    match guarded(|| module.name().to_string()) {
        Ok(name) => to_c_string(&name).into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

extern "C-unwind" fn initialize_thunk<T: ModuleType>(this: *const c_void, host: *const FfiHostContext, err_out: FfiStringOut) -> FfiResult {
    if host.is_null() {
        return FfiResult::NullPointer;
    }
    let module = instance::<T>(this);
    let table = unsafe { &*host };
    forward_logs_to_host(table);
    let ctx = HostContext::new(table);
    finish(guarded(|| module.initialize(&ctx).map(|_| Delivery::Handled)), err_out)
}

extern "C-unwind" fn dispose_thunk<T: ModuleType>(this: *const c_void, err_out: FfiStringOut) -> FfiResult {
    let module = instance::<T>(this);
    finish(guarded(|| module.dispose().map(|_| Delivery::Handled)), err_out)
}

extern "C-unwind" fn destroy_thunk<T: ModuleType>(vtable: *mut FfiModuleVTable) {
    if vtable.is_null() {
        return;
    }
    let vtable = unsafe { Box::from_raw(vtable) };
    if !vtable.instance.is_null() {
        drop(unsafe { Box::from_raw(vtable.instance as *mut T) });
    }
}

extern "C-unwind" fn process_thunk<T: ModuleType>(
    this: *const c_void,
    input: *const u8,
    input_len: usize,
    out: FfiStringOut,
) -> FfiResult {
    let module = instance::<T>(this);
    let input = match unsafe { ffi_str_from_raw(input, input_len) } {
        Ok(s) => s,
        Err(e) => return e,
    };
    let outcome = guarded(|| match module.as_processor() {
        Some(p) => p.process(input).map(Some),
        None => Ok(None),
    });
    match outcome {
        Ok(Ok(Some(result))) => {
            write_string(out, result);
            FfiResult::Ok
        }
        Ok(Ok(None)) => FfiResult::Unhandled,
        Ok(Err(e)) => {
            write_string(out, Some(e.to_string()));
            FfiResult::Err
        }
        Err(panic_msg) => {
            write_string(out, Some(format!("panic: {}", panic_msg)));
            FfiResult::Panic
        }
    }
}

extern "C-unwind" fn last_response_thunk<T: ModuleType>(this: *const c_void) -> *mut c_char {
    let module = instance::<T>(this);
    match guarded(|| module.as_last_response().and_then(|l| l.last_response())) {
        Ok(Some(s)) => to_c_string(&s).into_raw(),
        _ => ptr::null_mut(),
    }
}

extern "C-unwind" fn on_typed_thunk<T: ModuleType>(
    this: *const c_void,
    name: *const c_char,
    payload_json: *const c_char,
    err_out: FfiStringOut,
) -> FfiResult {
    let module = instance::<T>(this);
    let Ok(name) = (unsafe { ffi_string_from_ptr(name) }) else {
        return FfiResult::Utf8Error;
    };
    let Some(payload) = parse_payload(payload_json) else {
        return FfiResult::Unhandled;
    };
    finish(
        guarded(|| match module.as_event_receiver() {
            Some(r) => r.on_typed(&name, &payload as &dyn Any),
            None => Ok(Delivery::Unhandled),
        }),
        err_out,
    )
}

extern "C-unwind" fn on_warmup_thunk<T: ModuleType>(this: *const c_void, err_out: FfiStringOut) -> FfiResult {
    let module = instance::<T>(this);
    finish(
        guarded(|| match module.as_event_receiver() {
            Some(r) => r.on_warmup(),
            None => Ok(Delivery::Unhandled),
        }),
        err_out,
    )
}

extern "C-unwind" fn on_system_event_thunk<T: ModuleType>(
    this: *const c_void,
    name: *const c_char,
    payload_json: *const c_char,
    err_out: FfiStringOut,
) -> FfiResult {
    let module = instance::<T>(this);
    let Ok(name) = (unsafe { ffi_string_from_ptr(name) }) else {
        return FfiResult::Utf8Error;
    };
    let payload = parse_payload(payload_json);
    finish(
        guarded(|| match module.as_event_receiver() {
            Some(r) => r.on_system_event(&name, payload.as_ref().map(|v| v as &dyn Any)),
            None => Ok(Delivery::Unhandled),
        }),
        err_out,
    )
}

extern "C-unwind" fn on_named_event_thunk<T: ModuleType>(this: *const c_void, name: *const c_char, err_out: FfiStringOut) -> FfiResult {
    let module = instance::<T>(this);
    let Ok(name) = (unsafe { ffi_string_from_ptr(name) }) else {
        return FfiResult::Utf8Error;
    };
    finish(
        guarded(|| match module.as_event_receiver() {
            Some(r) => r.on_named_event(&name),
            None => Ok(Delivery::Unhandled),
        }),
        err_out,
    )
}

extern "C-unwind" fn on_enable_thunk<T: ModuleType>(this: *const c_void, err_out: FfiStringOut) -> FfiResult {
    let module = instance::<T>(this);
    finish(
        guarded(|| match module.as_toggleable() {
            Some(t) => t.on_enable().map(|_| Delivery::Handled),
            None => Ok(Delivery::Unhandled),
        }),
        err_out,
    )
}

extern "C-unwind" fn on_disable_thunk<T: ModuleType>(this: *const c_void, err_out: FfiStringOut) -> FfiResult {
    let module = instance::<T>(this);
    finish(
        guarded(|| match module.as_toggleable() {
            Some(t) => t.on_disable().map(|_| Delivery::Handled),
            None => Ok(Delivery::Unhandled),
        }),
        err_out,
    )
}

/// Exports the module catalog symbol for a `cdylib` module crate.
///
/// `log` records from the library reach the host logger once the host has
/// initialized one of its modules; anything logged earlier (e.g. in
/// `construct`) is dropped.
///
/// ```ignore
/// modhost_core::export_modules!(EchoModule);
/// modhost_core::export_modules!(requires = ["core_memory"]; ChatModule, ChatHistoryModule);
/// ```
#[macro_export]
macro_rules! export_modules {
    (requires = [$($dep:expr),* $(,)?]; $($module:ty),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn _module_catalog() -> *const $crate::module_system::ffi::FfiModuleCatalog {
            static CATALOG: ::std::sync::OnceLock<$crate::module_system::export::ExportedCatalog> =
                ::std::sync::OnceLock::new();
            CATALOG
                .get_or_init(|| {
                    $crate::module_system::export::ExportedCatalog::build(
                        ::std::vec![$($crate::module_system::export::ExportEntry::of::<$module>()),+],
                        &[$($dep),*],
                    )
                })
                .as_ptr()
        }
    };
    ($($module:ty),+ $(,)?) => {
        $crate::export_modules!(requires = []; $($module),+);
    };
}
