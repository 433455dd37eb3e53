//! Native module ABI.
//!
//! A module library exports [`CATALOG_SYMBOL`](crate::kernel::constants::CATALOG_SYMBOL)
//! returning a pointer to an [`FfiModuleCatalog`]. Each catalog entry can
//! construct instances, handed back as an [`FfiModuleVTable`]. Optional
//! capabilities are nullable function slots, gated by the `capabilities` mask
//! the plugin side fills in after construction.
//!
//! [`FfiModule`] is the host-side adapter that makes a vtable look like any
//! other [`Module`]. During `initialize` the host hands the library an
//! [`FfiHostContext`]: a callback table over an opaque host pointer, so the
//! library never touches host memory layouts.
//!
//! Free text (process input, names handed to the host) crosses as pointer
//! plus length, so embedded NUL bytes survive. Metadata and results use
//! NUL-terminated strings.
use std::any::Any;
use std::ffi::{CStr, CString, c_void};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use libloading::Library;

use crate::event::{Delivery, EventReceiver, payload_as_json};
use crate::module_system::context::ModuleContext;
use crate::module_system::error::{ModuleError, ModuleResult, ModuleSystemError};
use crate::module_system::manager::ModuleManager;
use crate::module_system::traits::{LastResponseProvider, Module, Processor, Toggleable};
use crate::utils::guarded;

/// Result codes returned across the ABI
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Ok = 0,
    Err = 1,
    Panic = 2,
    NullPointer = 3,
    Utf8Error = 4,
    /// The handler does not apply (event shape not implemented, no processor)
    Unhandled = 5,
}

pub const CAP_PROCESS: u32 = 1 << 0;
pub const CAP_LAST_RESPONSE: u32 = 1 << 1;
pub const CAP_EVENTS: u32 = 1 << 2;
pub const CAP_TOGGLE: u32 = 1 << 3;

/// Out-parameter for strings allocated by the plugin (results and error messages)
pub type FfiStringOut = *mut *mut c_char;

pub type FfiFreeString = extern "C-unwind" fn(s: *mut c_char);
pub type FfiConstruct = extern "C-unwind" fn(err_out: FfiStringOut) -> *mut FfiModuleVTable;
pub type FfiCatalogFn = extern "C-unwind" fn() -> *const FfiModuleCatalog;
/// `level` is a `log::Level` as usize (1 = error .. 5 = trace)
pub type FfiLogFn = extern "C-unwind" fn(level: usize, target: *const u8, target_len: usize, message: *const u8, message_len: usize);

/// What the host offers a native module while it initializes.
///
/// Only valid for the duration of the `initialize` call, except `log`, which
/// points into the host and stays callable for the life of the process.
#[repr(C)]
pub struct FfiHostContext {
    /// Opaque to the library; only ever passed back to the callbacks
    pub host: *const c_void,
    pub module_count: extern "C-unwind" fn(host: *const c_void) -> usize,
    /// JSON array of declared names
    pub all_names: extern "C-unwind" fn(host: *const c_void) -> *mut c_char,
    pub has_module: extern "C-unwind" fn(host: *const c_void, name: *const u8, name_len: usize) -> bool,
    pub invoke_by_name: extern "C-unwind" fn(
        host: *const c_void,
        name: *const u8,
        name_len: usize,
        input: *const u8,
        input_len: usize,
        out: FfiStringOut,
    ) -> FfiResult,
    /// Frees strings returned by the callbacks above
    pub free_string: FfiFreeString,
    pub log: FfiLogFn,
    /// The host's `log::LevelFilter` as usize (0 = off)
    pub max_level: usize,
}

#[repr(C)]
pub struct FfiModuleVTable {
    pub instance: *mut c_void,
    pub capabilities: u32,
    pub name: extern "C-unwind" fn(instance: *const c_void) -> *mut c_char,
    pub initialize: extern "C-unwind" fn(instance: *const c_void, host: *const FfiHostContext, err_out: FfiStringOut) -> FfiResult,
    pub dispose: extern "C-unwind" fn(instance: *const c_void, err_out: FfiStringOut) -> FfiResult,
    /// Frees the instance and the vtable itself
    pub destroy: extern "C-unwind" fn(vtable: *mut FfiModuleVTable),
    pub free_string: FfiFreeString,

    pub process: Option<extern "C-unwind" fn(instance: *const c_void, input: *const u8, input_len: usize, out: FfiStringOut) -> FfiResult>,
    pub last_response: Option<extern "C-unwind" fn(instance: *const c_void) -> *mut c_char>,
    pub on_typed: Option<extern "C-unwind" fn(instance: *const c_void, name: *const c_char, payload_json: *const c_char, err_out: FfiStringOut) -> FfiResult>,
    pub on_warmup: Option<extern "C-unwind" fn(instance: *const c_void, err_out: FfiStringOut) -> FfiResult>,
    pub on_system_event: Option<extern "C-unwind" fn(instance: *const c_void, name: *const c_char, payload_json: *const c_char, err_out: FfiStringOut) -> FfiResult>,
    pub on_named_event: Option<extern "C-unwind" fn(instance: *const c_void, name: *const c_char, err_out: FfiStringOut) -> FfiResult>,
    pub on_enable: Option<extern "C-unwind" fn(instance: *const c_void, err_out: FfiStringOut) -> FfiResult>,
    pub on_disable: Option<extern "C-unwind" fn(instance: *const c_void, err_out: FfiStringOut) -> FfiResult>,
}

/// One discoverable type in a module library
#[repr(C)]
pub struct FfiModuleEntry {
    pub type_name: *const c_char,
    pub namespace: *const c_char,
    pub category: *const c_char,
    pub marked: bool,
    /// Null when the type has no parameterless constructor
    pub construct: Option<FfiConstruct>,
}

#[repr(C)]
pub struct FfiModuleCatalog {
    /// API version the library was built against
    pub api_version: *const c_char,
    pub entries: *const FfiModuleEntry,
    pub entry_count: usize,
    /// Simple names of other module libraries this one needs loaded first
    pub requires: *const *const c_char,
    pub requires_count: usize,
    pub free_string: FfiFreeString,
}

/// Safely converts an FFI C string pointer to a Rust String.
/// # Safety
/// `ptr` must be null or point to a null-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn ffi_string_from_ptr(ptr: *const c_char) -> Result<String, FfiResult> {
    if ptr.is_null() {
        return Err(FfiResult::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_owned())
        .map_err(|_| FfiResult::Utf8Error)
}

/// Same as [`ffi_string_from_ptr`] but null maps to `None`.
/// # Safety
/// See [`ffi_string_from_ptr`].
pub unsafe fn ffi_opt_string_from_ptr(ptr: *const c_char) -> Result<Option<String>, FfiResult> {
    if ptr.is_null() {
        Ok(None)
    } else {
        unsafe { ffi_string_from_ptr(ptr) }.map(Some)
    }
}

/// Borrows `len` bytes at `ptr` as UTF-8. A zero length never reads `ptr`.
/// # Safety
/// Unless `len` is zero, `ptr` must point to `len` readable bytes that stay
/// valid for `'a`.
pub unsafe fn ffi_str_from_raw<'a>(ptr: *const u8, len: usize) -> Result<&'a str, FfiResult> {
    if len == 0 {
        return Ok("");
    }
    if ptr.is_null() {
        return Err(FfiResult::NullPointer);
    }
    std::str::from_utf8(unsafe { std::slice::from_raw_parts(ptr, len) }).map_err(|_| FfiResult::Utf8Error)
}

pub fn level_from_usize(level: usize) -> Option<log::Level> {
    match level {
        1 => Some(log::Level::Error),
        2 => Some(log::Level::Warn),
        3 => Some(log::Level::Info),
        4 => Some(log::Level::Debug),
        5 => Some(log::Level::Trace),
        _ => None,
    }
}

pub fn level_filter_from_usize(level: usize) -> log::LevelFilter {
    level_from_usize(level).map_or(log::LevelFilter::Off, |l| l.to_level_filter())
}

/// Takes ownership of a plugin-allocated string, frees it, returns a copy.
/// # Safety
/// `ptr` must be null or a string allocated by the library owning `free`.
pub(crate) unsafe fn take_string(ptr: *mut c_char, free: FfiFreeString) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    free(ptr);
    Some(s)
}

/// Plain type/catalog metadata read from an [`FfiModuleEntry`]
#[derive(Debug, Clone)]
pub(crate) struct FfiEntryInfo {
    pub type_name: String,
    pub namespace: String,
    pub category: String,
    pub marked: bool,
    pub construct: Option<FfiConstruct>,
}

/// Reads the catalog's entries.
/// # Safety
/// `catalog` must point to a live catalog of a loaded library.
pub(crate) unsafe fn read_entries(catalog: &FfiModuleCatalog, binary: &str) -> Result<Vec<FfiEntryInfo>, ModuleSystemError> {
    if catalog.entry_count == 0 {
        return Ok(Vec::new());
    }
    if catalog.entries.is_null() {
        return Err(ModuleSystemError::InvalidCatalog {
            binary: binary.to_string(),
            message: format!("{} entries announced but entry table is null", catalog.entry_count),
        });
    }
    let entries = unsafe { std::slice::from_raw_parts(catalog.entries, catalog.entry_count) };
    entries
        .iter()
        .map(|entry| {
            let invalid = |field: &str, e: FfiResult| ModuleSystemError::InvalidCatalog {
                binary: binary.to_string(),
                message: format!("entry {}: {:?}", field, e),
            };
            Ok(FfiEntryInfo {
                type_name: unsafe { ffi_string_from_ptr(entry.type_name) }.map_err(|e| invalid("type_name", e))?,
                namespace: unsafe { ffi_opt_string_from_ptr(entry.namespace) }
                    .map_err(|e| invalid("namespace", e))?
                    .unwrap_or_default(),
                category: unsafe { ffi_opt_string_from_ptr(entry.category) }
                    .map_err(|e| invalid("category", e))?
                    .unwrap_or_default(),
                marked: entry.marked,
                construct: entry.construct,
            })
        })
        .collect()
}

/// Reads the catalog's `requires` list.
/// # Safety
/// `catalog` must point to a live catalog of a loaded library.
pub(crate) unsafe fn read_requires(catalog: &FfiModuleCatalog, binary: &str) -> Result<Vec<String>, ModuleSystemError> {
    if catalog.requires_count == 0 || catalog.requires.is_null() {
        return Ok(Vec::new());
    }
    let names = unsafe { std::slice::from_raw_parts(catalog.requires, catalog.requires_count) };
    names
        .iter()
        .map(|&p| {
            unsafe { ffi_string_from_ptr(p) }.map_err(|e| ModuleSystemError::InvalidCatalog {
                binary: binary.to_string(),
                message: format!("requires: {:?}", e),
            })
        })
        .collect()
}

fn host_manager<'a>(host: *const c_void) -> &'a ModuleManager {
    // Only ever built by `host_context` from a live `&ModuleManager`
    unsafe { &*(host as *const ModuleManager) }
}

fn host_string(value: &str) -> *mut c_char {
    CString::new(value.replace('\0', "")).map_or(ptr::null_mut(), CString::into_raw)
}

extern "C-unwind" fn host_module_count(host: *const c_void) -> usize {
    guarded(|| host_manager(host).module_count()).unwrap_or(0)
}

extern "C-unwind" fn host_all_names(host: *const c_void) -> *mut c_char {
    match guarded(|| serde_json::to_string(&host_manager(host).all_names())) {
        Ok(Ok(json)) => host_string(&json),
        _ => ptr::null_mut(),
    }
}

extern "C-unwind" fn host_has_module(host: *const c_void, name: *const u8, name_len: usize) -> bool {
    let Ok(name) = (unsafe { ffi_str_from_raw(name, name_len) }) else {
        return false;
    };
    guarded(|| host_manager(host).get_instance_by_name(name).is_some()).unwrap_or(false)
}

extern "C-unwind" fn host_invoke_by_name(
    host: *const c_void,
    name: *const u8,
    name_len: usize,
    input: *const u8,
    input_len: usize,
    out: FfiStringOut,
) -> FfiResult {
    let name = match unsafe { ffi_str_from_raw(name, name_len) } {
        Ok(s) => s,
        Err(e) => return e,
    };
    let input = match unsafe { ffi_str_from_raw(input, input_len) } {
        Ok(s) => s,
        Err(e) => return e,
    };
    let (answer, result) = match guarded(|| host_manager(host).invoke_by_name(name, input)) {
        Ok(Some(answer)) => (answer, FfiResult::Ok),
        Ok(None) => return FfiResult::Unhandled,
        Err(panic_msg) => (format!("panic: {}", panic_msg), FfiResult::Panic),
    };
    if !out.is_null() {
        unsafe { *out = host_string(&answer) };
    }
    result
}

extern "C-unwind" fn host_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

extern "C-unwind" fn host_log(level: usize, target: *const u8, target_len: usize, message: *const u8, message_len: usize) {
    let Some(level) = level_from_usize(level) else {
        return;
    };
    let (Ok(target), Ok(message)) = (unsafe { ffi_str_from_raw(target, target_len) }, unsafe {
        ffi_str_from_raw(message, message_len)
    }) else {
        return;
    };
    log::logger().log(
        &log::Record::builder()
            .level(level)
            .target(target)
            .args(format_args!("{}", message))
            .build(),
    );
}

/// Callback table over `manager`, valid while the borrow lasts
pub(crate) fn host_context(manager: &ModuleManager) -> FfiHostContext {
    FfiHostContext {
        host: manager as *const ModuleManager as *const c_void,
        module_count: host_module_count,
        all_names: host_all_names,
        has_module: host_has_module,
        invoke_by_name: host_invoke_by_name,
        free_string: host_free_string,
        log: host_log,
        max_level: log::max_level() as usize,
    }
}

#[derive(Debug, Clone, Copy)]
struct UnsafeVTablePtr(*mut FfiModuleVTable);
// The plugin side owns synchronization of its instance; the vtable pointer
// itself is immutable after construction.
unsafe impl Send for UnsafeVTablePtr {}
unsafe impl Sync for UnsafeVTablePtr {}

/// Host-side adapter for a module living in a native library
pub struct FfiModule {
    vtable: UnsafeVTablePtr,
    name_cache: String,
    type_name: String,
    // Dropped after the instance is destroyed
    _library: Arc<Library>,
}

impl FfiModule {
    /// Constructs one instance through `construct`.
    /// # Safety
    /// `construct` must come from the catalog of `library`.
    pub(crate) unsafe fn construct(
        construct: FfiConstruct,
        free_string: FfiFreeString,
        type_name: &str,
        library: Arc<Library>,
    ) -> Result<Self, ModuleSystemError> {
        let mut err: *mut c_char = ptr::null_mut();
        let err_ptr: FfiStringOut = &mut err;
        let vtable_ptr = guarded(|| construct(err_ptr)).map_err(|panic_msg| ModuleSystemError::InstantiationError {
            type_name: type_name.to_string(),
            message: format!("panic: {}", panic_msg),
        })?;

        if vtable_ptr.is_null() {
            let message = unsafe { take_string(err, free_string) }
                .unwrap_or_else(|| "constructor returned a null instance".to_string());
            let cause = ModuleSystemError::FfiError {
                module: type_name.to_string(),
                operation: "construct".to_string(),
                message,
            };
            return Err(ModuleSystemError::InstantiationError {
                type_name: type_name.to_string(),
                message: cause.to_string(),
            });
        }

        let vtable = unsafe { &*vtable_ptr };
        let name_ptr = guarded(|| (vtable.name)(vtable.instance as *const c_void)).unwrap_or(ptr::null_mut());
        let name_cache = unsafe { take_string(name_ptr, vtable.free_string) }.unwrap_or_default();

        Ok(Self {
            vtable: UnsafeVTablePtr(vtable_ptr),
            name_cache,
            type_name: type_name.to_string(),
            _library: library,
        })
    }

    fn vtable(&self) -> &FfiModuleVTable {
        // Non-null and live until Drop
        unsafe { &*self.vtable.0 }
    }

    fn instance(&self) -> *const c_void {
        self.vtable().instance as *const c_void
    }

    fn has(&self, cap: u32) -> bool {
        self.vtable().capabilities & cap != 0
    }

    fn ffi_error(&self, operation: &str, message: impl Into<String>) -> ModuleError {
        ModuleSystemError::FfiError {
            module: self.name_cache.clone(),
            operation: operation.to_string(),
            message: message.into(),
        }
        .into()
    }

    fn map_result(&self, res: FfiResult, err: *mut c_char, operation: &str) -> ModuleResult<Delivery> {
        let message = unsafe { take_string(err, self.vtable().free_string) };
        match res {
            FfiResult::Ok => Ok(Delivery::Handled),
            FfiResult::Unhandled => Ok(Delivery::Unhandled),
            other => Err(self.ffi_error(operation, message.unwrap_or_else(|| format!("{:?}", other)))),
        }
    }

    /// Calls a slot that only takes the instance and an error out-parameter
    fn call_simple(
        &self,
        slot: Option<extern "C-unwind" fn(*const c_void, FfiStringOut) -> FfiResult>,
        operation: &str,
    ) -> ModuleResult<Delivery> {
        let Some(f) = slot else {
            return Ok(Delivery::Unhandled);
        };
        let mut err: *mut c_char = ptr::null_mut();
        let err_ptr: FfiStringOut = &mut err;
        let res = f(self.instance(), err_ptr);
        self.map_result(res, err, operation)
    }

    fn call_event(
        &self,
        slot: Option<extern "C-unwind" fn(*const c_void, *const c_char, *const c_char, FfiStringOut) -> FfiResult>,
        name: &str,
        payload: Option<&dyn Any>,
        operation: &str,
    ) -> ModuleResult<Delivery> {
        let Some(f) = slot else {
            return Ok(Delivery::Unhandled);
        };
        let c_name = CString::new(name).map_err(|e| self.ffi_error(operation, e.to_string()))?;
        let c_payload = payload
            .and_then(payload_as_json)
            .map(|v| CString::new(v.to_string()))
            .transpose()
            .map_err(|e| self.ffi_error(operation, e.to_string()))?;
        let payload_ptr = c_payload.as_ref().map(|c| c.as_ptr()).unwrap_or(ptr::null());
        let mut err: *mut c_char = ptr::null_mut();
        let err_ptr: FfiStringOut = &mut err;
        let res = f(self.instance(), c_name.as_ptr(), payload_ptr, err_ptr);
        self.map_result(res, err, operation)
    }
}

impl Drop for FfiModule {
    fn drop(&mut self) {
        if !self.vtable.0.is_null() {
            let vtable_ptr = self.vtable.0;
            let destroy = self.vtable().destroy;
            if let Err(panic_msg) = guarded(|| destroy(vtable_ptr)) {
                log::warn!("Module '{}' panicked while being destroyed: {}", self.name_cache, panic_msg);
            }
            self.vtable.0 = ptr::null_mut();
        }
        // `_library` is released after this, once the instance is gone
    }
}

impl Module for FfiModule {
    fn name(&self) -> &str {
        &self.name_cache
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn initialize(&self, ctx: &dyn ModuleContext) -> ModuleResult<()> {
        let Some(manager) = ctx.manager() else {
            return Err(self.ffi_error("initialize", "native modules need the in-process manager as context"));
        };
        let host = host_context(manager);
        let mut err: *mut c_char = ptr::null_mut();
        let err_ptr: FfiStringOut = &mut err;
        let res = (self.vtable().initialize)(self.instance(), &host, err_ptr);
        self.map_result(res, err, "initialize").map(|_| ())
    }

    fn dispose(&self) -> ModuleResult<()> {
        let mut err: *mut c_char = ptr::null_mut();
        let err_ptr: FfiStringOut = &mut err;
        let res = (self.vtable().dispose)(self.instance(), err_ptr);
        self.map_result(res, err, "dispose").map(|_| ())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        (self.has(CAP_PROCESS) && self.vtable().process.is_some()).then_some(self as &dyn Processor)
    }

    fn as_last_response(&self) -> Option<&dyn LastResponseProvider> {
        (self.has(CAP_LAST_RESPONSE) && self.vtable().last_response.is_some())
            .then_some(self as &dyn LastResponseProvider)
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        self.has(CAP_EVENTS).then_some(self as &dyn EventReceiver)
    }

    fn as_toggleable(&self) -> Option<&dyn Toggleable> {
        self.has(CAP_TOGGLE).then_some(self as &dyn Toggleable)
    }
}

impl Processor for FfiModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        let Some(process) = self.vtable().process else {
            return Ok(None);
        };
        let mut out: *mut c_char = ptr::null_mut();
        let out_ptr: FfiStringOut = &mut out;
        let res = process(self.instance(), input.as_ptr(), input.len(), out_ptr);
        let text = unsafe { take_string(out, self.vtable().free_string) };
        match res {
            FfiResult::Ok => Ok(text),
            FfiResult::Unhandled => Ok(None),
            other => Err(self.ffi_error("process", text.unwrap_or_else(|| format!("{:?}", other)))),
        }
    }
}

impl LastResponseProvider for FfiModule {
    fn last_response(&self) -> Option<String> {
        let f = self.vtable().last_response?;
        let ptr = f(self.instance());
        unsafe { take_string(ptr, self.vtable().free_string) }
    }
}

impl EventReceiver for FfiModule {
    fn on_typed(&self, name: &str, payload: &dyn Any) -> ModuleResult<Delivery> {
        if payload_as_json(payload).is_none() {
            return Ok(Delivery::Unhandled);
        }
        self.call_event(self.vtable().on_typed, name, Some(payload), "on_typed")
    }

    fn on_warmup(&self) -> ModuleResult<Delivery> {
        self.call_simple(self.vtable().on_warmup, "on_warmup")
    }

    fn on_system_event(&self, name: &str, payload: Option<&dyn Any>) -> ModuleResult<Delivery> {
        self.call_event(self.vtable().on_system_event, name, payload, "on_system_event")
    }

    fn on_named_event(&self, name: &str) -> ModuleResult<Delivery> {
        let Some(f) = self.vtable().on_named_event else {
            return Ok(Delivery::Unhandled);
        };
        let c_name = CString::new(name).map_err(|e| self.ffi_error("on_named_event", e.to_string()))?;
        let mut err: *mut c_char = ptr::null_mut();
        let err_ptr: FfiStringOut = &mut err;
        let res = f(self.instance(), c_name.as_ptr(), err_ptr);
        self.map_result(res, err, "on_named_event")
    }
}

impl Toggleable for FfiModule {
    fn on_enable(&self) -> ModuleResult<()> {
        self.call_simple(self.vtable().on_enable, "on_enable").map(|_| ())
    }

    fn on_disable(&self) -> ModuleResult<()> {
        self.call_simple(self.vtable().on_disable, "on_disable").map(|_| ())
    }
}
