use std::os::raw::c_char;

// The host looks for `_module_catalog`; this name never matches.
#[unsafe(no_mangle)]
pub extern "C" fn _module_catalog_misspelled() -> *const c_char {
    std::ptr::null()
}
