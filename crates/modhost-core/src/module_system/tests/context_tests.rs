#![cfg(test)]

use std::ptr;

use crate::module_system::candidate::ModuleCandidate;
use crate::module_system::context::ModuleContext;
use crate::module_system::export::HostContext;
use crate::module_system::ffi::{FfiResult, ffi_str_from_raw, host_context, level_filter_from_usize, level_from_usize};
use crate::module_system::tests::support::{FooModule, ThrowingModule, manager_with};

#[test]
fn test_manager_is_its_own_context() {
    let manager = manager_with(vec![ModuleCandidate::of::<FooModule>()]);
    manager.load_modules(true);

    let ctx: &dyn ModuleContext = &manager;
    assert_eq!(ctx.module_count(), 1);
    assert_eq!(ctx.all_names(), vec!["Foo"]);
    assert!(ctx.has_module("foo"));
    assert!(!ctx.has_module("Missing"));
    assert_eq!(ctx.invoke_by_name("Foo", "ping").as_deref(), Some("foo:ping"));
    assert!(ctx.manager().is_some());
}

#[test]
fn test_callback_table_reaches_the_manager() {
    let manager = manager_with(vec![ModuleCandidate::of::<FooModule>(), ModuleCandidate::of::<ThrowingModule>()]);
    manager.load_modules(true);

    let table = host_context(&manager);
    let ctx = HostContext::new(&table);

    assert!(ctx.manager().is_none());
    assert_eq!(ctx.module_count(), 2);
    assert_eq!(ctx.all_names(), vec!["Foo", "Thrower"]);
    assert!(ctx.has_module("Thrower"));
    assert!(!ctx.has_module("Missing"));

    assert_eq!(ctx.invoke_by_name("Foo", "ping").as_deref(), Some("foo:ping"));
    assert_eq!(ctx.invoke_by_name("Missing", "ping"), None);

    // Errors come back as the usual dispatch text
    let answer = ctx.invoke_by_name("Thrower", "error").unwrap();
    assert!(answer.contains("Thrower invocation error"), "unexpected answer: {}", answer);
}

#[test]
fn test_callback_table_passes_interior_nul() {
    let manager = manager_with(vec![ModuleCandidate::of::<ThrowingModule>()]);
    manager.load_modules(true);

    let table = host_context(&manager);
    let ctx = HostContext::new(&table);

    // The input arrives intact; NULs are only dropped from the returned C string
    assert_eq!(ctx.invoke_by_name("Thrower", "a\0b").as_deref(), Some("ab"));
    assert_eq!(manager.invoke_by_name("Thrower", "a\0b").as_deref(), Some("a\0b"));
}

#[test]
fn test_str_from_raw() {
    let text = "héllo";
    assert_eq!(unsafe { ffi_str_from_raw(text.as_ptr(), text.len()) }, Ok("héllo"));
    assert_eq!(unsafe { ffi_str_from_raw(ptr::null(), 0) }, Ok(""));
    assert_eq!(unsafe { ffi_str_from_raw(ptr::null(), 3) }, Err(FfiResult::NullPointer));

    let bad = [0xffu8, 0xfe];
    assert_eq!(unsafe { ffi_str_from_raw(bad.as_ptr(), bad.len()) }, Err(FfiResult::Utf8Error));
}

#[test]
fn test_log_levels_cross_as_integers() {
    for level in [log::Level::Error, log::Level::Warn, log::Level::Info, log::Level::Debug, log::Level::Trace] {
        assert_eq!(level_from_usize(level as usize), Some(level));
    }
    assert_eq!(level_from_usize(0), None);
    assert_eq!(level_from_usize(6), None);

    assert_eq!(level_filter_from_usize(log::LevelFilter::Info as usize), log::LevelFilter::Info);
    assert_eq!(level_filter_from_usize(log::LevelFilter::Off as usize), log::LevelFilter::Off);
}
