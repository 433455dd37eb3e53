#![cfg(test)]

use std::sync::atomic::Ordering;

use crate::module_system::error::ModuleSystemError;
use crate::module_system::manager::ModuleManager;
use crate::module_system::tests::support::{AnonymousModule, FailingInitModule, FooModule, ToggleModule, wrap};
use crate::module_system::wrapper::ModuleState;

#[test]
fn test_name_falls_back_to_simple_type_name() {
    let wrapper = wrap(AnonymousModule, "");
    assert_eq!(wrapper.declared_name(), "");
    assert_eq!(wrapper.name(), "AnonymousModule");
    assert!(wrapper.type_name().ends_with("::AnonymousModule"));
}

#[test]
fn test_initialize_is_idempotent() {
    let manager = ModuleManager::new();
    let wrapper = wrap(FooModule::default(), "");
    assert_eq!(wrapper.state(), ModuleState::Uninitialized);

    wrapper.initialize(&manager).expect("first initialize");
    wrapper.initialize(&manager).expect("second initialize is a no-op");
    assert!(wrapper.is_initialized());
}

#[test]
fn test_failed_initialize_leaves_wrapper_uninitialized() {
    let manager = ModuleManager::new();
    let wrapper = wrap(FailingInitModule, "");

    let err = wrapper.initialize(&manager).unwrap_err();
    match err {
        ModuleSystemError::InitializationError { type_name, message } => {
            assert!(type_name.contains("FailingInitModule"));
            assert_eq!(message, "init refused");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(wrapper.state(), ModuleState::Uninitialized);
    assert_eq!(wrapper.last_error().as_deref(), Some("init refused"));
}

#[test]
fn test_dispose_marks_disposed_even_when_hook_fails() {
    let manager = ModuleManager::new();
    let wrapper = wrap(ToggleModule::default(), "");
    wrapper.initialize(&manager).unwrap();

    assert!(matches!(wrapper.dispose(), Err(ModuleSystemError::DisposeError { .. })));
    assert_eq!(wrapper.state(), ModuleState::Disposed);
    // Second dispose does not call the hook again
    assert!(wrapper.dispose().is_ok());
    // A disposed wrapper cannot come back
    assert!(wrapper.initialize(&manager).is_err());
}

#[test]
fn test_toggle_hooks_run_only_on_change() {
    let wrapper = wrap(ToggleModule::default(), "");
    assert!(wrapper.is_enabled());

    wrapper.set_enabled(true);
    wrapper.set_enabled(false);
    wrapper.set_enabled(false);
    wrapper.set_enabled(true);

    let module = wrapper.downcast_ref::<ToggleModule>().unwrap();
    assert_eq!(module.disabled_calls.load(Ordering::SeqCst), 1);
    assert_eq!(module.enabled_calls.load(Ordering::SeqCst), 1);
    assert!(wrapper.is_enabled());
}

#[test]
fn test_log_is_capped() {
    let wrapper = wrap(FooModule::default(), "");
    for i in 0..150 {
        wrapper.push_log(format!("entry {}", i));
    }
    let logs = wrapper.logs();
    assert_eq!(logs.len(), 100);
    assert_eq!(logs.first().map(String::as_str), Some("entry 50"));
    assert_eq!(logs.last().map(String::as_str), Some("entry 149"));
}

#[test]
fn test_view_reflects_runtime_controls() {
    let wrapper = wrap(FooModule::default(), "extensions");
    wrapper.set_timeout_ms(250);
    wrapper.set_enabled(false);

    let view = wrapper.view();
    assert_eq!(view.name, "Foo");
    assert_eq!(view.category, "extensions");
    assert_eq!(view.state, ModuleState::Uninitialized);
    assert!(!view.enabled);
    assert_eq!(view.timeout_ms, 250);
}
