#![cfg(test)]

use std::sync::atomic::Ordering;

use crate::module_system::manager::ModuleManager;
use crate::module_system::settings::ModuleSetting;
use crate::module_system::tests::support::{FooModule, ToggleModule};

#[test]
fn test_apply_settings_matches_names_case_insensitively() {
    let manager = ModuleManager::new();
    let toggle = manager.register_builtin_module(Box::new(ToggleModule::default()), "");
    let foo = manager.register_builtin_module(Box::new(FooModule::default()), "");

    let applied = manager.apply_settings(&[
        ModuleSetting::new("toggle").enabled(false),
        ModuleSetting::new("FOO").timeout_ms(300),
        ModuleSetting::new("ghost").enabled(false),
    ]);

    assert_eq!(applied, 2);
    assert!(!toggle.is_enabled());
    assert_eq!(
        toggle.downcast_ref::<ToggleModule>().unwrap().disabled_calls.load(Ordering::SeqCst),
        1
    );
    assert!(foo.is_enabled());
    assert_eq!(foo.timeout_ms(), 300);
}

#[test]
fn test_module_settings_round_trip_through_apply() {
    let manager = ModuleManager::new();
    let foo = manager.register_builtin_module(Box::new(FooModule::default()), "");
    foo.set_timeout_ms(42);
    foo.set_enabled(false);

    let saved = manager.module_settings();
    assert_eq!(saved, vec![ModuleSetting::new("Foo").enabled(false).timeout_ms(42)]);

    foo.set_enabled(true);
    foo.set_timeout_ms(0);
    manager.apply_settings(&saved);
    assert!(!foo.is_enabled());
    assert_eq!(foo.timeout_ms(), 42);
}

#[test]
fn test_setting_deserializes_with_missing_fields() {
    let setting: ModuleSetting = serde_json::from_str(r#"{"name": "Echo"}"#).unwrap();
    assert_eq!(setting, ModuleSetting::new("Echo"));
    let json = serde_json::to_string(&setting).unwrap();
    assert_eq!(json, r#"{"name":"Echo"}"#);
}
