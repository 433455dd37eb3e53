#![cfg(test)]

use crate::utils::{guarded, names_match, panic_message};

#[test]
fn test_guarded_passes_values_through() {
    assert_eq!(guarded(|| 41 + 1), Ok(42));
}

#[test]
fn test_guarded_catches_static_and_formatted_panics() {
    let err = guarded(|| -> () { panic!("static message") }).unwrap_err();
    assert_eq!(err, "static message");

    let code = 7;
    let err = guarded(|| -> () { panic!("formatted {}", code) }).unwrap_err();
    assert_eq!(err, "formatted 7");
}

#[test]
fn test_panic_message_of_unknown_payload() {
    let payload: Box<dyn std::any::Any + Send> = Box::new(12_u32);
    assert_eq!(panic_message(payload), "Unknown panic reason");
}

#[test]
fn test_names_match_ignores_case() {
    assert!(names_match("Memory", "memory"));
    assert!(names_match("ÉCHO", "écho"));
    assert!(!names_match("Memory", "Memo"));
}
