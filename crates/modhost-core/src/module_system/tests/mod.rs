pub mod support;
pub mod wrapper_tests;
pub mod loader_tests;
pub mod resolver_tests;
pub mod settings_tests;
pub mod context_tests;
