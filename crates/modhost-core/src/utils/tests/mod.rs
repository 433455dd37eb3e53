pub mod guard_tests;
