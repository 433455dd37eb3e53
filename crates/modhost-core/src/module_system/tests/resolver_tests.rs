#![cfg(test)]

use std::fs;

use tempfile::tempdir;

use crate::module_system::error::ModuleSystemError;
use crate::module_system::loader::ModuleLoader;
use crate::module_system::resolver::find_in_roots;

fn lib_name(name: &str) -> String {
    format!("{}{}.{}", std::env::consts::DLL_PREFIX, name, std::env::consts::DLL_EXTENSION)
}

#[test]
fn test_find_in_roots_searches_recursively_in_root_order() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let deep = first.path().join("a").join("b");
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join(lib_name("shared_dep")), b"x").unwrap();
    fs::write(second.path().join(lib_name("shared_dep")), b"x").unwrap();

    let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
    let found = find_in_roots(&roots, "shared_dep").expect("dependency should be found");
    assert!(found.starts_with(first.path()));

    assert!(find_in_roots(&roots, "other_dep").is_none());
}

#[test]
fn test_find_in_roots_is_not_limited_to_modules_folders() {
    let root = tempdir().unwrap();
    fs::write(root.path().join(lib_name("helper")), b"x").unwrap();
    let found = find_in_roots(&[root.path().to_path_buf()], "HELPER");
    assert!(found.is_some());
}

#[test]
fn test_unresolved_dependency_error() {
    let root = tempdir().unwrap();
    let mut loader = ModuleLoader::default();
    loader.add_search_path(root.path());

    let err = loader.resolve_dependency("consumer", "ghost", true).unwrap_err();
    match err {
        ModuleSystemError::UnresolvedDependency { binary, dependency } => {
            assert_eq!(binary, "consumer");
            assert_eq!(dependency, "ghost");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_found_but_broken_dependency_is_unresolved() {
    let root = tempdir().unwrap();
    fs::write(root.path().join(lib_name("broken_dep")), b"not a library").unwrap();
    let mut loader = ModuleLoader::default();
    loader.add_search_path(root.path());

    let err = loader.resolve_dependency("consumer", "broken_dep", false).unwrap_err();
    assert!(matches!(err, ModuleSystemError::UnresolvedDependency { .. }));
    assert!(!loader.is_loaded("broken_dep"));
}

#[test]
fn test_already_loaded_dependency_resolves_immediately() {
    let mut loader = ModuleLoader::default();
    loader.register_static("core_memory", Vec::new());
    assert!(loader.resolve_dependency("consumer", "Core_Memory", false).is_ok());
}
