#![cfg(test)]

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::module_system::candidate::ModuleCandidate;
use crate::module_system::loader::ModuleLoader;
use crate::module_system::tests::support::{FooModule, MemoryModule};

fn lib_file(dir: &Path, name: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!(
        "{}{}.{}",
        std::env::consts::DLL_PREFIX,
        name,
        std::env::consts::DLL_EXTENSION
    ));
    fs::write(&path, b"not a real library").unwrap();
    path
}

#[test]
fn test_add_search_path_dedups_and_ignores_missing() {
    let dir = tempdir().unwrap();
    let mut loader = ModuleLoader::default();

    assert!(loader.add_search_path(dir.path()));
    assert!(!loader.add_search_path(&dir.path().join(".")));
    // Differently cased spelling: either the same folder or nonexistent
    let upper = dir.path().to_string_lossy().to_uppercase();
    assert!(!loader.add_search_path(Path::new(&upper)));
    assert!(!loader.add_search_path(&dir.path().join("missing")));
    assert!(!loader.add_search_path(Path::new("")));

    assert_eq!(loader.search_roots().len(), 1);
    assert!(loader.search_roots()[0].is_absolute());
}

#[test]
fn test_discover_binaries_only_under_modules_folders() {
    let dir = tempdir().unwrap();
    let wanted = lib_file(&dir.path().join("Modules"), "alpha");
    let nested = lib_file(&dir.path().join("Modules").join("extra"), "beta");
    lib_file(&dir.path().join("elsewhere"), "gamma");
    fs::write(dir.path().join("Modules").join("notes.txt"), "x").unwrap();

    let mut loader = ModuleLoader::default();
    loader.add_search_path(dir.path());

    let found = loader.discover_binaries();
    let canonical = |p: &Path| p.canonicalize().unwrap();
    let found: Vec<_> = found.iter().map(|p| canonical(p)).collect();
    assert_eq!(found.len(), 2);
    assert!(found.contains(&canonical(&wanted)));
    assert!(found.contains(&canonical(&nested)));
}

#[test]
fn test_bad_binaries_are_reported_not_fatal() {
    let dir = tempdir().unwrap();
    lib_file(&dir.path().join("Modules"), "broken_one");
    lib_file(&dir.path().join("Modules"), "broken_two");

    let mut loader = ModuleLoader::default();
    loader.add_search_path(dir.path());

    let mut errors = Vec::new();
    let loaded = loader.load_from_roots(&mut errors, true);
    assert_eq!(loaded, 0);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.contains("broken_one")));
    assert!(errors.iter().any(|e| e.contains("broken_two")));
    assert!(!loader.is_loaded("broken_one"));
}

#[test]
fn test_static_catalog_counts_as_loaded() {
    let mut loader = ModuleLoader::default();
    assert!(loader.register_static("Host", vec![ModuleCandidate::of::<FooModule>()]));
    assert!(loader.is_loaded("host"));
    assert!(!loader.register_static("HOST", vec![ModuleCandidate::of::<MemoryModule>()]));

    let mut errors = Vec::new();
    let candidates = loader.enumerate_candidates(&mut errors, false);
    assert!(errors.is_empty());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].binary, "Host");
    assert_eq!(loader.loaded_binaries(), vec!["Host"]);
}

#[test]
fn test_custom_modules_dir_name() {
    let dir = tempdir().unwrap();
    lib_file(&dir.path().join("plugins"), "alpha");
    lib_file(&dir.path().join("Modules"), "beta");

    let mut loader = ModuleLoader::new("plugins");
    loader.add_search_path(dir.path());
    let found = loader.discover_binaries();
    assert_eq!(found.len(), 1);
    assert!(found[0].to_string_lossy().contains("alpha"));
}
