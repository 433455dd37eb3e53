use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Find files recursively in a directory that match a predicate
pub fn find_files<P, F>(path: P, predicate: &F) -> io::Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    F: Fn(&Path) -> bool + ?Sized,
{
    let mut result = Vec::new();

    if !path.as_ref().exists() {
        return Ok(result);
    }

    if path.as_ref().is_file() {
        if predicate(path.as_ref()) {
            result.push(path.as_ref().to_path_buf());
        }
        return Ok(result);
    }

    let mut entries = fs::read_dir(path)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    // Directory order is filesystem dependent; sort for stable discovery order
    entries.sort();

    for entry_path in entries {
        if entry_path.is_file() {
            if predicate(&entry_path) {
                result.push(entry_path);
            }
        } else if entry_path.is_dir() {
            // Unreadable subdirectories are skipped, not fatal
            if let Ok(mut sub_results) = find_files(&entry_path, predicate) {
                result.append(&mut sub_results);
            }
        }
    }

    Ok(result)
}

/// Top-level subdirectories of `path`, sorted. Missing or unreadable paths yield nothing.
pub fn list_subdirectories<P: AsRef<Path>>(path: P) -> Vec<PathBuf> {
    let mut dirs = match fs::read_dir(path) {
        Ok(rd) => rd
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect::<Vec<_>>(),
        Err(_) => Vec::new(),
    };
    dirs.sort();
    dirs
}

/// Count files below `path`, recursively
pub fn count_files<P: AsRef<Path>>(path: P) -> io::Result<usize> {
    Ok(find_files(path, &|_: &Path| true)?.len())
}

/// Whether any directory component of `path` equals `dir_name` (case-insensitive)
pub fn has_dir_component(path: &Path, dir_name: &str) -> bool {
    path.parent()
        .map(|parent| {
            parent
                .components()
                .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case(dir_name))
        })
        .unwrap_or(false)
}

/// Whether `path` looks like a native dynamic library for this platform
pub fn is_native_library(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION))
        .unwrap_or(false)
}

/// Simple name of a library file: the file stem without the platform prefix
/// (`lib` on Unix). `Modules/libfoo.so` and `Modules/foo.dll` both give `foo`.
pub fn library_simple_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let prefix = std::env::consts::DLL_PREFIX;
    let simple = if !prefix.is_empty() && stem.starts_with(prefix) && stem.len() > prefix.len() {
        stem[prefix.len()..].to_string()
    } else {
        stem
    };
    if simple.trim().is_empty() { None } else { Some(simple) }
}

/// Platform file names a library with simple name `name` may have
pub fn library_file_names(name: &str) -> Vec<String> {
    let ext = std::env::consts::DLL_EXTENSION;
    let prefix = std::env::consts::DLL_PREFIX;
    let mut names = vec![format!("{}{}.{}", prefix, name, ext)];
    if !prefix.is_empty() {
        names.push(format!("{}.{}", name, ext));
    }
    names
}
