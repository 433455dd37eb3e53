use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;
use serde::Serialize;

use crate::utils::fs::{find_files, list_subdirectories};

/// Well-known folder names under the root and the kind of resource each holds
pub const EXTERNAL_RESOURCES: &[(&str, &str)] = &[
    ("Nginx", "Web Server"),
    ("nginx", "Web Server"),
    ("Apache", "Web Server"),
    ("php", "Runtime"),
    ("PHP", "Runtime"),
    ("Databases", "Data Storage"),
    ("wwwroot", "Web Content"),
    ("Admins", "Admin Instances"),
];

const CONFIG_EXTENSIONS: &[&str] = &["json", "conf", "config", "ini", "toml", "yaml", "yml"];
const MAX_FILES_PER_EXTENSION: usize = 100;
const EXCLUDED_DIRS: &[&str] = &["obj", "bin", "target"];
const ADMINS_DIR: &str = "Admins";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalResource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: PathBuf,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    pub root_directory: PathBuf,
    pub app_base_directory: PathBuf,
    pub discovery_time: SystemTime,
    pub module_folders: Vec<PathBuf>,
    pub external_resources: Vec<ExternalResource>,
    pub configuration_files: Vec<PathBuf>,
    pub admin_instances: Vec<PathBuf>,
}

/// Scans the working directory plus the `modules_dir` folder of every root
pub fn discover_environment(search_roots: &[PathBuf], modules_dir: &str) -> EnvironmentReport {
    let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover_in(&root, search_roots, modules_dir)
}

/// Same as [`discover_environment`] with an explicit root directory
pub fn discover_in(root: &Path, search_roots: &[PathBuf], modules_dir: &str) -> EnvironmentReport {
    let app_base_directory = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let report = EnvironmentReport {
        root_directory: root.to_path_buf(),
        app_base_directory,
        discovery_time: SystemTime::now(),
        module_folders: module_folders(root, search_roots, modules_dir),
        external_resources: external_resources(root),
        configuration_files: configuration_files(root),
        admin_instances: list_subdirectories(root.join(ADMINS_DIR)),
    };

    debug!(
        "Environment discovery in {}: {} module folders, {} external resources, {} configuration files, {} admin instances",
        report.root_directory.display(),
        report.module_folders.len(),
        report.external_resources.len(),
        report.configuration_files.len(),
        report.admin_instances.len()
    );
    report
}

fn module_folders(root: &Path, search_roots: &[PathBuf], modules_dir: &str) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut folders = Vec::new();
    let locations = std::iter::once(root.join(modules_dir)).chain(search_roots.iter().map(|r| r.join(modules_dir)));
    for location in locations {
        if !location.is_dir() {
            continue;
        }
        for folder in std::iter::once(location.clone()).chain(list_subdirectories(&location)) {
            if seen.insert(folder.clone()) {
                folders.push(folder);
            }
        }
    }
    folders
}

fn external_resources(root: &Path) -> Vec<ExternalResource> {
    let mut seen = HashSet::new();
    EXTERNAL_RESOURCES
        .iter()
        .filter_map(|(name, kind)| {
            let path = root.join(name);
            // Case-insensitive filesystems see `nginx` and `Nginx` as one folder
            let identity = path.canonicalize().ok()?;
            if !path.is_dir() || !seen.insert(identity) {
                return None;
            }
            Some(ExternalResource {
                name: name.to_string(),
                kind: kind.to_string(),
                path,
                exists: true,
            })
        })
        .collect()
}

fn is_excluded(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .parent()
        .map(|p| {
            p.components()
                .any(|c| EXCLUDED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
        })
        .unwrap_or(false)
}

fn configuration_files(root: &Path) -> Vec<PathBuf> {
    let all = find_files(root, &|p: &Path| {
        p.extension()
            .map(|ext| CONFIG_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
            .unwrap_or(false)
    })
    .unwrap_or_default();

    let mut files = Vec::new();
    for extension in CONFIG_EXTENSIONS {
        files.extend(
            all.iter()
                .filter(|p| {
                    p.extension()
                        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                        .unwrap_or(false)
                })
                .filter(|p| !is_excluded(p, root))
                .take(MAX_FILES_PER_EXTENSION)
                .cloned(),
        );
    }
    files
}
