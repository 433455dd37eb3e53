use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use log::debug;
use semver::{Version, VersionReq};

use crate::kernel::constants::{API_VERSION, CATALOG_SYMBOL, DIAG_TARGET, MODULES_DIR_NAME};
use crate::module_system::candidate::ModuleCandidate;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::ffi::{FfiCatalogFn, FfiModuleCatalog, ffi_string_from_ptr, read_entries, read_requires};
use crate::utils::fs::{find_files, has_dir_component, is_native_library, library_simple_name};
use crate::utils::guarded;

#[derive(Debug, Clone, Copy)]
struct CatalogPtr(*const FfiModuleCatalog);
// Points into a library kept alive by the same `NativeBinary`
unsafe impl Send for CatalogPtr {}
unsafe impl Sync for CatalogPtr {}

/// A module library loaded into the process
pub(crate) struct NativeBinary {
    name: String,
    catalog: CatalogPtr,
    library: Arc<Library>,
}

impl NativeBinary {
    fn catalog(&self) -> &FfiModuleCatalog {
        // Non-null, checked at load; valid while `library` is loaded
        unsafe { &*self.catalog.0 }
    }

    fn requires(&self) -> Result<Vec<String>, ModuleSystemError> {
        unsafe { read_requires(self.catalog(), &self.name) }
    }

    fn candidates(&self) -> Result<Vec<ModuleCandidate>, ModuleSystemError> {
        let free_string = self.catalog().free_string;
        let entries = unsafe { read_entries(self.catalog(), &self.name) }?;
        Ok(entries
            .into_iter()
            .map(|e| {
                ModuleCandidate::native(
                    e.type_name,
                    e.namespace,
                    e.category,
                    e.marked,
                    self.name.clone(),
                    e.construct,
                    free_string,
                    Arc::clone(&self.library),
                )
            })
            .collect())
    }
}

/// Anything that contributes candidate types: a native library or a catalog
/// of types linked into the host.
pub(crate) enum ModuleBinary {
    Native(NativeBinary),
    Static { name: String, candidates: Vec<ModuleCandidate> },
}

impl ModuleBinary {
    pub(crate) fn name(&self) -> &str {
        match self {
            ModuleBinary::Native(b) => &b.name,
            ModuleBinary::Static { name, .. } => name,
        }
    }
}

/// Search roots, the loaded-name set and every binary loaded so far.
///
/// Binaries are never unloaded: the loaded-name set and the library handles
/// persist for the life of the loader, across reloads.
pub struct ModuleLoader {
    search_roots: Vec<PathBuf>,
    loaded_names: HashSet<String>,
    binaries: Vec<ModuleBinary>,
    modules_dir: String,
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(MODULES_DIR_NAME)
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("search_roots", &self.search_roots)
            .field("binaries", &self.binaries.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("modules_dir", &self.modules_dir)
            .finish()
    }
}

impl ModuleLoader {
    pub fn new(modules_dir: impl Into<String>) -> Self {
        Self {
            search_roots: Vec::new(),
            loaded_names: HashSet::new(),
            binaries: Vec::new(),
            modules_dir: modules_dir.into(),
        }
    }

    pub fn modules_dir(&self) -> &str {
        &self.modules_dir
    }

    /// Registers a root after resolving it to an absolute path. Missing paths
    /// and case-insensitive duplicates are ignored. Returns whether it was added.
    pub fn add_search_path(&mut self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        let Ok(full) = path.canonicalize() else {
            return false;
        };
        if !full.is_dir() {
            return false;
        }
        let key = full.to_string_lossy().to_lowercase();
        if self
            .search_roots
            .iter()
            .any(|r| r.to_string_lossy().to_lowercase() == key)
        {
            return false;
        }
        self.search_roots.push(full);
        true
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn is_loaded(&self, simple_name: &str) -> bool {
        self.loaded_names.contains(&simple_name.to_lowercase())
    }

    /// Simple names of every binary loaded so far, in load order
    pub fn loaded_binaries(&self) -> Vec<String> {
        self.binaries.iter().map(|b| b.name().to_string()).collect()
    }

    /// Library files under a `Modules` directory beneath any root
    pub fn discover_binaries(&self) -> Vec<PathBuf> {
        let modules_dir = self.modules_dir.clone();
        let predicate = move |p: &Path| is_native_library(p) && has_dir_component(p, &modules_dir);
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for root in &self.search_roots {
            if !root.is_dir() {
                continue;
            }
            for path in find_files(root, &predicate).unwrap_or_default() {
                if seen.insert(path.clone()) {
                    found.push(path);
                }
            }
        }
        found
    }

    /// Loads every not-yet-loaded binary found by [`discover_binaries`](Self::discover_binaries).
    /// Per-file failures are appended to `errors`.
    pub fn load_from_roots(&mut self, errors: &mut Vec<String>, diagnostics: bool) -> usize {
        let mut loaded = 0;
        for path in self.discover_binaries() {
            if diagnostics {
                debug!(target: DIAG_TARGET, "Loading module binary: {}", path.display());
            }
            match self.load_binary(&path) {
                Ok(true) => {
                    loaded += 1;
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "Module binary loaded: {}", path.display());
                    }
                }
                Ok(false) => {
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "Module binary already loaded, skipping: {}", path.display());
                    }
                }
                Err(e) => {
                    if diagnostics {
                        debug!(target: DIAG_TARGET, "ERROR: {}", e);
                    }
                    errors.push(e.to_string());
                }
            }
        }
        loaded
    }

    /// Loads one library. Returns `Ok(false)` when a binary with the same
    /// simple name is already loaded.
    pub fn load_binary(&mut self, path: &Path) -> Result<bool, ModuleSystemError> {
        let Some(name) = library_simple_name(path) else {
            return Ok(false);
        };
        if self.is_loaded(&name) {
            return Ok(false);
        }

        let library = unsafe { Library::new(path) }.map_err(|source| ModuleSystemError::LoadingError {
            binary: name.clone(),
            path: path.to_path_buf(),
            source,
        })?;

        let catalog_fn: FfiCatalogFn = unsafe {
            *library
                .get::<FfiCatalogFn>(CATALOG_SYMBOL)
                .map_err(|source| ModuleSystemError::MissingCatalog {
                    binary: name.clone(),
                    source,
                })?
        };

        let catalog_ptr = guarded(|| catalog_fn()).map_err(|panic_msg| ModuleSystemError::InvalidCatalog {
            binary: name.clone(),
            message: format!("catalog function panicked: {}", panic_msg),
        })?;
        if catalog_ptr.is_null() {
            return Err(ModuleSystemError::InvalidCatalog {
                binary: name,
                message: "catalog function returned null".to_string(),
            });
        }
        check_api_version(unsafe { &*catalog_ptr }, &name)?;

        self.loaded_names.insert(name.to_lowercase());
        self.binaries.push(ModuleBinary::Native(NativeBinary {
            name,
            catalog: CatalogPtr(catalog_ptr),
            library: Arc::new(library),
        }));
        Ok(true)
    }

    /// Registers candidates linked into the host under the binary name `name`.
    /// Returns `false` if that name is already loaded.
    pub fn register_static(&mut self, name: &str, candidates: Vec<ModuleCandidate>) -> bool {
        if name.trim().is_empty() || self.is_loaded(name) {
            return false;
        }
        let candidates = candidates.into_iter().map(|c| c.with_binary(name)).collect();
        self.loaded_names.insert(name.to_lowercase());
        self.binaries.push(ModuleBinary::Static {
            name: name.to_string(),
            candidates,
        });
        true
    }

    /// Enumerates candidate types across every loaded binary. Binaries whose
    /// required libraries cannot be resolved are reported and skipped.
    pub fn enumerate_candidates(&mut self, errors: &mut Vec<String>, diagnostics: bool) -> Vec<ModuleCandidate> {
        let mut candidates = Vec::new();
        // The resolver may append binaries while we walk the list
        let mut index = 0;
        while index < self.binaries.len() {
            match self.enumerate_one(index, diagnostics) {
                Ok(found) => {
                    if diagnostics {
                        debug!(
                            target: DIAG_TARGET,
                            "Binary enumerated: {}, types found: {}",
                            self.binaries[index].name(),
                            found.len()
                        );
                    }
                    candidates.extend(found);
                }
                Err(e) => errors.push(format!(
                    "Failed to get types from binary {}: {}",
                    self.binaries[index].name(),
                    e
                )),
            }
            index += 1;
        }
        candidates
    }

    fn enumerate_one(&mut self, index: usize, diagnostics: bool) -> Result<Vec<ModuleCandidate>, ModuleSystemError> {
        let (binary_name, requires) = match &self.binaries[index] {
            ModuleBinary::Static { candidates, .. } => return Ok(candidates.clone()),
            ModuleBinary::Native(native) => (native.name.clone(), native.requires()?),
        };

        for dependency in requires {
            self.resolve_dependency(&binary_name, &dependency, diagnostics)?;
        }

        match &self.binaries[index] {
            ModuleBinary::Native(native) => native.candidates(),
            ModuleBinary::Static { candidates, .. } => Ok(candidates.clone()),
        }
    }
}

fn check_api_version(catalog: &FfiModuleCatalog, binary: &str) -> Result<(), ModuleSystemError> {
    let invalid = |message: String| ModuleSystemError::InvalidCatalog {
        binary: binary.to_string(),
        message,
    };
    let found = unsafe { ffi_string_from_ptr(catalog.api_version) }
        .map_err(|e| invalid(format!("api_version: {:?}", e)))?;
    let host = Version::parse(API_VERSION)
        .map_err(|e| ModuleSystemError::InternalError(format!("host API version: {}", e)))?;
    let required = VersionReq::parse(&format!("^{}.{}", host.major, host.minor))
        .map_err(|e| ModuleSystemError::InternalError(format!("host API requirement: {}", e)))?;
    let version = Version::parse(found.trim()).map_err(|e| invalid(format!("api_version '{}': {}", found, e)))?;

    if required.matches(&version) {
        Ok(())
    } else {
        Err(ModuleSystemError::IncompatibleApi {
            binary: binary.to_string(),
            found,
            required: required.to_string(),
        })
    }
}
