use std::path::{Path, PathBuf};

use log::debug;

use crate::kernel::constants::DIAG_TARGET;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::loader::ModuleLoader;
use crate::utils::fs::{find_files, library_file_names};

/// First file under any of `roots` (recursively, roots in order) whose name is
/// one of the platform file names for library `name`.
pub fn find_in_roots(roots: &[PathBuf], name: &str) -> Option<PathBuf> {
    let candidates: Vec<String> = library_file_names(name).into_iter().map(|n| n.to_lowercase()).collect();
    let predicate = |p: &Path| {
        p.file_name()
            .map(|f| candidates.contains(&f.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    };
    roots
        .iter()
        .filter(|root| root.is_dir())
        .find_map(|root| find_files(root, &predicate).ok()?.into_iter().next())
}

impl ModuleLoader {
    /// Makes sure the library `dependency` required by `binary` is loaded.
    ///
    /// Already-loaded names resolve immediately. Otherwise every search root is
    /// searched recursively (not only `Modules` folders) and the first match is
    /// loaded. Newly loaded binaries are enumerated later in the same pass, so
    /// their own requirements get resolved too; the loaded-name set keeps
    /// mutual requirements from looping.
    pub(crate) fn resolve_dependency(
        &mut self,
        binary: &str,
        dependency: &str,
        diagnostics: bool,
    ) -> Result<(), ModuleSystemError> {
        if self.is_loaded(dependency) {
            return Ok(());
        }
        if diagnostics {
            debug!(target: DIAG_TARGET, "Resolving dependency {} for {}", dependency, binary);
        }

        let unresolved = || ModuleSystemError::UnresolvedDependency {
            binary: binary.to_string(),
            dependency: dependency.to_string(),
        };
        let path = find_in_roots(self.search_roots(), dependency).ok_or_else(unresolved)?;

        match self.load_binary(&path) {
            Ok(_) => {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Resolved dependency {} from {}", dependency, path.display());
                }
                Ok(())
            }
            Err(e) => {
                if diagnostics {
                    debug!(target: DIAG_TARGET, "Dependency {} found but failed to load: {}", dependency, e);
                }
                Err(unresolved())
            }
        }
    }
}
