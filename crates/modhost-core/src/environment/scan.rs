use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;
use serde::Serialize;

use crate::utils::fs::{count_files, list_subdirectories};

#[derive(Debug, Clone, Serialize)]
pub struct FolderInfo {
    pub path: PathBuf,
    pub name: String,
    pub last_modified: Option<SystemTime>,
    /// Files below the folder, recursively
    pub file_count: usize,
    /// Names of the direct subdirectories
    pub subdirectories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateScan {
    pub scan_time: SystemTime,
    /// Every folder asked for, including those that do not exist
    pub scanned_folders: Vec<PathBuf>,
    /// Details for the folders that exist
    pub folder_details: Vec<FolderInfo>,
}

/// Summarizes each existing folder in `folders`; missing ones are skipped
pub fn scan_for_updates<P: AsRef<Path>>(folders: &[P]) -> UpdateScan {
    let folder_details = folders
        .iter()
        .map(|f| f.as_ref())
        .filter(|folder| folder.is_dir())
        .filter_map(|folder| match scan_folder(folder) {
            Ok(info) => {
                debug!("Scanned folder: {} ({} files)", folder.display(), info.file_count);
                Some(info)
            }
            Err(e) => {
                debug!("Error scanning folder {}: {}", folder.display(), e);
                None
            }
        })
        .collect();

    UpdateScan {
        scan_time: SystemTime::now(),
        scanned_folders: folders.iter().map(|f| f.as_ref().to_path_buf()).collect(),
        folder_details,
    }
}

fn scan_folder(folder: &Path) -> std::io::Result<FolderInfo> {
    let last_modified = std::fs::metadata(folder)?.modified().ok();
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string());
    let subdirectories = list_subdirectories(folder)
        .iter()
        .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    Ok(FolderInfo {
        path: folder.to_path_buf(),
        name,
        last_modified,
        file_count: count_files(folder)?,
        subdirectories,
    })
}
