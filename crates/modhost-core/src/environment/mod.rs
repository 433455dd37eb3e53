//! # Modhost Environment Discovery
//!
//! Read-only filesystem queries that share the manager's search roots:
//! [`discover_environment`] reports module folders, well-known external
//! resource folders, configuration-like files and admin instances, and
//! [`scan_for_updates`] summarizes a set of folders so a caller can spot
//! changes. Both are best effort: unreadable paths are skipped, never reported
//! as errors.
pub mod discovery;
pub mod scan;

pub use discovery::{
    EXTERNAL_RESOURCES, EnvironmentReport, ExternalResource, discover_environment, discover_in,
};
pub use scan::{FolderInfo, UpdateScan, scan_for_updates};
