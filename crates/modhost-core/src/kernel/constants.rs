/// Application name
pub const APP_NAME: &str = "modhost";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the native module ABI. Module catalogs must be semver-compatible.
pub const API_VERSION: &str = "0.1.0";

/// Conventional folder that module binaries must live under
pub const MODULES_DIR_NAME: &str = "Modules";

/// Namespace prefix that makes an unmarked type eligible as a module
pub const DEFAULT_NAMESPACE_PREFIX: &str = "modhost::modules";

/// Type names initialized ahead of every other module, in this order
pub const DEFAULT_BOOT_PRIORITY: &[&str] = &["MemoryModule"];

/// Declared name of the bootstrap memory module
pub const MEMORY_MODULE_NAME: &str = "Memory";

/// Category tag for modules that belong to the host core
pub const CORE_CATEGORY: &str = "core";

/// Symbol every native module library exports
pub const CATALOG_SYMBOL: &[u8] = b"_module_catalog\0";

/// Log target for per-decision diagnostics (enabled by the debug flag)
pub const DIAG_TARGET: &str = "modhost::diag";
