//! Built-in configuration defaults.

/// Base directory for theranorm data.
pub const DEFAULT_DATA_DIR: &str = ".theranorm";

/// Store subdirectory name within the data directory.
pub const DEFAULT_STORE_DIR: &str = "store";
