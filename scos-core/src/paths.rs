//! Centralized path configuration.
//!
//! All working paths should go through this module so the CLI and library
//! agree on where sources, state and configuration live.

use std::path::{Path, PathBuf};

/// Get the default working directory.
///
/// Resolution order:
/// 1. `SCOS_WORK_DIR` environment variable
/// 2. `~/.scos` for user installs
/// 3. `./.scos` when no home directory can be determined
pub fn work_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SCOS_WORK_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir().map(|h| h.join(".scos")).unwrap_or_else(|| PathBuf::from(".scos"))
}

/// Get the configuration directory.
///
/// `SCOS_CONFIG_DIR` wins, then the platform config dir, then the work dir.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SCOS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir().map(|c| c.join("scos")).unwrap_or_else(work_dir)
}

/// Database path for a given working root.
pub fn db_path(root: &Path) -> PathBuf {
    root.join("state.db")
}

/// Directory that holds one cloned source tree per component.
pub fn sources_dir(root: &Path) -> PathBuf {
    root.join("sources")
}

/// Clone destination for a single component.
pub fn source_dir(root: &Path, component: &str) -> PathBuf {
    sources_dir(root).join(component)
}
