use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::DorseyError;

/// Directory name of one cached `(name, version)` pair.
///
/// Slashes in scoped names become underscores so the entry is a single path
/// segment; the scope (or the bare name) is appended so entries from
/// different scopes that flatten to the same prefix stay distinct.
pub fn cache_entry_name(name: &str, version: &str) -> String {
    let prefix = name.replace('/', "_");
    let scope = name.split('/').next().unwrap_or(name);
    format!("_{prefix}@{version}@{scope}")
}

pub fn cache_path(store_dir: &Path, name: &str, version: &str) -> Result<PathBuf> {
    if store_dir.as_os_str().is_empty() {
        return Err(DorseyError::InvalidCacheConfig.into());
    }
    Ok(store_dir.join(cache_entry_name(name, version)))
}
