use anyhow::{Context, Result};
use dorsey_core::cache_path;
use std::fs;
use std::path::{Path, PathBuf};

/// Layout of the package store: one directory per cached `(name, version)`
/// plus the lock files and staging directories used while installing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    store_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn entry_path(&self, name: &str, version: &str) -> Result<PathBuf> {
        cache_path(&self.store_dir, name, version)
    }

    pub fn lock_path(&self, name: &str, version: &str) -> Result<PathBuf> {
        let entry = self.entry_path(name, version)?;
        Ok(entry.with_file_name(format!("{}.lock", entry_file_name(&entry))))
    }

    /// Sibling staging directory, so the final rename stays on one filesystem.
    pub fn staging_path(&self, name: &str, version: &str, suffix: &str) -> Result<PathBuf> {
        let entry = self.entry_path(name, version)?;
        Ok(entry.with_file_name(format!(".tmp{}-{suffix}", entry_file_name(&entry))))
    }

    pub fn ensure_store_dir(&self) -> Result<()> {
        if self.store_dir.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.store_dir)
            .with_context(|| format!("failed to create {}", self.store_dir.display()))
    }
}

fn entry_file_name(entry: &Path) -> String {
    entry
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
