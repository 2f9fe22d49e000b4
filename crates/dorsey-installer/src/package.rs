use anyhow::{anyhow, Context, Result};
use dorsey_core::{DorseyError, PackageSpec, VersionConstraint};
use dorsey_registry::VersionSource;
use semver::Version;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::entry::resolve_entry_point;
use crate::fetch::PackageFetcher;
use crate::fs_utils::remove_dir_if_exists;
use crate::layout::StoreLayout;
use crate::lock::EntryLock;

const DEFAULT_LOCK_STALE_AFTER: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(Version),
    /// Another installer materialized the entry first.
    AlreadyPresent(Version),
    /// Direct mode; nothing is installed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { from: Option<Version>, to: Version },
    UpToDate(Version),
    Skipped,
}

/// Lifecycle of one named package under a target root.
///
/// In cached mode (a store directory is configured) each version lives in its
/// own cache entry and `install`/`update` fetch into the store. In direct
/// mode the package is expected at `target_path` and never installed.
pub struct Package<'a> {
    spec: PackageSpec,
    resolved: Option<Version>,
    latest_resolved: bool,
    versions: &'a dyn VersionSource,
    fetcher: &'a dyn PackageFetcher,
    lock_stale_after: Duration,
}

impl<'a> Package<'a> {
    pub fn new(
        spec: PackageSpec,
        versions: &'a dyn VersionSource,
        fetcher: &'a dyn PackageFetcher,
    ) -> Self {
        let resolved = spec.version().exact().cloned();
        Self {
            spec,
            resolved,
            latest_resolved: false,
            versions,
            fetcher,
            lock_stale_after: DEFAULT_LOCK_STALE_AFTER,
        }
    }

    pub fn with_lock_stale_after(mut self, stale_after: Duration) -> Self {
        self.lock_stale_after = stale_after;
        self
    }

    pub fn spec(&self) -> &PackageSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn resolved_version(&self) -> Option<&Version> {
        self.resolved.as_ref()
    }

    pub fn layout(&self) -> Option<StoreLayout> {
        self.spec.store_dir().map(StoreLayout::new)
    }

    /// Ensures the store directory exists and fixes the version to install.
    /// A non-exact constraint is resolved against the registry only once.
    pub fn prepare(&mut self) -> Result<()> {
        if let Some(layout) = self.layout() {
            layout.ensure_store_dir()?;
        }
        if self.resolved.is_some() {
            return Ok(());
        }

        let name = self.spec.name();
        let resolved = match self.spec.version() {
            VersionConstraint::Latest => {
                self.latest_resolved = true;
                self.versions.latest_version(name)?
            }
            VersionConstraint::Range(requirement) => {
                self.versions.resolve_matching(name, requirement)?
            }
            VersionConstraint::Exact(version) => Some(version.clone()),
        };
        let Some(version) = resolved else {
            self.latest_resolved = false;
            return Err(DorseyError::NoMatchingVersion {
                package: name.to_string(),
                constraint: self.spec.version().to_string(),
            }
            .into());
        };

        tracing::debug!(package = name, constraint = %self.spec.version(), %version, "resolved version");
        self.resolved = Some(version);
        Ok(())
    }

    pub fn exists(&mut self) -> Result<bool> {
        if self.spec.is_cached() {
            self.prepare()?;
            Ok(self.cache_entry_path()?.exists())
        } else {
            Ok(self.spec.target_path().exists())
        }
    }

    pub fn install(&mut self) -> Result<InstallOutcome> {
        let Some(layout) = self.layout() else {
            tracing::debug!(package = self.name(), "direct mode, skipping install");
            return Ok(InstallOutcome::Skipped);
        };
        self.prepare()?;
        let version = self.resolved_or_err()?.clone();

        let fetched = self.materialize(&layout, &version).with_context(|| {
            DorseyError::InstallFailed {
                package: self.name().to_string(),
                version: version.to_string(),
            }
        })?;
        if fetched {
            Ok(InstallOutcome::Installed(version))
        } else {
            Ok(InstallOutcome::AlreadyPresent(version))
        }
    }

    /// Installs the registry's newest version unless its cache entry already
    /// exists. Repeated calls converge without refetching.
    pub fn update(&mut self) -> Result<UpdateOutcome> {
        let Some(layout) = self.layout() else {
            tracing::debug!(package = self.name(), "direct mode, skipping update");
            return Ok(UpdateOutcome::Skipped);
        };
        self.prepare()?;

        let latest = if self.latest_resolved {
            self.resolved_or_err()?.clone()
        } else {
            self.versions
                .latest_version(self.name())?
                .ok_or_else(|| DorseyError::NoMatchingVersion {
                    package: self.name().to_string(),
                    constraint: VersionConstraint::Latest.to_string(),
                })?
        };

        let latest_path = layout.entry_path(self.name(), &latest.to_string())?;
        if latest_path.exists() {
            tracing::debug!(package = self.name(), version = %latest, "cache entry is current");
            return Ok(UpdateOutcome::UpToDate(latest));
        }

        self.materialize(&layout, &latest).with_context(|| DorseyError::UpdateFailed {
            package: self.name().to_string(),
            version: latest.to_string(),
        })?;
        let from = self.resolved.replace(latest.clone());
        Ok(UpdateOutcome::Updated { from, to: latest })
    }

    /// Cache entry of the resolved version. Requires cached mode and a
    /// prior `prepare`.
    pub fn cache_entry_path(&self) -> Result<PathBuf> {
        let layout = self.layout().ok_or(DorseyError::InvalidCacheConfig)?;
        let version = self.resolved_or_err()?;
        layout.entry_path(self.name(), &version.to_string())
    }

    /// Entry file declared by the nearest manifest at or above the cache
    /// entry (cached mode) or the target path (direct mode).
    pub fn entry_point_path(&self) -> Result<Option<String>> {
        let start = if self.spec.is_cached() {
            self.cache_entry_path()?
        } else {
            self.spec.target_path().to_path_buf()
        };
        resolve_entry_point(&start)
    }

    fn resolved_or_err(&self) -> Result<&Version> {
        self.resolved
            .as_ref()
            .ok_or_else(|| anyhow!("version of '{}' has not been resolved", self.name()))
    }

    /// Fetches `version` into a staging directory and renames it into place
    /// under the entry lock. Returns `false` when the entry already existed.
    fn materialize(&self, layout: &StoreLayout, version: &Version) -> Result<bool> {
        let name = self.name();
        let version_str = version.to_string();
        let entry = layout.entry_path(name, &version_str)?;
        let _lock = EntryLock::acquire(&layout.lock_path(name, &version_str)?, self.lock_stale_after)?;

        if entry.exists() {
            tracing::debug!(package = name, version = %version, "cache entry appeared while waiting");
            return Ok(false);
        }

        let staging = layout.staging_path(name, &version_str, &unique_suffix())?;
        remove_dir_if_exists(&staging)
            .with_context(|| format!("failed to clear {}", staging.display()))?;

        tracing::info!(package = name, version = %version, registry = self.versions.registry_url(), "installing");
        let result = self
            .fetcher
            .fetch(name, version, &staging)
            .and_then(|_| {
                fs::rename(&staging, &entry).with_context(|| {
                    format!(
                        "failed to move {} into {}",
                        staging.display(),
                        entry.display()
                    )
                })
            });
        if let Err(err) = result {
            let _ = remove_dir_if_exists(&staging);
            return Err(err);
        }

        tracing::info!(package = name, version = %version, path = %entry.display(), "installed");
        Ok(true)
    }
}

fn unique_suffix() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!(
        "{}-{}-{}",
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}
