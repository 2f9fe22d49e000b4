use anyhow::{Context, Result};
use dorsey_core::DorseyError;
use dorsey_registry::RegistryClient;
use dorsey_security::{verify_integrity, IntegrityCheck};
use semver::Version;
use std::path::Path;

use crate::extract::unpack_package_tarball;

/// Materializes the files of one published package version.
pub trait PackageFetcher {
    /// Writes the contents of `name@version` into `destination`. The
    /// directory may not exist yet; on error its contents are discarded by
    /// the caller.
    fn fetch(&self, name: &str, version: &Version, destination: &Path) -> Result<()>;
}

/// Fetches tarballs from the registry's `dist.tarball` location.
#[derive(Debug, Clone)]
pub struct RegistryFetcher {
    client: RegistryClient,
}

impl RegistryFetcher {
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }

    pub fn registry_url(&self) -> &str {
        self.client.base_url()
    }
}

impl PackageFetcher for RegistryFetcher {
    fn fetch(&self, name: &str, version: &Version, destination: &Path) -> Result<()> {
        let manifest = self.client.version_manifest(name, version)?;
        let bytes = self.client.download(&manifest.dist.tarball)?;

        if let Some(integrity) = manifest.dist.integrity.as_deref() {
            match verify_integrity(&bytes, integrity) {
                Ok(IntegrityCheck::Verified) => {
                    tracing::debug!(package = name, %version, "tarball integrity verified");
                }
                Ok(IntegrityCheck::Unsupported) => {
                    tracing::debug!(package = name, %version, integrity, "no supported integrity algorithm");
                }
                Err(err) => {
                    return Err(err.context(DorseyError::IntegrityMismatch {
                        package: name.to_string(),
                        version: version.to_string(),
                        expected: integrity.to_string(),
                    }));
                }
            }
        }

        let files = unpack_package_tarball(&bytes, destination)
            .with_context(|| format!("failed to unpack {name}@{version}"))?;
        tracing::debug!(package = name, %version, files, "tarball unpacked");
        Ok(())
    }
}
