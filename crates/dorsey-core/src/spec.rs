use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use semver::{Version, VersionReq};

use crate::error::DorseyError;

pub const LATEST_TAG: &str = "latest";

/// What version of a package a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Latest,
    Exact(Version),
    Range(VersionReq),
}

impl VersionConstraint {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == LATEST_TAG {
            return Ok(Self::Latest);
        }
        if let Ok(version) = Version::parse(trimmed.trim_start_matches('v')) {
            return Ok(Self::Exact(version));
        }
        let requirement = VersionReq::parse(trimmed).map_err(|err| {
            DorseyError::InvalidPackageSpec(format!("invalid version constraint '{trimmed}': {err}"))
        })?;
        Ok(Self::Range(requirement))
    }

    pub fn exact(&self) -> Option<&Version> {
        match self {
            Self::Exact(version) => Some(version),
            _ => None,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST_TAG),
            Self::Exact(version) => write!(f, "{version}"),
            Self::Range(requirement) => write!(f, "{requirement}"),
        }
    }
}

/// Identifies a package to materialize and where it lives.
///
/// With a `store_dir` every version is cached in its own entry under it;
/// without one the package is expected to already exist at `target_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    name: String,
    version: VersionConstraint,
    target_path: PathBuf,
    store_dir: Option<PathBuf>,
}

impl PackageSpec {
    pub fn new(
        name: impl Into<String>,
        version: VersionConstraint,
        target_path: impl Into<PathBuf>,
        store_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let name = name.into();
        validate_package_name(&name)?;
        Ok(Self {
            name,
            version,
            target_path: target_path.into(),
            store_dir: store_dir.filter(|dir| !dir.as_os_str().is_empty()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &VersionConstraint {
        &self.version
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn store_dir(&self) -> Option<&Path> {
        self.store_dir.as_deref()
    }

    pub fn is_cached(&self) -> bool {
        self.store_dir.is_some()
    }
}

/// Accepts `name` and `@scope/name`; rejects anything that cannot be a
/// single registry package identifier.
pub fn validate_package_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| DorseyError::InvalidPackageSpec(format!("'{name}' {reason}"));

    if name.trim().is_empty() {
        return Err(DorseyError::InvalidPackageSpec("package name must not be empty".into()).into());
    }
    if name != name.trim() || name.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace").into());
    }

    match name.strip_prefix('@') {
        Some(scoped) => {
            let Some((scope, rest)) = scoped.split_once('/') else {
                return Err(invalid("is scoped but has no package segment").into());
            };
            if scope.is_empty() || rest.is_empty() || rest.contains('/') {
                return Err(invalid("must look like '@scope/name'").into());
            }
        }
        None => {
            if name.contains('/') {
                return Err(invalid("contains '/' without a scope").into());
            }
        }
    }

    if name.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(invalid("contains a relative path segment").into());
    }
    Ok(())
}
