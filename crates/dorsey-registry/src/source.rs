use anyhow::Result;
use dorsey_resolver::{
    parse_versions, select_highest_compatible, select_highest_matching, select_latest,
};
use semver::{Version, VersionReq};

/// Anything that can list the published versions of a package.
///
/// The selection helpers are provided on top of `fetch_versions`, so every
/// call issues exactly one listing request.
pub trait VersionSource {
    fn registry_url(&self) -> &str;

    fn fetch_versions(&self, name: &str) -> Result<Vec<String>>;

    fn latest_version(&self, name: &str) -> Result<Option<Version>> {
        let available = parse_versions(&self.fetch_versions(name)?);
        Ok(select_latest(&available).cloned())
    }

    fn resolve_compatible(&self, name: &str, base: &Version) -> Result<Option<Version>> {
        let available = parse_versions(&self.fetch_versions(name)?);
        Ok(select_highest_compatible(&available, base).cloned())
    }

    fn resolve_matching(&self, name: &str, requirement: &VersionReq) -> Result<Option<Version>> {
        let available = parse_versions(&self.fetch_versions(name)?);
        Ok(select_highest_matching(&available, requirement).cloned())
    }
}
