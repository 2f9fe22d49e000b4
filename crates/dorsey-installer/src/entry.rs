use anyhow::{Context, Result};
use dorsey_core::{normalize_path, PackageManifest, PACKAGE_MANIFEST_FILE};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Nearest directory at or above `start` that holds a `package.json`.
pub fn find_package_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PACKAGE_MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Resolves the manifest's `main` file relative to the package root found
/// from `start`, with `/` separators. `None` when there is no manifest or
/// it declares no entry file.
pub fn resolve_entry_point(start: &Path) -> Result<Option<String>> {
    let Some(root) = find_package_root(start) else {
        tracing::debug!(start = %start.display(), "no package manifest found");
        return Ok(None);
    };

    let manifest_path = root.join(PACKAGE_MANIFEST_FILE);
    let raw = fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest = PackageManifest::from_json_str(&raw)
        .with_context(|| format!("invalid manifest: {}", manifest_path.display()))?;

    let Some(main) = manifest.main_entry() else {
        tracing::debug!(manifest = %manifest_path.display(), "manifest declares no main entry");
        return Ok(None);
    };
    Ok(Some(normalize_path(&join_lexically(&root, Path::new(main)))))
}

/// Joins `rel` onto `base`, folding `.` and `..` without touching the disk.
fn join_lexically(base: &Path, rel: &Path) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in rel.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => out.push(component.as_os_str()),
        }
    }
    out
}
