use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

/// Unpacks an npm-style `.tgz` into `dst`, dropping the single top-level
/// directory (`package/`) every published tarball wraps its files in.
pub fn unpack_package_tarball(bytes: &[u8], dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;

    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut written = 0_usize;
    for entry in archive.entries().context("failed to read tarball entries")? {
        let mut entry = entry.context("failed to read tarball entry")?;
        let raw_path = entry
            .path()
            .context("tarball entry has an invalid path")?
            .into_owned();
        ensure_contained(&raw_path)?;

        let Some(rel) = strip_rel_components(&raw_path, 1) else {
            continue;
        };
        let dst_path = dst.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&dst_path)
                    .with_context(|| format!("failed to create {}", dst_path.display()))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = dst_path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                entry
                    .unpack(&dst_path)
                    .with_context(|| format!("failed to unpack {}", dst_path.display()))?;
                written += 1;
            }
            other => {
                tracing::debug!(path = %raw_path.display(), kind = ?other, "skipping tarball entry");
            }
        }
    }

    if written == 0 {
        return Err(anyhow!("tarball contained no files"));
    }
    Ok(written)
}

fn ensure_contained(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(anyhow!(
                    "tarball entry escapes the package directory: {}",
                    path.display()
                ));
            }
        }
    }
    Ok(())
}

pub(crate) fn strip_rel_components(path: &Path, strip_components: usize) -> Option<PathBuf> {
    let components: Vec<_> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(v) => Some(v.to_os_string()),
            _ => None,
        })
        .collect();

    if components.len() <= strip_components {
        return None;
    }

    let mut out = PathBuf::new();
    for component in components.into_iter().skip(strip_components) {
        out.push(component);
    }
    Some(out)
}
