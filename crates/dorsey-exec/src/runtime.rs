use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use dorsey_core::DorseyError;
use semver::Version;

/// Parses `--version` output such as `v18.19.0`.
pub fn parse_runtime_version(output: &str) -> Option<Version> {
    let token = output.split_whitespace().next()?;
    Version::parse(token.trim_start_matches('v')).ok()
}

/// Runs `<runtime> --version` and requires at least `minimum`.
pub fn check_runtime_version(runtime: &str, minimum: &Version, entry_point: &Path) -> Result<Version> {
    let output = Command::new(runtime).arg("--version").output().map_err(|err| {
        anyhow::Error::new(err).context(DorseyError::DispatchSpawnFailed {
            program: runtime.to_string(),
            entry: entry_point.to_path_buf(),
        })
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let found = parse_runtime_version(&stdout)
        .with_context(|| format!("unrecognized '{runtime} --version' output: {}", stdout.trim()))?;
    if found < *minimum {
        return Err(DorseyError::UnsupportedRuntime {
            runtime: runtime.to_string(),
            found: found.to_string(),
            required: minimum.to_string(),
        }
        .into());
    }

    tracing::debug!(runtime, version = %found, "runtime version accepted");
    Ok(found)
}
