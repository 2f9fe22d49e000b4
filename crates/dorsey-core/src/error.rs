use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds shared across the resolution, cache, and dispatch crates.
///
/// Library code returns `anyhow::Result` and places one of these at the root
/// of the chain (or as context) so the dispatcher boundary can map it to an
/// exit status with `exit_code_for`.
#[derive(Debug, Error)]
pub enum DorseyError {
    #[error("registry {registry} is unavailable for '{package}': {reason}")]
    RegistryUnavailable {
        package: String,
        registry: String,
        reason: String,
    },

    #[error("cache path requested without a configured store directory")]
    InvalidCacheConfig,

    #[error("invalid package spec: {0}")]
    InvalidPackageSpec(String),

    #[error("no published version of '{package}' matches '{constraint}'")]
    NoMatchingVersion { package: String, constraint: String },

    #[error("failed to install {package}@{version}")]
    InstallFailed { package: String, version: String },

    #[error("failed to update {package} to {version}")]
    UpdateFailed { package: String, version: String },

    #[error("integrity mismatch for {package}@{version}: expected {expected}")]
    IntegrityMismatch {
        package: String,
        version: String,
        expected: String,
    },

    #[error("no package is bound to command '{0}'")]
    UnknownCommand(String),

    #[error("runtime '{runtime}' {found} is older than the required {required}")]
    UnsupportedRuntime {
        runtime: String,
        found: String,
        required: String,
    },

    #[error("failed to spawn '{program}' for {entry}")]
    DispatchSpawnFailed { program: String, entry: PathBuf },

    #[error("command exited with status {code}")]
    CommandExecutionFailed { code: i32 },
}

/// Maps an error chain to the process exit status reported by the CLI.
///
/// A failed command keeps its own exit code; every other failure is `1`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match error_kind(err) {
        Some(DorseyError::CommandExecutionFailed { code }) if *code != 0 => *code,
        _ => 1,
    }
}

/// Returns the outermost `DorseyError` attached to the error, either as
/// context or as a cause.
pub fn error_kind(err: &anyhow::Error) -> Option<&DorseyError> {
    err.downcast_ref::<DorseyError>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<DorseyError>()))
}
