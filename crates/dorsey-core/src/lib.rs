mod cache_path;
mod config;
mod error;
mod manifest;
mod path_format;
mod spec;

pub use cache_path::{cache_entry_name, cache_path};
pub use config::{
    CliConfig, ExecConfig, ExecStrategy, RegistryConfig, RegistrySource, DEFAULT_CLI_HOME,
    DEFAULT_RUNTIME, DEPENDENCIES_DIR, LOWEST_RUNTIME_VERSION, MIRROR_REGISTRY_URL,
    ORIGIN_REGISTRY_URL, STORE_DIR,
};
pub use error::{error_kind, exit_code_for, DorseyError};
pub use manifest::{PackageManifest, PACKAGE_MANIFEST_FILE};
pub use path_format::{normalize_path, normalize_separators};
pub use spec::{validate_package_name, PackageSpec, VersionConstraint, LATEST_TAG};
