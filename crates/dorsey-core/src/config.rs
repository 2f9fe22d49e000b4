use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_CLI_HOME: &str = ".dorsey-cli";
pub const DEPENDENCIES_DIR: &str = "dependencies";
pub const STORE_DIR: &str = "node_modules";
pub const ORIGIN_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const MIRROR_REGISTRY_URL: &str = "https://registry.npmmirror.com";
pub const DEFAULT_RUNTIME: &str = "node";
pub const LOWEST_RUNTIME_VERSION: &str = "14.0.0";

/// Which registry the client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySource {
    #[default]
    Origin,
    Mirror,
    Custom(String),
}

impl RegistrySource {
    /// `origin`, `mirror`, or an explicit `http(s)://` base URL.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "origin" | "npm" => Some(Self::Origin),
            "mirror" => Some(Self::Mirror),
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Some(Self::Custom(url.trim_end_matches('/').to_string()))
            }
            _ => None,
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Self::Origin => ORIGIN_REGISTRY_URL,
            Self::Mirror => MIRROR_REGISTRY_URL,
            Self::Custom(url) => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub source: RegistrySource,
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            source: RegistrySource::Origin,
            timeout_secs: 5,
            download_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecStrategy {
    #[default]
    Subprocess,
    InProcess,
}

impl ExecStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subprocess => "subprocess",
            Self::InProcess => "in-process",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub strategy: ExecStrategy,
    pub runtime: String,
    pub min_runtime_version: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            strategy: ExecStrategy::Subprocess,
            runtime: DEFAULT_RUNTIME.to_string(),
            min_runtime_version: LOWEST_RUNTIME_VERSION.to_string(),
        }
    }
}

/// Process-wide settings, assembled once by the CLI shell and passed by
/// reference to the installer and dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(skip)]
    pub home_dir: PathBuf,
    pub cli_home: String,
    #[serde(skip)]
    pub target_path: Option<PathBuf>,
    #[serde(skip)]
    pub debug: bool,
    pub log_level: String,
    pub lock_stale_secs: u64,
    pub check_update: bool,
    pub registry: RegistryConfig,
    pub exec: ExecConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::new(),
            cli_home: DEFAULT_CLI_HOME.to_string(),
            target_path: None,
            debug: false,
            log_level: "info".to_string(),
            registry: RegistryConfig::default(),
            exec: ExecConfig::default(),
            lock_stale_secs: 600,
            check_update: true,
        }
    }
}

impl CliConfig {
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            ..Self::default()
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// `cli_home` may be absolute; a relative value lives under the home dir.
    pub fn cli_home_dir(&self) -> PathBuf {
        self.home_dir.join(&self.cli_home)
    }

    pub fn dependencies_dir(&self) -> PathBuf {
        self.cli_home_dir().join(DEPENDENCIES_DIR)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dependencies_dir().join(STORE_DIR)
    }

    pub fn registry_url(&self) -> &str {
        self.registry.source.base_url()
    }

    /// Effective log level: `--debug` always wins.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}
