use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use dorsey_core::{CliConfig, RegistrySource};

pub const CONFIG_FILE_NAME: &str = ".dorsey-cli.toml";
pub const ENV_CLI_HOME: &str = "DORSEY_CLI_HOME";
pub const ENV_TARGET_PATH: &str = "DORSEY_CLI_TARGET_PATH";
pub const ENV_REGISTRY: &str = "DORSEY_CLI_REGISTRY";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Values taken from command-line flags; they win over everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub debug: bool,
    pub target_path: Option<PathBuf>,
    pub registry: Option<String>,
}

/// What happened to the config file on first run. Reported by the caller
/// once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultConfigWrite {
    Written(PathBuf),
    Failed { path: PathBuf, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: CliConfig,
    pub default_write: Option<DefaultConfigWrite>,
}

pub fn config_file_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE_NAME)
}

/// `HOME`, or `USERPROFILE` on Windows.
pub fn user_home_dir(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    let home = env("HOME")
        .or_else(|| env("USERPROFILE"))
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("could not determine the user home directory"))?;
    let home = PathBuf::from(home);
    if !home.is_dir() {
        return Err(anyhow!(
            "user home directory does not exist: {}",
            home.display()
        ));
    }
    Ok(home)
}

/// Defaults, then the config file (written with defaults when missing),
/// then the environment, then flags. Failing to write the default file is
/// not an error; it is reported in [`LoadedConfig::default_write`].
pub fn load_config(
    home: &Path,
    cwd: &Path,
    env: impl Fn(&str) -> Option<String>,
    overrides: &ConfigOverrides,
) -> Result<LoadedConfig> {
    let path = config_file_path(home);
    let (mut config, default_write) = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config = toml::from_str::<CliConfig>(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        (config, None)
    } else {
        let config = CliConfig::default();
        let outcome = match write_default_config(&path, &config) {
            Ok(()) => DefaultConfigWrite::Written(path),
            Err(err) => DefaultConfigWrite::Failed {
                path,
                error: format!("{err:#}"),
            },
        };
        (config, Some(outcome))
    };
    config.home_dir = home.to_path_buf();

    if let Some(cli_home) = env(ENV_CLI_HOME).filter(|value| !value.trim().is_empty()) {
        config.cli_home = cli_home;
    }
    if let Some(target) = env(ENV_TARGET_PATH).filter(|value| !value.trim().is_empty()) {
        config.target_path = Some(PathBuf::from(target));
    }
    if let Some(registry) = env(ENV_REGISTRY) {
        config.registry.source = parse_registry(&registry)?;
    }
    if let Some(level) = env(ENV_LOG_LEVEL).filter(|value| !value.trim().is_empty()) {
        config.log_level = level.trim().to_ascii_lowercase();
    }

    config.debug = overrides.debug;
    if let Some(target) = &overrides.target_path {
        config.target_path = Some(target.clone());
    }
    if let Some(registry) = &overrides.registry {
        config.registry.source = parse_registry(registry)?;
    }

    config.target_path = config.target_path.map(|target| {
        if target.is_absolute() {
            target
        } else {
            cwd.join(target)
        }
    });
    Ok(LoadedConfig {
        config,
        default_write,
    })
}

fn parse_registry(raw: &str) -> Result<RegistrySource> {
    RegistrySource::parse(raw).ok_or_else(|| {
        anyhow!("invalid registry '{raw}': expected 'origin', 'mirror', or an http(s) URL")
    })
}

fn write_default_config(path: &Path, config: &CliConfig) -> Result<()> {
    let content = toml::to_string(config).context("failed to serialize default config")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write config: {}", path.display()))
}
