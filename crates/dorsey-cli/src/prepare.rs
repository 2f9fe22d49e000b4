use anyhow::{Context, Result};
use dorsey_core::CliConfig;
use dorsey_registry::{RegistryClient, VersionSource};
use semver::Version;

use crate::config::{load_config, user_home_dir, ConfigOverrides, DefaultConfigWrite};
use crate::logging::init_logging;
use crate::render::TerminalRenderer;
use crate::{CLI_NAME, CLI_VERSION};

/// Startup checks run before any dispatched command.
pub fn prepare(overrides: &ConfigOverrides, renderer: TerminalRenderer) -> Result<CliConfig> {
    renderer.print_status("info", &format!("{CLI_NAME} {CLI_VERSION}"));

    let env = |key: &str| std::env::var(key).ok();
    let home = user_home_dir(env)?;
    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let loaded = load_config(&home, &cwd, env, overrides)?;
    let config = loaded.config;
    init_logging(config.effective_log_level());
    match &loaded.default_write {
        Some(DefaultConfigWrite::Written(path)) => {
            tracing::debug!(path = %path.display(), "wrote default config");
        }
        Some(DefaultConfigWrite::Failed { path, error }) => {
            tracing::debug!(path = %path.display(), %error, "default config not written");
            renderer.print_warning(&format!(
                "could not write default config {}: {error}; using built-in defaults",
                path.display()
            ));
        }
        None => {}
    }
    tracing::debug!(
        home = %home.display(),
        cli_home = %config.cli_home_dir().display(),
        registry = config.registry_url(),
        "configuration loaded"
    );

    if config.check_update {
        notify_global_update(&config, renderer);
    }
    Ok(config)
}

fn notify_global_update(config: &CliConfig, renderer: TerminalRenderer) {
    let Ok(current) = Version::parse(CLI_VERSION) else {
        return;
    };
    let client = match RegistryClient::from_config(&config.registry) {
        Ok(client) => client,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "skipping update check");
            return;
        }
    };
    if let Some(newer) = check_global_update(&client, CLI_NAME, &current) {
        renderer.print_warning(&format!(
            "{CLI_NAME} {newer} is available (current {current}); update with: npm install -g {CLI_NAME}"
        ));
    }
}

/// Newest release compatible with `current`, if it is newer. Registry
/// failures never block startup.
pub fn check_global_update(source: &dyn VersionSource, name: &str, current: &Version) -> Option<Version> {
    match source.resolve_compatible(name, current) {
        Ok(Some(latest)) if latest > *current => Some(latest),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "update check failed");
            None
        }
    }
}
