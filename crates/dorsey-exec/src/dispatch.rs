use std::time::Duration;

use anyhow::Result;
use dorsey_core::{exit_code_for, error_kind, CliConfig, DorseyError, PackageSpec, VersionConstraint};
use dorsey_installer::{InstallOutcome, Package, PackageFetcher, UpdateOutcome};
use dorsey_registry::VersionSource;
use semver::Version;

use crate::bindings::CommandBindings;
use crate::executor::Executor;
use crate::invocation::InvocationArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed,
    /// The package declares no entry point; nothing was run.
    NothingToRun,
}

/// Progress hooks for a front end. Every hook defaults to doing nothing
/// except `failed`, which prints the error chain to stderr.
pub trait DispatchEvents {
    fn syncing(&self, _package: &str, _cached: bool) {}

    fn synced(&self, _package: &str, _version: Option<&Version>, _changed: bool) {}

    fn failed(&self, err: &anyhow::Error) {
        eprintln!("error: {err:#}");
    }
}

pub struct SilentEvents;

impl DispatchEvents for SilentEvents {}

/// Resolves a command to its package, brings the package's cache entry up
/// to date, and runs its entry point.
pub struct Dispatcher<'a> {
    config: &'a CliConfig,
    bindings: &'a CommandBindings,
    versions: &'a dyn VersionSource,
    fetcher: &'a dyn PackageFetcher,
    executor: &'a dyn Executor,
    events: &'a dyn DispatchEvents,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a CliConfig,
        versions: &'a dyn VersionSource,
        fetcher: &'a dyn PackageFetcher,
        executor: &'a dyn Executor,
    ) -> Self {
        Self {
            config,
            bindings: CommandBindings::builtin(),
            versions,
            fetcher,
            executor,
            events: &SilentEvents,
        }
    }

    pub fn with_bindings(mut self, bindings: &'a CommandBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_events(mut self, events: &'a dyn DispatchEvents) -> Self {
        self.events = events;
        self
    }

    /// Direct mode at the configured target path, otherwise cached mode
    /// under `<cli home>/dependencies`.
    pub fn package_spec(&self, package: &str) -> Result<PackageSpec> {
        match self.config.target_path.as_deref() {
            Some(target) => PackageSpec::new(package, VersionConstraint::Latest, target, None),
            None => PackageSpec::new(
                package,
                VersionConstraint::Latest,
                self.config.dependencies_dir(),
                Some(self.config.store_dir()),
            ),
        }
    }

    pub fn dispatch(&self, args: &InvocationArgs) -> Result<DispatchOutcome> {
        let package_name = self.bindings.lookup(args.command_name())?;
        let spec = self.package_spec(package_name)?;
        tracing::debug!(
            command = args.command_name(),
            package = package_name,
            target = %spec.target_path().display(),
            cached = spec.is_cached(),
            "dispatching"
        );

        let mut package = Package::new(spec, self.versions, self.fetcher)
            .with_lock_stale_after(Duration::from_secs(self.config.lock_stale_secs));
        let cached = package.exists()?;
        self.events.syncing(package_name, cached);
        let changed = if cached {
            !matches!(
                package.update()?,
                UpdateOutcome::UpToDate(_) | UpdateOutcome::Skipped
            )
        } else {
            matches!(package.install()?, InstallOutcome::Installed(_))
        };
        self.events
            .synced(package_name, package.resolved_version(), changed);

        let Some(entry_point) = package.entry_point_path()? else {
            tracing::debug!(package = package_name, "package declares no entry point");
            return Ok(DispatchOutcome::NothingToRun);
        };
        tracing::debug!(package = package_name, %entry_point, "resolved entry point");

        let code = self.executor.execute(package_name, &entry_point, args)?;
        if code != 0 {
            return Err(DorseyError::CommandExecutionFailed { code }.into());
        }
        Ok(DispatchOutcome::Executed)
    }

    /// Dispatches and converts the result into a process exit status,
    /// reporting any failure through the event hooks.
    pub fn run(&self, args: &InvocationArgs) -> i32 {
        match self.dispatch(args) {
            Ok(_) => 0,
            Err(err) => {
                if let Some(DorseyError::CommandExecutionFailed { code }) = error_kind(&err) {
                    tracing::debug!(code, "command reported failure");
                } else {
                    self.events.failed(&err);
                }
                exit_code_for(&err)
            }
        }
    }
}
