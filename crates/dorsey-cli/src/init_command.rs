use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dorsey_exec::{Command, InvocationArgs};

/// Package the `init` command is bound to.
pub const INIT_PACKAGE: &str = "@imooc-cli/init";

/// Compiled-in stand-in for the `init` package, used by the in-process
/// strategy. Template rendering lives in the package itself.
#[derive(Debug, Default)]
pub struct InitCommand {
    project_name: String,
    force: bool,
    cwd: PathBuf,
}

impl InitCommand {
    pub fn boxed() -> Box<dyn Command> {
        Box::new(Self::default())
    }

    pub fn target_dir(&self) -> PathBuf {
        if self.project_name.is_empty() {
            self.cwd.clone()
        } else {
            self.cwd.join(&self.project_name)
        }
    }

    pub fn summary(&self) -> String {
        let name = if self.project_name.is_empty() {
            "<unnamed>"
        } else {
            self.project_name.as_str()
        };
        format!(
            "init project {name} in {}{}",
            self.target_dir().display(),
            if self.force { " (force)" } else { "" }
        )
    }
}

impl Command for InitCommand {
    fn check_preconditions(&self) -> Result<()> {
        let cwd = std::env::current_dir().context("failed to read the working directory")?;
        fs::read_dir(&cwd)
            .with_context(|| format!("working directory is not readable: {}", cwd.display()))?;
        Ok(())
    }

    fn initialize_from_args(&mut self, args: &InvocationArgs) -> Result<()> {
        self.project_name = args.positionals.first().cloned().unwrap_or_default();
        self.force = args.options.force;
        self.cwd = std::env::current_dir().context("failed to read the working directory")?;
        Ok(())
    }

    fn run(&mut self) -> Result<i32> {
        tracing::info!(project = %self.project_name, force = self.force, "running built-in init");
        println!("{}", self.summary());
        Ok(0)
    }
}
