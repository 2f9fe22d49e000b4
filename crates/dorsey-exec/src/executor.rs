use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use dorsey_core::{DorseyError, ExecConfig};
use semver::Version;

use crate::command::{run_lifecycle, CommandRegistry};
use crate::command_line::runtime_command_line;
use crate::interrupt::ChildGuard;
use crate::invocation::{build_subprocess_script, InvocationArgs};
use crate::runtime::check_runtime_version;

/// Runs a resolved package entry point and reports its exit status.
pub trait Executor {
    fn execute(&self, package: &str, entry_point: &str, args: &InvocationArgs) -> Result<i32>;
}

/// Evaluates the entry point in a child runtime process with inherited stdio.
#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    runtime: String,
    min_runtime_version: Version,
}

impl SubprocessExecutor {
    pub fn new(runtime: impl Into<String>, min_runtime_version: Version) -> Self {
        Self {
            runtime: runtime.into(),
            min_runtime_version,
        }
    }

    pub fn from_config(config: &ExecConfig) -> Result<Self> {
        let minimum = Version::parse(&config.min_runtime_version).with_context(|| {
            format!(
                "invalid minimum runtime version '{}'",
                config.min_runtime_version
            )
        })?;
        Ok(Self::new(config.runtime.clone(), minimum))
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    fn command(&self, script: &str) -> Command {
        let (program, args) = runtime_command_line(&self.runtime, script, cfg!(windows));
        let mut command = Command::new(program);
        push_args(&mut command, &args);
        command
    }
}

#[cfg(windows)]
fn push_args(command: &mut Command, args: &[String]) {
    use std::os::windows::process::CommandExt;
    for arg in args {
        command.raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn push_args(command: &mut Command, args: &[String]) {
    command.args(args);
}

impl Executor for SubprocessExecutor {
    fn execute(&self, package: &str, entry_point: &str, args: &InvocationArgs) -> Result<i32> {
        let entry = Path::new(entry_point);
        check_runtime_version(&self.runtime, &self.min_runtime_version, entry)?;

        let script = build_subprocess_script(entry_point, args)?;
        tracing::debug!(package, runtime = %self.runtime, %script, "spawning command");
        let _guard = ChildGuard::enter();
        let status = self
            .command(&script)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|err| {
                anyhow::Error::new(err).context(DorseyError::DispatchSpawnFailed {
                    program: self.runtime.clone(),
                    entry: entry.to_path_buf(),
                })
            })?;

        let code = exit_code_of(status);
        tracing::debug!(package, code, "command exited");
        Ok(code)
    }
}

/// Exit status as a shell would report it: signals become `128 + signal`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Runs commands compiled into the binary; anything else goes to the
/// subprocess executor.
pub struct InProcessExecutor {
    commands: CommandRegistry,
    fallback: SubprocessExecutor,
}

impl InProcessExecutor {
    pub fn new(commands: CommandRegistry, fallback: SubprocessExecutor) -> Self {
        Self { commands, fallback }
    }
}

impl Executor for InProcessExecutor {
    fn execute(&self, package: &str, entry_point: &str, args: &InvocationArgs) -> Result<i32> {
        let Some(mut command) = self.commands.create(package) else {
            tracing::debug!(package, "no in-process command registered, using subprocess");
            return self.fallback.execute(package, entry_point, args);
        };
        tracing::debug!(package, "running in-process command");
        run_lifecycle(command.as_mut(), args)
    }
}
