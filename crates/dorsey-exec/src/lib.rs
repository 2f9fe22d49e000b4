mod bindings;
mod command;
mod command_line;
mod dispatch;
mod executor;
mod interrupt;
mod invocation;
mod runtime;

pub use bindings::{CommandBindings, BUILTIN_BINDINGS};
pub use command::{run_lifecycle, Command, CommandFactory, CommandRegistry};
pub use command_line::runtime_command_line;
pub use dispatch::{DispatchEvents, DispatchOutcome, Dispatcher, SilentEvents};
pub use executor::{exit_code_of, Executor, InProcessExecutor, SubprocessExecutor};
pub use invocation::{build_subprocess_script, CommandOptions, GlobalOptions, InvocationArgs};
pub use runtime::{check_runtime_version, parse_runtime_version};
