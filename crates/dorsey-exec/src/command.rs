use std::collections::BTreeMap;

use anyhow::Result;

use crate::invocation::InvocationArgs;

/// A command compiled into the binary.
///
/// The dispatcher drives every instance through the same lifecycle:
/// `check_preconditions`, then `initialize_from_args`, then `run`.
pub trait Command {
    fn check_preconditions(&self) -> Result<()> {
        Ok(())
    }

    fn initialize_from_args(&mut self, args: &InvocationArgs) -> Result<()>;

    /// Returns the exit status of the command.
    fn run(&mut self) -> Result<i32>;
}

pub type CommandFactory = fn() -> Box<dyn Command>;

pub fn run_lifecycle(command: &mut dyn Command, args: &InvocationArgs) -> Result<i32> {
    command.check_preconditions()?;
    command.initialize_from_args(args)?;
    command.run()
}

/// In-process commands keyed by the package name they stand in for.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    factories: BTreeMap<String, CommandFactory>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, package: impl Into<String>, factory: CommandFactory) -> Self {
        self.factories.insert(package.into(), factory);
        self
    }

    pub fn contains(&self, package: &str) -> bool {
        self.factories.contains_key(package)
    }

    pub fn create(&self, package: &str) -> Option<Box<dyn Command>> {
        self.factories.get(package).map(|factory| factory())
    }
}
