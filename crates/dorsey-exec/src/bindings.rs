use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::Result;
use dorsey_core::DorseyError;

/// Commands dispatched to a dynamically fetched package.
pub const BUILTIN_BINDINGS: &[(&str, &str)] = &[("init", "@imooc-cli/init")];

/// Immutable command name to package name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBindings {
    table: BTreeMap<&'static str, &'static str>,
}

impl CommandBindings {
    pub fn new(entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            table: entries.iter().copied().collect(),
        }
    }

    /// The table shipped with the binary, built on first use.
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<CommandBindings> = OnceLock::new();
        BUILTIN.get_or_init(|| Self::new(BUILTIN_BINDINGS))
    }

    pub fn lookup(&self, command: &str) -> Result<&'static str> {
        self.table
            .get(command)
            .copied()
            .ok_or_else(|| DorseyError::UnknownCommand(command.to_string()).into())
    }

    pub fn commands(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }
}
