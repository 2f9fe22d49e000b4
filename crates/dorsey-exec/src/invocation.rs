use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Flags given before the sub-command. Shared with every invocation but
/// never forwarded to the package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub debug: bool,
    pub target_path: Option<PathBuf>,
}

/// Named flags of a dispatched command.
///
/// Only the public option fields are serialized; the bookkeeping fields are
/// skipped so they can never reach the child process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    pub force: bool,
    #[serde(skip)]
    pub command_name: String,
    #[serde(skip)]
    pub global: Arc<GlobalOptions>,
}

impl CommandOptions {
    pub fn for_command(command_name: impl Into<String>, global: Arc<GlobalOptions>) -> Self {
        Self {
            force: false,
            command_name: command_name.into(),
            global,
        }
    }

    pub fn sanitized(&self) -> Result<Value> {
        serde_json::to_value(self).context("failed to serialize command options")
    }
}

/// Positional arguments plus the command's options, in parse order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationArgs {
    pub positionals: Vec<String>,
    pub options: CommandOptions,
}

impl InvocationArgs {
    pub fn new(positionals: Vec<String>, options: CommandOptions) -> Self {
        Self {
            positionals,
            options,
        }
    }

    pub fn command_name(&self) -> &str {
        &self.options.command_name
    }

    /// Positionals followed by the sanitized options object; the argument
    /// list handed to the package's exported function.
    pub fn script_arguments(&self) -> Result<Value> {
        let mut values: Vec<Value> = self
            .positionals
            .iter()
            .cloned()
            .map(Value::String)
            .collect();
        values.push(self.options.sanitized()?);
        Ok(Value::Array(values))
    }
}

/// `require('<entry>').call(null, <args>)`, evaluated by the runtime with `-e`.
pub fn build_subprocess_script(entry_point: &str, args: &InvocationArgs) -> Result<String> {
    let arguments = serde_json::to_string(&args.script_arguments()?)
        .context("failed to encode script arguments")?;
    Ok(format!(
        "require('{}').call(null, {})",
        escape_single_quoted(entry_point),
        arguments
    ))
}

fn escape_single_quoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}
