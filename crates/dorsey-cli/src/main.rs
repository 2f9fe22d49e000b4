use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dorsey_core::{exit_code_for, CliConfig, ExecStrategy};
use dorsey_exec::{
    CommandOptions, CommandRegistry, Dispatcher, Executor, GlobalOptions, InProcessExecutor,
    InvocationArgs, SubprocessExecutor,
};
use dorsey_installer::RegistryFetcher;
use dorsey_registry::RegistryClient;

mod config;
mod init_command;
mod logging;
mod prepare;
mod render;

use config::ConfigOverrides;
use init_command::{InitCommand, INIT_PACKAGE};
use prepare::prepare;
use render::{current_output_style, TerminalEvents, TerminalRenderer};

pub const CLI_NAME: &str = "dorsey-cli";
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "dorsey")]
#[command(version, about = "Scaffolding tool that runs commands from versioned packages", long_about = None)]
struct Cli {
    /// Verbose logging.
    #[arg(short, long, global = true)]
    debug: bool,
    /// Run the command from a local package directory instead of the cache.
    #[arg(long, global = true, value_name = "PATH")]
    target_path: Option<PathBuf>,
    /// `origin`, `mirror`, or a registry base URL.
    #[arg(long, global = true, value_name = "REGISTRY")]
    registry: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a project.
    Init {
        project_name: Option<String>,
        /// Initialize even if the directory is not empty.
        #[arg(short, long)]
        force: bool,
    },
    /// Print a shell completion script.
    Completions { shell: Shell },
    Version,
}

fn main() {
    let cli = Cli::parse();
    let renderer = TerminalRenderer::from_style(current_output_style());
    let code = match run_cli(cli, renderer) {
        Ok(code) => code,
        Err(err) => {
            renderer.print_error(&err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run_cli(cli: Cli, renderer: TerminalRenderer) -> Result<i32> {
    let overrides = ConfigOverrides {
        debug: cli.debug,
        target_path: cli.target_path.clone(),
        registry: cli.registry.clone(),
    };

    match cli.command {
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions_script(shell, &mut stdout)?;
            Ok(0)
        }
        Commands::Version => {
            println!("{CLI_NAME} {CLI_VERSION}");
            Ok(0)
        }
        Commands::Init {
            project_name,
            force,
        } => {
            let config = prepare(&overrides, renderer)?;
            let global = Arc::new(GlobalOptions {
                debug: config.debug,
                target_path: config.target_path.clone(),
            });
            let mut options = CommandOptions::for_command("init", global);
            options.force = force;
            let args = InvocationArgs::new(project_name.into_iter().collect(), options);
            run_dispatch(&config, &args, renderer)
        }
    }
}

fn run_dispatch(config: &CliConfig, args: &InvocationArgs, renderer: TerminalRenderer) -> Result<i32> {
    let client = RegistryClient::from_config(&config.registry)?;
    let fetcher = RegistryFetcher::new(client.clone());
    let executor = build_executor(config)?;
    let events = TerminalEvents::new(renderer);

    let dispatcher =
        Dispatcher::new(config, &client, &fetcher, executor.as_ref()).with_events(&events);
    Ok(dispatcher.run(args))
}

fn build_executor(config: &CliConfig) -> Result<Box<dyn Executor>> {
    let subprocess = SubprocessExecutor::from_config(&config.exec)?;
    tracing::debug!(strategy = config.exec.strategy.as_str(), "selected exec strategy");
    Ok(match config.exec.strategy {
        ExecStrategy::Subprocess => Box::new(subprocess),
        ExecStrategy::InProcess => Box::new(InProcessExecutor::new(
            builtin_commands(),
            subprocess,
        )),
    })
}

fn builtin_commands() -> CommandRegistry {
    CommandRegistry::new().register(INIT_PACKAGE, InitCommand::boxed)
}

fn write_completions_script<W: Write>(shell: Shell, writer: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let mut generated = Vec::new();
    clap_complete::generate(shell, &mut command, "dorsey", &mut generated);
    writer
        .write_all(&generated)
        .with_context(|| "failed writing generated completion script")?;
    Ok(())
}
