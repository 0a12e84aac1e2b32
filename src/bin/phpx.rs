// src/bin/phpx.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::*;
use phpx::{
    cli::{
        Cli,
        handlers::{self, commons::AppContext},
    },
    constants::FAILURE_EXIT_CODE,
    core::{catalog::Catalog, paths::Settings, resolver::ResolveError},
    t,
};
use std::process;

// --- Command Definition and Registry ---

/// A built-in command, its aliases, and its handler.
/// Handlers return the process exit code.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &AppContext) -> Result<i32>,
}

/// Every built-in command. Anything else on the command line is a package spec.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "exec",
        aliases: &["execute"],
        handler: handlers::exec::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["list-phars"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "versions",
        aliases: &["phar-versions"],
        handler: handlers::versions::handle,
    },
    CommandDefinition {
        name: "cache",
        aliases: &[],
        handler: handlers::cache::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "phpx=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Entry point: parse, dispatch, and turn the outcome into an exit code.
fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run_cli(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            // Installer output first, then the one-line diagnostic.
            if let Some(ResolveError::InstallFailed { output, .. }) = e.downcast_ref::<ResolveError>()
                && !output.trim().is_empty()
            {
                eprintln!("{}", output.trim_end().dimmed());
            }
            eprintln!("{}: {}", t!("error.label").red().bold(), e);
            process::exit(FAILURE_EXIT_CODE);
        }
    }
}

/// Routes `phpx <command> ...` to its handler and `phpx <spec> ...` to `exec`.
fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut args = cli.args;
    if args.is_empty() {
        Cli::command().print_help()?;
        return Ok(0);
    }

    // 1. Settings and catalog are loaded once and passed down.
    let settings = Settings::from_env()?;
    let catalog = Catalog::load(settings.catalog_path.as_deref())?;
    let ctx = AppContext {
        settings,
        catalog,
        debug: cli.debug,
    };

    // 2. Dispatch.
    let first = args.remove(0);
    match find_command(&first) {
        Some(command) => (command.handler)(args, &ctx),
        None => {
            let mut exec_args = vec![first];
            exec_args.extend(args);
            handlers::exec::handle(exec_args, &ctx)
        }
    }
}
