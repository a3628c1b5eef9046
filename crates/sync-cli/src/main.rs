//! Artefact Sync CLI
//!
//! The command-line interface for reconciling a content registry with the
//! artefacts its definition files declare.

mod cli;
mod commands;
mod context;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use context::EngineContext;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: failed to initialize logging: {e}", "warning".yellow().bold());
    }
    tracing::debug!("Verbose mode enabled");

    let Some(command) = cli.command else {
        println!("{} Artefact synchronization engine", "artefact-sync".green().bold());
        println!();
        println!("Run {} for available commands.", "artefact-sync --help".cyan());
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let context = EngineContext::resolve(&cwd, cli.root.as_deref(), cli.config.as_deref());
    let config = context.load_config()?;
    if !config.registry_root.is_dir() {
        return Err(CliError::user(format!(
            "Registry root {} is not a directory",
            config.registry_root.display()
        )));
    }

    match command {
        Commands::Run { json } => commands::run_once(&config, json),
        Commands::Watch {
            interval,
            iterations,
        } => commands::run_watch(&config, interval, iterations),
        Commands::Status { json } => commands::run_status(&config, json),
    }
}
