//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Artefact Sync - Reconcile a content registry with the artefacts it declares
#[derive(Parser, Debug)]
#[command(name = "artefact-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry root (defaults to the current directory)
    #[arg(short, long, global = true, env = "ARTEFACT_SYNC_ROOT")]
    pub root: Option<PathBuf>,

    /// Engine configuration (defaults to <root>/.artefacts/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one synchronization over the registry
    Run {
        /// Output the run report as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Synchronize repeatedly, processing only when the registry changed
    Watch {
        /// Seconds between two change checks
        #[arg(short, long, default_value_t = 5)]
        interval: u64,

        /// Stop after this many checks
        #[arg(long)]
        iterations: Option<usize>,
    },

    /// List known definitions with their state and recorded problems
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_with_json() {
        let cli = Cli::parse_from(["artefact-sync", "run", "--json"]);
        assert_eq!(cli.command, Some(Commands::Run { json: true }));
        assert!(cli.root.is_none());
    }

    #[test]
    fn parse_watch_defaults() {
        let cli = Cli::parse_from(["artefact-sync", "watch"]);
        assert_eq!(
            cli.command,
            Some(Commands::Watch {
                interval: 5,
                iterations: None
            })
        );
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "artefact-sync",
            "status",
            "--root",
            "/srv/registry",
            "--config",
            "/etc/artefacts.toml",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/registry")));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/artefacts.toml")));
    }

    #[test]
    fn no_command_is_allowed() {
        let cli = Cli::parse_from(["artefact-sync"]);
        assert!(cli.command.is_none());
    }
}
