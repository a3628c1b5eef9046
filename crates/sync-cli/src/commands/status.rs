//! Status command implementation

use colored::{ColoredString, Colorize};
use serde::Serialize;

use sync_core::processor::{DEFINITIONS_FILE, PROBLEMS_FILE};
use sync_core::{Definition, DefinitionState, EngineConfig, Problem, RecordStore};

use crate::error::Result;

#[derive(Serialize)]
struct Status {
    definitions: Vec<Definition>,
    problems: Vec<Problem>,
}

/// Run the status command
///
/// Reads the persisted state without running a synchronization.
pub fn run_status(config: &EngineConfig, json: bool) -> Result<()> {
    let definitions = RecordStore::<Definition>::open(config.state_dir.join(DEFINITIONS_FILE))?;
    let problems = RecordStore::<Problem>::open(config.state_dir.join(PROBLEMS_FILE))?;

    let mut status = Status {
        definitions: definitions.all(),
        problems: problems.all(),
    };
    status.definitions.sort_by(|a, b| a.location.cmp(&b.location));
    status.problems.sort_by(|a, b| a.artefact_key.cmp(&b.artefact_key));

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Registry Status".bold());
    println!();
    println!("{}:   {}", "Root".dimmed(), config.registry_root.display());
    println!("{}:  {}", "State".dimmed(), config.state_dir.display());
    println!();

    println!("{}:", "Definitions".bold());
    if status.definitions.is_empty() {
        println!("  {} (use {} to scan)", "None".dimmed(), "artefact-sync run".cyan());
    }
    for definition in &status.definitions {
        print!("  {:<9} {}", colored_state(definition.state), definition.location.cyan());
        if definition.message.is_empty() {
            println!();
        } else {
            println!("  {}", definition.message.dimmed());
        }
    }
    println!();

    println!("{}:", "Problems".bold());
    if status.problems.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for problem in &status.problems {
        println!("  {} {}", "!".red(), problem.artefact_key.cyan());
        println!("    {}", problem.message);
    }

    Ok(())
}

fn colored_state(state: DefinitionState) -> ColoredString {
    let label = state.to_string();
    match state {
        DefinitionState::Parsed => label.green(),
        DefinitionState::New | DefinitionState::Modified => label.yellow(),
        DefinitionState::Broken => label.red().bold(),
        DefinitionState::Deleted => label.dimmed(),
    }
}
