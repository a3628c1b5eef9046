//! One-shot synchronization

use colored::Colorize;

use sync_core::{EngineConfig, RunOutcome, SyncReport};

use crate::error::{CliError, Result};

use super::prepared_processor;

/// Run the run command
///
/// Performs exactly one synchronization and fails when the run recorded
/// errors.
pub fn run_once(config: &EngineConfig, json: bool) -> Result<()> {
    let processor = prepared_processor(config)?;

    if !json {
        println!(
            "{} Synchronizing {}...",
            "=>".blue().bold(),
            config.registry_root.display()
        );
    }

    let report = match processor.process_synchronizers()? {
        RunOutcome::Completed(report) => report,
        RunOutcome::Skipped(reason) => {
            return Err(CliError::user(format!("Synchronization skipped: {reason:?}")));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.success() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "Synchronization finished with {} error(s)",
            report.errors.len()
        )))
    }
}

/// Print a human readable run summary
pub(crate) fn print_report(report: &SyncReport) {
    if !report.processed {
        println!(
            "{} Already synchronized. {} artefact(s) up to date.",
            "OK".green().bold(),
            report.total
        );
    } else if report.success() {
        println!("{} Synchronization complete:", "OK".green().bold());
    } else {
        println!("{} Synchronization finished with errors:", "ERROR".red().bold());
    }

    if report.processed {
        for (label, count) in [
            ("new", report.new),
            ("modified", report.modified),
            ("created", report.created),
            ("updated", report.updated),
            ("started", report.started),
            ("failed", report.failed),
        ] {
            if count > 0 {
                println!("   {} {count} {label}", "+".green());
            }
        }
        println!("   {} {} total", "=".dimmed(), report.total);
    }

    for location in &report.broken {
        println!("   {} {} {}", "!".yellow(), "broken".yellow(), location.cyan());
    }
    for location in &report.deleted {
        println!("   {} {} {}", "-".yellow(), "deleted".yellow(), location.cyan());
    }
    for key in &report.cleaned_up {
        println!("   {} {} {}", "-".dimmed(), "cleaned up".dimmed(), key);
    }
    for cycle in &report.cycles {
        println!("   {} {} {}", "!".red(), "cycle".red(), cycle.join(" -> "));
    }
    for error in &report.errors {
        println!("   {} {}", "!".red(), error);
    }
}
