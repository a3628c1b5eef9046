//! Watch loop

use std::thread;
use std::time::Duration;

use colored::Colorize;

use sync_core::{EngineConfig, RunOutcome, SkipReason, SynchronizationProcessor};

use crate::error::Result;

use super::prepared_processor;
use super::run::print_report;

/// Run the watch command
///
/// Polls the engine every `interval` seconds. The filesystem watcher limits
/// processing to checks where the registry changed. Failed runs, including
/// ones aborted by an unreachable root or store, are reported and the loop
/// continues.
pub fn run_watch(config: &EngineConfig, interval: u64, iterations: Option<usize>) -> Result<()> {
    let mut config = config.clone();
    config.watch = true;
    let processor = prepared_processor(&config)?;

    println!(
        "{} Watching {} (every {interval}s)",
        "=>".blue().bold(),
        config.registry_root.display()
    );

    let mut checks = 0;
    loop {
        check(&processor);

        checks += 1;
        if iterations.is_some_and(|limit| checks >= limit) {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(interval));
    }
}

/// Run one change check, reporting instead of propagating failures
///
/// Returns false when the check failed.
fn check(processor: &SynchronizationProcessor) -> bool {
    match processor.process_synchronizers() {
        Ok(RunOutcome::Completed(report)) => print_report(&report),
        Ok(RunOutcome::Skipped(SkipReason::Unchanged)) => {
            tracing::trace!("Registry unchanged");
        }
        Ok(RunOutcome::Skipped(reason)) => {
            tracing::debug!(?reason, "Synchronization skipped");
        }
        Err(e) => {
            tracing::error!(error = %e, "Synchronization failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sync_core::{Definition, RecordStore, SynchronizerRegistry};
    use tempfile::TempDir;

    fn processor(root: &std::path::Path) -> SynchronizationProcessor {
        let processor = SynchronizationProcessor::new(
            root,
            SynchronizerRegistry::new(),
            Arc::new(RecordStore::<Definition>::in_memory()),
        );
        processor.prepare_synchronizers().unwrap();
        processor
    }

    #[test]
    fn check_succeeds_on_reachable_root() {
        let temp = TempDir::new().unwrap();
        assert!(check(&processor(temp.path())));
    }

    #[test]
    fn failed_check_keeps_the_loop_alive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("registry");
        std::fs::create_dir_all(&root).unwrap();
        let processor = processor(&root);
        std::fs::remove_dir_all(&root).unwrap();

        assert!(!check(&processor));
        // The engine is idle again, so the next check runs instead of skipping
        assert!(!check(&processor));

        std::fs::create_dir_all(&root).unwrap();
        assert!(check(&processor));
    }
}
