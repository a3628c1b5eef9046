//! Change detection baseline
//!
//! The processor skips a run when nothing changed since the last one. In
//! [`WatchMode::Watch`] a recursive `notify` watcher on the registry root
//! flips a flag on every create, modify or remove event; the processor
//! resets it when a run ends. In [`WatchMode::Always`] every run proceeds.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;

/// How the watcher decides whether the registry changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Report a modification on every check
    #[default]
    Always,
    /// Track filesystem events under the registry root
    Watch,
}

/// Tracks whether the registry changed since the last reset
pub struct SynchronizationWatcher {
    mode: WatchMode,
    modified: Arc<AtomicBool>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl Default for SynchronizationWatcher {
    fn default() -> Self {
        Self::new(WatchMode::default())
    }
}

impl SynchronizationWatcher {
    pub fn new(mode: WatchMode) -> Self {
        Self {
            mode,
            modified: Arc::new(AtomicBool::new(false)),
            watcher: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Start watching `root`; a no-op in [`WatchMode::Always`] or when
    /// already watching
    pub fn initialize(&self, root: &Path) -> Result<()> {
        if self.mode == WatchMode::Always {
            return Ok(());
        }
        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Ok(());
        }

        let modified = Arc::clone(&self.modified);
        let roots = watched_roots(root);
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if is_relevant(&event, &roots) {
                    tracing::trace!(paths = ?event.paths, kind = ?event.kind, "Registry changed");
                    modified.store(true, Ordering::SeqCst);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Watcher error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        tracing::debug!(root = %root.display(), "Watching registry");
        *slot = Some(watcher);
        Ok(())
    }

    /// Whether the registry changed since the last [`reset`](Self::reset)
    pub fn is_modified(&self) -> bool {
        match self.mode {
            WatchMode::Always => true,
            WatchMode::Watch => self.modified.load(Ordering::SeqCst),
        }
    }

    /// Clear the modification flag
    pub fn reset(&self) {
        self.modified.store(false, Ordering::SeqCst);
    }

    /// Force the next check to report a modification
    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SynchronizationWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizationWatcher")
            .field("mode", &self.mode)
            .field("modified", &self.modified.load(Ordering::SeqCst))
            .field("watching", &self.watcher.lock().is_some())
            .finish()
    }
}

/// The root as given and canonicalized, since events may report either
fn watched_roots(root: &Path) -> Vec<PathBuf> {
    let mut roots = vec![root.to_path_buf()];
    if let Ok(canonical) = std::fs::canonicalize(root) {
        if canonical != root {
            roots.push(canonical);
        }
    }
    roots
}

/// Content changes outside hidden entries; engine state lives in a hidden
/// directory under the root and must not retrigger runs
fn is_relevant(event: &Event, roots: &[PathBuf]) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    ) {
        return false;
    }
    event.paths.iter().any(|path| {
        let relative = roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path.as_path());
        !relative.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        })
    })
}
