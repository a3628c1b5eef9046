//! [`TestRegistry`] builder for synchronization test scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the engine state directory below the registry root.
pub const STATE_DIR: &str = ".artefacts";

/// A temporary registry root with helpers for writing definitions and
/// asserting on the engine's state files.
///
/// Locations are registry-relative and may start with `/`, exactly like the
/// locations the engine stores.
///
/// # Example
///
/// ```rust,no_run
/// use sync_test_utils::registry::TestRegistry;
///
/// let registry = TestRegistry::new();
/// registry.write("/shop/orders.table", "{}");
/// registry.write_config(&[("table", ".table")]);
/// registry.assert_file_exists("/shop/orders.table");
/// ```
pub struct TestRegistry {
    temp_dir: TempDir,
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRegistry {
    /// Create an empty temporary registry root.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the registry root.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Return the engine state directory (`<root>/.artefacts`).
    pub fn state_dir(&self) -> PathBuf {
        self.root().join(STATE_DIR)
    }

    /// Absolute path of a registry location.
    pub fn path(&self, location: &str) -> PathBuf {
        self.root().join(location.trim_start_matches('/'))
    }

    /// Write a definition file, creating parent directories.
    pub fn write(&self, location: &str, content: &str) -> PathBuf {
        let path = self.path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Remove a definition file.
    pub fn remove(&self, location: &str) {
        fs::remove_file(self.path(location))
            .unwrap_or_else(|e| panic!("Could not remove {location}: {e}"));
    }

    /// Read a file below the root as text.
    pub fn read(&self, location: &str) -> String {
        let path = self.path(location);
        fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", path.display()))
    }

    /// Write `<root>/.artefacts/config.toml` declaring the given
    /// `(type, extension)` kinds in order.
    pub fn write_config(&self, kinds: &[(&str, &str)]) -> PathBuf {
        let mut config = String::new();
        for (artefact_type, extension) in kinds {
            config.push_str(&format!(
                "[[kinds]]\ntype = \"{artefact_type}\"\nextension = \"{extension}\"\n\n"
            ));
        }
        self.write(&format!("{STATE_DIR}/config.toml"), &config)
    }

    /// Assert that `location` exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, location: &str) {
        let full_path = self.path(location);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `location` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, location: &str) {
        let full_path = self.path(location);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `location` contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, location: &str, content: &str) {
        let file_content = self.read(location);
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            location,
            content,
            file_content
        );
    }
}
