//! Atomic I/O operations with file locking
//!
//! The persisted stores read under a shared advisory lock and write through
//! a temp file that is renamed over the target while an exclusive lock is
//! held on it.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Error, NormalizedPath, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Lock the target itself so concurrent writers serialize on it
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&native_path)
        .map_err(|e| Error::io(&native_path, e))?;
    lock_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    // Temp file in same directory (ensures same filesystem)
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    drop(temp_file);

    fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e))?;

    // Lock released when lock_file is dropped
    Ok(())
}

/// Read a file's bytes under a shared lock.
///
/// Reads through the locked handle to avoid a TOCTOU race with
/// [`write_atomic`].
pub fn read_locked(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    let file = File::open(&native_path).map_err(|e| Error::io(&native_path, e))?;
    file.lock_shared().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    let mut content = Vec::new();
    (&file)
        .read_to_end(&mut content)
        .map_err(|e| Error::io(&native_path, e))?;
    Ok(content)
}

/// Read a file's bytes without locking.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}
