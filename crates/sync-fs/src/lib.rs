//! Filesystem layer for the artefact synchronization engine
//!
//! Provides registry-relative locations, content checksums, locked atomic
//! I/O for the persisted stores, and the repository tree walk.

pub mod checksum;
pub mod error;
pub mod io;
pub mod path;
pub mod walk;

pub use checksum::compute_checksum;
pub use error::{Error, Result};
pub use path::{NormalizedPath, location_of};
pub use walk::{WalkedFile, walk_files};
