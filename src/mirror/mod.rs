//! Mirror save engine
//!
//! This module writes fetched documents into a directory tree that mirrors
//! the site's URL space:
//! - URL to file path mapping
//! - Skipping writes for unchanged content (`Last-Modified`, then checksum)
//! - Hard links for identical content at different URLs
//! - Relative symlinks for URLs that redirected to a saved document
//! - Removal of files the current run no longer reached
//!
//! A [`MirrorStore`] holds the indices of one run. Every filesystem failure
//! carries the offending path.

mod gc;
mod index;
mod path;
mod store;

pub use gc::{collect_garbage, walk_files};
pub use index::{content_hash, ContentHashIndex, RedirectAliasIndex};
pub use path::filename_for_url;
pub use store::{MirrorStore, SaveOutcome, ARCHIVE_MARKER};

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem errors of the mirror
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Incomplete write to {path}: expected {expected} bytes, found {actual}")]
    ShortWrite {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to link {path} to {target}: {source}")]
    Link {
        path: PathBuf,
        target: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create symlink {path}: {source}")]
    Symlink {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Counters of one mirror run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Files written with fresh content
    pub written: usize,

    /// Files created as hard links to identical content
    pub linked: usize,

    /// Saves skipped because the file was unchanged
    pub skipped: usize,

    /// Redirect aliases created or repaired
    pub symlinked: usize,

    /// Stale files removed after the run
    pub deleted: usize,

    /// Saves or aliases that failed
    pub errors: usize,
}
