//! Virtual filesystems
//!
//! A [`Filesystem`] is a read-only tree that can be walked in a stable
//! order and whose regular files can be opened for streaming. The
//! exporter composes these views and hands the result to the tar encoder;
//! no implementation here writes to disk.

pub mod dir;
pub mod mem;
pub mod overlay;
pub mod subdir;

pub use dir::DirFs;
pub use mem::MemFs;
pub use overlay::{MergedFs, RetimedFs};
pub use subdir::{SubDir, SubDirFs};

use crate::domain::Result;
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;

/// Kind of filesystem entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Directory
    Dir,
    /// Regular file
    File,
    /// Symbolic link with its target
    Symlink(String),
}

/// Metadata of one filesystem entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Path relative to the filesystem root, `/`-separated, no leading slash
    pub path: String,

    /// Entry kind
    pub kind: EntryKind,

    /// Permission bits
    pub mode: u32,

    /// Size in bytes (zero for directories and links)
    pub size: u64,

    /// Owner user id
    pub uid: u32,

    /// Owner group id
    pub gid: u32,

    /// Modification time in nanoseconds since the Unix epoch
    pub mod_time: i64,
}

impl Stat {
    /// Creates a directory stat
    pub fn dir(path: impl Into<String>, mode: u32) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
            mode,
            size: 0,
            uid: 0,
            gid: 0,
            mod_time: 0,
        }
    }

    /// Creates a regular file stat
    pub fn file(path: impl Into<String>, size: u64, mode: u32) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            mode,
            size,
            uid: 0,
            gid: 0,
            mod_time: 0,
        }
    }

    /// Creates a symlink stat
    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Symlink(target.into()),
            mode: 0o777,
            size: 0,
            uid: 0,
            gid: 0,
            mod_time: 0,
        }
    }

    /// Sets the modification time
    pub fn with_mod_time(mut self, mod_time: i64) -> Self {
        self.mod_time = mod_time;
        self
    }

    /// Returns `true` for directories
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Returns `true` for regular files
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Modification time in whole seconds, clamped to the epoch
    pub fn mod_time_secs(&self) -> u64 {
        u64::try_from(self.mod_time.div_euclid(1_000_000_000)).unwrap_or(0)
    }
}

/// Read-only filesystem view
pub trait Filesystem: Send + Sync + fmt::Debug {
    /// Returns every entry, parents before children, siblings in lexical order
    fn walk(&self) -> Result<Vec<Stat>>;

    /// Opens a regular file for reading
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>>;
}

/// Orders paths component by component so a directory sorts directly
/// before its own children
pub fn walk_order(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

/// Joins a relative path onto a prefix directory
pub(crate) fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}
