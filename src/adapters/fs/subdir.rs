//! Union of named sub-directories

use super::{join, Filesystem, Stat};
use crate::domain::{FsError, Result};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

/// A filesystem placed under a single named directory entry
#[derive(Debug, Clone)]
pub struct SubDir {
    /// Directory entry; `stat.path` is the entry name
    pub stat: Stat,

    /// Contents of the directory
    pub fs: Arc<dyn Filesystem>,
}

/// Filesystem whose top level is a list of named directories
///
/// Directories are emitted in the order given, each followed by its own
/// contents.
#[derive(Debug, Clone)]
pub struct SubDirFs {
    dirs: Vec<SubDir>,
}

impl SubDirFs {
    /// Builds the union
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if a name is empty, `.`/`..`, or contains a separator
    /// - [`FsError::DuplicatePath`] if two directories share a name
    pub fn new(dirs: Vec<SubDir>) -> Result<Self> {
        let mut seen = HashSet::new();
        for dir in &dirs {
            let name = dir.stat.path.as_str();
            if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                return Err(FsError::InvalidPath(name.to_string()).into());
            }
            if !seen.insert(name) {
                return Err(FsError::DuplicatePath(name.to_string()).into());
            }
        }
        Ok(Self { dirs })
    }

    /// Names of the top-level directories, in emission order
    pub fn names(&self) -> Vec<&str> {
        self.dirs.iter().map(|d| d.stat.path.as_str()).collect()
    }
}

impl Filesystem for SubDirFs {
    fn walk(&self) -> Result<Vec<Stat>> {
        let mut stats = Vec::new();
        for dir in &self.dirs {
            let mut root = dir.stat.clone();
            root.kind = super::EntryKind::Dir;
            stats.push(root);
            for mut stat in dir.fs.walk()? {
                stat.path = join(&dir.stat.path, &stat.path);
                stats.push(stat);
            }
        }
        Ok(stats)
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let path = path.trim_start_matches('/');
        let (name, rest) = path.split_once('/').unwrap_or((path, ""));
        match self.dirs.iter().find(|d| d.stat.path == name) {
            Some(dir) if !rest.is_empty() => dir.fs.open(rest),
            _ => Err(FsError::NotFound(path.to_string()).into()),
        }
    }
}
