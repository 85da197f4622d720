//! In-memory filesystem

use super::{walk_order, EntryKind, Filesystem, Stat};
use crate::domain::{FsError, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// In-memory filesystem
///
/// Parent directories are created implicitly (mode `0755`) when a nested
/// entry is added. Every entry added after [`MemFs::stamped`] carries that
/// modification time.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    entries: BTreeMap<String, (Stat, Option<Arc<Vec<u8>>>)>,
    mod_time: i64,
}

impl MemFs {
    /// Creates an empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the modification time applied to entries added from now on
    pub fn stamped(mut self, mod_time: i64) -> Self {
        self.mod_time = mod_time;
        self
    }

    /// Adds a directory
    pub fn add_dir(&mut self, path: &str, mode: u32) -> &mut Self {
        let path = normalize(path);
        self.ensure_parents(&path);
        let stat = Stat::dir(path.clone(), mode).with_mod_time(self.mod_time);
        self.entries.insert(path, (stat, None));
        self
    }

    /// Adds a regular file
    pub fn add_file(&mut self, path: &str, data: impl Into<Vec<u8>>, mode: u32) -> &mut Self {
        let path = normalize(path);
        self.ensure_parents(&path);
        let data = data.into();
        let stat = Stat::file(path.clone(), data.len() as u64, mode).with_mod_time(self.mod_time);
        self.entries.insert(path, (stat, Some(Arc::new(data))));
        self
    }

    /// Adds a symbolic link
    pub fn add_symlink(&mut self, path: &str, target: &str) -> &mut Self {
        let path = normalize(path);
        self.ensure_parents(&path);
        let stat = Stat::symlink(path.clone(), target).with_mod_time(self.mod_time);
        self.entries.insert(path, (stat, None));
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the filesystem has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut parent = String::new();
        let segments: Vec<&str> = path.split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            parent = super::join(&parent, segment);
            if !self.entries.contains_key(&parent) {
                let stat = Stat::dir(parent.clone(), 0o755).with_mod_time(self.mod_time);
                self.entries.insert(parent.clone(), (stat, None));
            }
        }
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl Filesystem for MemFs {
    fn walk(&self) -> Result<Vec<Stat>> {
        let mut stats: Vec<Stat> = self.entries.values().map(|(s, _)| s.clone()).collect();
        stats.sort_by(|a, b| walk_order(&a.path, &b.path));
        Ok(stats)
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        match self.entries.get(&normalize(path)) {
            Some((stat, Some(data))) if stat.kind == EntryKind::File => {
                Ok(Box::new(Cursor::new(ArcBytes(data.clone()))))
            }
            _ => Err(FsError::NotFound(path.to_string()).into()),
        }
    }
}

struct ArcBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for ArcBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
