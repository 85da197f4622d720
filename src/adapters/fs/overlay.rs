//! Filesystem wrappers: timestamp rewriting and layered merging

use super::{walk_order, Filesystem, Stat};
use crate::domain::{ExporterError, FsError, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

/// Rewrites the modification time of every entry to a fixed value
#[derive(Debug, Clone)]
pub struct RetimedFs {
    inner: Arc<dyn Filesystem>,
    mod_time: i64,
}

impl RetimedFs {
    /// Wraps `inner`, reporting `mod_time` (Unix nanoseconds) for all entries
    pub fn new(inner: Arc<dyn Filesystem>, mod_time: i64) -> Self {
        Self { inner, mod_time }
    }
}

impl Filesystem for RetimedFs {
    fn walk(&self) -> Result<Vec<Stat>> {
        Ok(self
            .inner
            .walk()?
            .into_iter()
            .map(|stat| stat.with_mod_time(self.mod_time))
            .collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        self.inner.open(path)
    }
}

/// Overlay of several filesystems
///
/// Later layers shadow earlier ones when both contain the same path.
#[derive(Debug, Clone)]
pub struct MergedFs {
    layers: Vec<Arc<dyn Filesystem>>,
}

impl MergedFs {
    /// Creates an overlay; `layers[0]` is the bottom layer
    pub fn new(layers: Vec<Arc<dyn Filesystem>>) -> Self {
        Self { layers }
    }
}

impl Filesystem for MergedFs {
    fn walk(&self) -> Result<Vec<Stat>> {
        let mut merged: BTreeMap<String, Stat> = BTreeMap::new();
        for layer in &self.layers {
            for stat in layer.walk()? {
                merged.insert(stat.path.clone(), stat);
            }
        }
        let mut stats: Vec<Stat> = merged.into_values().collect();
        stats.sort_by(|a, b| walk_order(&a.path, &b.path));
        Ok(stats)
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        for layer in self.layers.iter().rev() {
            match layer.open(path) {
                Err(ExporterError::Fs(FsError::NotFound(_))) => continue,
                other => return other,
            }
        }
        Err(FsError::NotFound(path.to_string()).into())
    }
}
