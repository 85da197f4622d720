//! Filesystem composition
//!
//! Pure structural step: no I/O happens here.

use crate::adapters::fs::{Filesystem, SubDir, SubDirFs};
use crate::core::export::materializer::MaterializedDir;
use crate::core::export::resolver::Layout;
use crate::domain::{ExporterError, FsError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Composes materialized directories into the filesystem that is streamed
///
/// With [`Layout::Flat`] the first directory's filesystem is returned as
/// is. With [`Layout::Nested`] every directory appears under its own name,
/// in the order given.
///
/// # Errors
///
/// - [`FsError::DuplicatePath`] if two directories share a name
/// - [`ExporterError::Other`] if there is nothing to compose in flat layout
pub fn compose(dirs: Vec<MaterializedDir>, layout: Layout) -> Result<Arc<dyn Filesystem>> {
    let mut seen = HashSet::new();
    for dir in &dirs {
        if !seen.insert(dir.name.as_str()) {
            return Err(FsError::DuplicatePath(dir.name.clone()).into());
        }
    }

    match layout {
        Layout::Flat => dirs
            .into_iter()
            .next()
            .map(|dir| dir.fs)
            .ok_or_else(|| ExporterError::Other("no directory to export".to_string())),
        Layout::Nested => {
            let subdirs = dirs
                .into_iter()
                .map(|dir| SubDir {
                    stat: dir.stat,
                    fs: dir.fs,
                })
                .collect();
            Ok(Arc::new(SubDirFs::new(subdirs)?))
        }
    }
}
