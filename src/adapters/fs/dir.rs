//! Filesystem backed by a directory on disk

use super::{Filesystem, Stat};
use crate::adapters::fs::EntryKind;
use crate::domain::{FsError, Result};
use std::fs::{self, File, Metadata};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Directory-backed filesystem
///
/// Walks with `walkdir`, never follows symlinks, and reports real
/// permission bits, ownership and modification times.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// Creates a view over `root`
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] if `root` is not a directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FsError::NotFound(root.display().to_string()).into());
        }
        Ok(Self { root })
    }

    /// Root directory of this view
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(FsError::InvalidPath(path.to_string()).into());
        }
        Ok(self.root.join(relative))
    }
}

impl Filesystem for DirFs {
    fn walk(&self) -> Result<Vec<Stat>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| FsError::Io {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string()),
                message: e.to_string(),
            })?;
            let io_err = |e: std::io::Error| FsError::Io {
                path: entry.path().display().to_string(),
                message: e.to_string(),
            };

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| FsError::InvalidPath(e.to_string()))?;
            let rel_path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let metadata = entry.metadata().map_err(|e| FsError::Io {
                path: entry.path().display().to_string(),
                message: e.to_string(),
            })?;
            let file_type = metadata.file_type();

            let mut stat = if file_type.is_dir() {
                Stat::dir(rel_path, 0o755)
            } else if file_type.is_symlink() {
                let target = fs::read_link(entry.path()).map_err(io_err)?;
                Stat::symlink(rel_path, target.to_string_lossy())
            } else if file_type.is_file() {
                Stat::file(rel_path, metadata.len(), 0o644)
            } else {
                tracing::debug!(path = %entry.path().display(), "skipping special file");
                continue;
            };
            apply_metadata(&mut stat, &metadata);
            entries.push(stat);
        }
        Ok(entries)
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path)?;
        let file = File::open(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            _ => FsError::Io {
                path: full.display().to_string(),
                message: e.to_string(),
            },
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn apply_metadata(stat: &mut Stat, metadata: &Metadata) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if !matches!(stat.kind, EntryKind::Symlink(_)) {
            stat.mode = metadata.mode() & 0o7777;
        }
        stat.uid = metadata.uid();
        stat.gid = metadata.gid();
    }

    if let Ok(modified) = metadata.modified() {
        stat.mod_time = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
        };
    }
}
