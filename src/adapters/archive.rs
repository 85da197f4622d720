//! Streaming tar encoder

use crate::adapters::fs::{EntryKind, Filesystem, Stat};
use crate::adapters::traits::{FileSink, TarEncoder};
use crate::core::cancel::Cancellation;
use crate::domain::{ExporterError, Result};
use async_trait::async_trait;
use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::sync::Arc;
use tar::{Builder, EntryType, Header};

/// Tar encoder built on the `tar` crate
///
/// Headers carry only what the filesystem reports (mode, ownership,
/// mtime); user and group names are left empty so identical trees encode
/// to identical bytes. Directory names end with `/`.
#[derive(Debug, Clone, Default)]
pub struct TarStreamWriter;

impl TarStreamWriter {
    /// Creates an encoder
    pub fn new() -> Self {
        Self
    }

    async fn append_all<W: Write + Send>(
        &self,
        builder: &mut Builder<W>,
        fs: &dyn Filesystem,
        cancel: &Cancellation,
    ) -> Result<usize> {
        let entries = fs.walk()?;
        let count = entries.len();
        for stat in entries {
            cancel.check("serialization")?;
            append_entry(builder, fs, &stat).map_err(|e| stream_error(cancel, &stat.path, e))?;
            tokio::task::yield_now().await;
        }
        Ok(count)
    }
}

/// Sink wrapper refusing further bytes once the export is cancelled
///
/// Checked on every write, so cancellation takes effect within an entry.
struct CancellableWriter<'a, W> {
    inner: W,
    cancel: &'a Cancellation,
}

impl<W: Write> Write for CancellableWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, "export cancelled"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn stream_error(cancel: &Cancellation, what: &str, e: io::Error) -> ExporterError {
    if cancel.is_cancelled() {
        ExporterError::Cancelled("serialization")
    } else {
        ExporterError::Serialization(format!("failed to write {what}: {e}"))
    }
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    fs: &dyn Filesystem,
    stat: &Stat,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_mode(stat.mode & 0o7777);
    header.set_uid(u64::from(stat.uid));
    header.set_gid(u64::from(stat.gid));
    header.set_mtime(stat.mod_time_secs());
    header.set_username("")?;
    header.set_groupname("")?;

    match &stat.kind {
        EntryKind::Dir => {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            builder.append_data(&mut header, format!("{}/", stat.path), io::empty())
        }
        EntryKind::File => {
            header.set_entry_type(EntryType::Regular);
            header.set_size(stat.size);
            let reader = fs
                .open(&stat.path)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            builder.append_data(&mut header, &stat.path, reader)
        }
        EntryKind::Symlink(target) => {
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            builder.append_link(&mut header, &stat.path, target)
        }
    }
}

#[async_trait]
impl TarEncoder for TarStreamWriter {
    async fn write_tar(
        &self,
        fs: Arc<dyn Filesystem>,
        sink: &mut dyn FileSink,
        cancel: &Cancellation,
    ) -> Result<()> {
        // never dropped: dropping a builder appends the end-of-archive
        // trailer, which a failed or cancelled stream must not carry
        let mut builder = ManuallyDrop::new(Builder::new(CancellableWriter {
            inner: sink,
            cancel,
        }));
        let count = self.append_all(&mut *builder, fs.as_ref(), cancel).await?;
        builder
            .finish()
            .map_err(|e| stream_error(cancel, "end-of-archive trailer", e))?;
        tracing::debug!(entries = count, "Tar stream written");
        Ok(())
    }
}
