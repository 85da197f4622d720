//! Local refs and the local directory-construction collaborator
//!
//! [`LocalRef`] exposes a directory on disk as an immutable ref and
//! [`MemRef`] an in-memory tree. [`LocalFsFactory`] turns a ref plus its
//! attestations into the filesystem that is exported for one key.

use crate::adapters::fs::{DirFs, Filesystem, MemFs, MergedFs, RetimedFs};
use crate::adapters::traits::{Cleanup, CreateFsRequest, FsFactory, ImmutableRef, Mount};
use crate::domain::attestation::IN_TOTO_STATEMENT_TYPE;
use crate::domain::{Attestation, ExporterError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Permission bits of laid-out attestation files
const ATTESTATION_FILE_MODE: u32 = 0o600;

/// Ref backed by a directory on disk
#[derive(Debug, Clone)]
pub struct LocalRef {
    id: String,
    root: PathBuf,
}

impl LocalRef {
    /// Creates a ref over `root`
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }
}

impl ImmutableRef for LocalRef {
    fn id(&self) -> &str {
        &self.id
    }

    fn mount(&self) -> Result<Mount> {
        let fs = DirFs::new(&self.root)?;
        tracing::debug!(ref_id = %self.id, root = %self.root.display(), "Mounted local ref");
        Ok(Mount {
            fs: Arc::new(fs),
            release: None,
        })
    }
}

/// Ref backed by an in-memory tree
///
/// Each mount hands back a release action that bumps the shared counter
/// returned by [`MemRef::releases`].
#[derive(Debug, Clone)]
pub struct MemRef {
    id: String,
    fs: Arc<MemFs>,
    releases: Arc<AtomicUsize>,
}

impl MemRef {
    /// Creates a ref over `fs`
    pub fn new(id: impl Into<String>, fs: MemFs) -> Self {
        Self {
            id: id.into(),
            fs: Arc::new(fs),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of released mounts
    pub fn releases(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }
}

impl ImmutableRef for MemRef {
    fn id(&self) -> &str {
        &self.id
    }

    fn mount(&self) -> Result<Mount> {
        let releases = self.releases.clone();
        Ok(Mount {
            fs: self.fs.clone(),
            release: Some(Box::new(move || {
                releases.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
        })
    }
}

/// Directory-construction collaborator for local and in-memory refs
///
/// The exported tree is the mounted ref, overlaid with one in-toto
/// statement per attestation (named `<attestation-prefix><file name>`),
/// with every timestamp replaced by the epoch when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalFsFactory;

impl LocalFsFactory {
    /// Creates a factory
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FsFactory for LocalFsFactory {
    async fn create_fs(
        &self,
        request: CreateFsRequest<'_>,
    ) -> Result<(Arc<dyn Filesystem>, Option<Cleanup>)> {
        let (base, release): (Arc<dyn Filesystem>, Option<Cleanup>) = match request.reference {
            Some(reference) => {
                let mount = reference.mount()?;
                (mount.fs, mount.release)
            }
            None => (Arc::new(MemFs::new()) as Arc<dyn Filesystem>, None),
        };

        tracing::debug!(
            session_id = %request.session_id,
            key = request.key,
            attestations = request.attestations.len(),
            refs = request.all_refs.len(),
            "Creating export filesystem"
        );

        let mut fs = if request.attestations.is_empty() {
            base
        } else {
            // hashing reads every file of the ref
            let layout = {
                let base = base.clone();
                let attestations = request.attestations.to_vec();
                let prefix = request.options.attestation_prefix.clone();
                let timestamp = request.timestamp;
                tokio::task::spawn_blocking(move || {
                    layout_attestations(base.as_ref(), &attestations, &prefix, timestamp)
                })
                .await
                .map_err(|e| {
                    ExporterError::Other(format!("attestation layout task failed: {e}"))
                })
                .and_then(|layout| layout)
            };
            let layout = match layout {
                Ok(layout) => layout,
                Err(e) => {
                    if let Some(release) = release {
                        if let Err(release_err) = release() {
                            tracing::warn!(error = %release_err, "Failed to release mount");
                        }
                    }
                    return Err(e);
                }
            };
            let layout: Arc<dyn Filesystem> = Arc::new(layout);
            Arc::new(MergedFs::new(vec![base, layout])) as Arc<dyn Filesystem>
        };

        if let Some(epoch) = request.options.epoch {
            fs = Arc::new(RetimedFs::new(fs, unix_nanos(epoch)));
        }

        Ok((fs, release))
    }
}

/// Unix nanoseconds of a timestamp, saturating outside the representable range
pub fn unix_nanos(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt().unwrap_or(if time.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn layout_attestations(
    base: &dyn Filesystem,
    attestations: &[Attestation],
    prefix: &str,
    timestamp: DateTime<Utc>,
) -> Result<MemFs> {
    let subjects = file_subjects(base)?;
    let mut layout = MemFs::new().stamped(unix_nanos(timestamp));
    for attestation in attestations {
        let name = format!("{prefix}{}", attestation.file_name());
        let statement = json!({
            "_type": IN_TOTO_STATEMENT_TYPE,
            "predicateType": attestation.predicate_type,
            "subject": subjects,
            "predicate": attestation.predicate,
        });
        layout.add_file(
            &name,
            serde_json::to_vec_pretty(&statement)?,
            ATTESTATION_FILE_MODE,
        );
    }
    Ok(layout)
}

fn file_subjects(fs: &dyn Filesystem) -> Result<Vec<serde_json::Value>> {
    let mut subjects = Vec::new();
    for stat in fs.walk()? {
        if !stat.is_file() {
            continue;
        }
        let mut hasher = Sha256::new();
        let mut reader = fs.open(&stat.path)?;
        io::copy(&mut reader, &mut hasher)
            .map_err(|e| ExporterError::Io(format!("{}: {e}", stat.path)))?;
        subjects.push(json!({
            "name": stat.path,
            "digest": { "sha256": format!("{:x}", hasher.finalize()) },
        }));
    }
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::ExportOptions;
    use crate::domain::{RefMap, SessionId};
    use chrono::TimeZone;
    use std::io::Read;

    fn request<'a>(
        session_id: &'a SessionId,
        reference: Option<&'a Arc<dyn ImmutableRef>>,
        all_refs: &'a RefMap,
        attestations: &'a [Attestation],
        options: &'a ExportOptions,
    ) -> CreateFsRequest<'a> {
        CreateFsRequest {
            session_id,
            key: "",
            reference,
            all_refs,
            attestations,
            timestamp: Utc.timestamp_opt(1_000, 0).unwrap(),
            options,
        }
    }

    fn sample_ref() -> Arc<dyn ImmutableRef> {
        let mut fs = MemFs::new().stamped(5);
        fs.add_file("app", "hello", 0o755);
        Arc::new(MemRef::new("ref-1", fs))
    }

    #[tokio::test]
    async fn test_create_fs_passes_ref_through() {
        let session = SessionId::new("s").unwrap();
        let reference = sample_ref();
        let refs = RefMap::new();
        let options = ExportOptions::default();
        let (fs, cleanup) = LocalFsFactory::new()
            .create_fs(request(&session, Some(&reference), &refs, &[], &options))
            .await
            .unwrap();

        let stats = fs.walk().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].mod_time, 5);
        assert!(cleanup.is_some());
    }

    #[tokio::test]
    async fn test_create_fs_without_ref_is_empty() {
        let session = SessionId::new("s").unwrap();
        let refs = RefMap::new();
        let options = ExportOptions::default();
        let (fs, cleanup) = LocalFsFactory::new()
            .create_fs(request(&session, None, &refs, &[], &options))
            .await
            .unwrap();
        assert!(fs.walk().unwrap().is_empty());
        assert!(cleanup.is_none());
    }

    #[tokio::test]
    async fn test_create_fs_applies_epoch() {
        let session = SessionId::new("s").unwrap();
        let reference = sample_ref();
        let refs = RefMap::new();
        let options = ExportOptions {
            epoch: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            ..ExportOptions::default()
        };
        let (fs, _) = LocalFsFactory::new()
            .create_fs(request(&session, Some(&reference), &refs, &[], &options))
            .await
            .unwrap();
        assert!(fs
            .walk()
            .unwrap()
            .iter()
            .all(|s| s.mod_time == 1_700_000_000_000_000_000));
    }

    #[tokio::test]
    async fn test_create_fs_lays_out_attestations() {
        let session = SessionId::new("s").unwrap();
        let reference = sample_ref();
        let refs = RefMap::new();
        let options = ExportOptions {
            attestation_prefix: "att-".to_string(),
            ..ExportOptions::default()
        };
        let attestations = vec![Attestation::in_toto(
            "/out/provenance.json",
            "https://slsa.dev/provenance/v0.2",
            json!({"builder": {"id": "local"}}),
        )];
        let (fs, _) = LocalFsFactory::new()
            .create_fs(request(
                &session,
                Some(&reference),
                &refs,
                &attestations,
                &options,
            ))
            .await
            .unwrap();

        let stats = fs.walk().unwrap();
        let att = stats
            .iter()
            .find(|s| s.path == "att-provenance.json")
            .unwrap();
        assert_eq!(att.mode, ATTESTATION_FILE_MODE);
        assert_eq!(att.mod_time, 1_000_000_000_000);

        let mut body = String::new();
        fs.open("att-provenance.json")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        let statement: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(statement["_type"], IN_TOTO_STATEMENT_TYPE);
        assert_eq!(statement["subject"][0]["name"], "app");
        assert_eq!(
            statement["subject"][0]["digest"]["sha256"],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(statement["predicate"]["builder"]["id"], "local");
    }

    #[tokio::test]
    async fn test_attestation_hashing_does_not_block_the_runtime() {
        let session = SessionId::new("s").unwrap();
        let mut fs = MemFs::new();
        fs.add_file("blob", vec![1u8; 8 * 1024 * 1024], 0o644);
        let reference: Arc<dyn ImmutableRef> = Arc::new(MemRef::new("big", fs));
        let refs = RefMap::new();
        let options = ExportOptions::default();
        let attestations = vec![Attestation::in_toto("sbom.json", "t", json!({}))];

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            }
        });

        let (fs, _) = LocalFsFactory::new()
            .create_fs(request(
                &session,
                Some(&reference),
                &refs,
                &attestations,
                &options,
            ))
            .await
            .unwrap();
        ticker.abort();

        assert!(ticks.load(Ordering::SeqCst) > 0);
        assert!(fs.walk().unwrap().iter().any(|s| s.path == "sbom.json"));
    }

    #[test]
    fn test_mem_ref_release_counts() {
        let reference = MemRef::new("r", MemFs::new());
        let counter = reference.releases();
        let mount = reference.mount().unwrap();
        (mount.release.unwrap())().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_local_ref_missing_directory() {
        let reference = LocalRef::new("r", "/definitely/not/here");
        assert!(reference.mount().is_err());
    }
}
