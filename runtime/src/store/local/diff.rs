//! Layer application and diff computation against snapshot directories.
//!
//! Apply extracts a gzipped layer tarball onto a mount. Diff compares a
//! scratch snapshot against its parent by file content and packages the
//! added/modified files as a new gzipped layer, labeled with the digest of
//! the uncompressed tar so callers can recover the diff ID.
//!
//! The diff is computed from file contents, not timestamps, and the tar is
//! built with normalized headers: identical input trees produce
//! bit-identical layers. Deletions are not represented (no whiteouts).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;

use strata_core::{Result, StrataError};

use crate::oci::{digest_bytes, Descriptor, MEDIA_TYPE_LAYER_GZIP};
use crate::store::{ContentStore, DiffService, Mount, LABEL_UNCOMPRESSED};

use super::{LocalContentStore, LocalSnapshotter};

pub struct LocalDiffer {
    content: Arc<LocalContentStore>,
    snapshots: Arc<LocalSnapshotter>,
}

impl LocalDiffer {
    pub fn new(content: Arc<LocalContentStore>, snapshots: Arc<LocalSnapshotter>) -> Self {
        Self { content, snapshots }
    }
}

#[async_trait::async_trait]
impl DiffService for LocalDiffer {
    async fn apply(&self, layer: &Descriptor, mount: &Mount) -> Result<()> {
        let data = self.content.read_blob(&layer.digest).await?;

        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(data));
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(&mount.path).map_err(|e| {
            StrataError::Diff(format!(
                "failed to apply layer {} to {}: {}",
                layer.digest,
                mount.path.display(),
                e
            ))
        })?;

        tracing::debug!(layer = %layer.digest, mount = %mount.path.display(), "applied layer");
        Ok(())
    }

    async fn create_diff(&self, key: &str) -> Result<Descriptor> {
        let key_dir = self.snapshots.dir(key);
        if !key_dir.exists() {
            return Err(StrataError::NotFound(format!("snapshot {}", key)));
        }

        let parent = self.snapshots.parent_of(key).await.unwrap_or_default();
        let parent_state = if parent.is_empty() {
            DirState::default()
        } else {
            let parent_dir = self.snapshots.dir(&parent);
            if !parent_dir.exists() {
                return Err(StrataError::NotFound(format!("snapshot {}", parent)));
            }
            DirState::capture(&parent_dir)?
        };

        let state = DirState::capture(&key_dir)?;
        let changed = parent_state.diff(&state);

        let tar_bytes = build_layer_tar(&key_dir, &changed)?;
        let diff_id = digest_bytes(&tar_bytes);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&tar_bytes)
            .map_err(|e| StrataError::Diff(format!("failed to compress diff: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| StrataError::Diff(format!("failed to compress diff: {}", e)))?;

        let descriptor = Descriptor::from_bytes(MEDIA_TYPE_LAYER_GZIP, &compressed);
        let mut labels = HashMap::new();
        labels.insert(LABEL_UNCOMPRESSED.to_string(), diff_id);

        self.content.write_blob(&compressed, &descriptor, labels).await?;
        Ok(descriptor)
    }
}

/// File state of a snapshot directory, keyed by relative path.
#[derive(Debug, Default)]
struct DirState {
    entries: HashMap<PathBuf, FileState>,
}

#[derive(Debug, PartialEq)]
struct FileState {
    is_dir: bool,
    /// Content digest; `None` for directories.
    digest: Option<String>,
}

impl DirState {
    fn capture(root: &Path) -> Result<Self> {
        let mut entries = HashMap::new();
        walk(root, root, &mut entries)?;
        Ok(Self { entries })
    }

    /// Paths added or modified in `after` relative to this state, sorted.
    fn diff(&self, after: &DirState) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = after
            .entries
            .iter()
            .filter(|&(path, state)| self.entries.get(path) != Some(state))
            .map(|(path, _)| path.clone())
            .collect();
        changed.sort();
        changed
    }
}

fn walk(root: &Path, current: &Path, entries: &mut HashMap<PathBuf, FileState>) -> Result<()> {
    let read_dir = std::fs::read_dir(current).map_err(|e| {
        StrataError::Diff(format!("failed to read directory {}: {}", current.display(), e))
    })?;

    for entry in read_dir {
        let entry =
            entry.map_err(|e| StrataError::Diff(format!("failed to read directory entry: {}", e)))?;
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| StrataError::Diff(format!("bad relative path: {}", e)))?
            .to_path_buf();

        if path.is_dir() {
            entries.insert(
                relative,
                FileState {
                    is_dir: true,
                    digest: None,
                },
            );
            walk(root, &path, entries)?;
        } else {
            let data = std::fs::read(&path).map_err(|e| {
                StrataError::Diff(format!("failed to read {}: {}", path.display(), e))
            })?;
            entries.insert(
                relative,
                FileState {
                    is_dir: false,
                    digest: Some(digest_bytes(&data)),
                },
            );
        }
    }
    Ok(())
}

/// Build an uncompressed tar of the changed paths with normalized headers,
/// so identical content yields identical bytes.
fn build_layer_tar(root: &Path, changed: &[PathBuf]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    for relative in changed {
        let full = root.join(relative);
        if !full.exists() {
            continue;
        }

        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if full.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, relative, std::io::empty())
                .map_err(|e| {
                    StrataError::Diff(format!(
                        "failed to add directory {} to layer: {}",
                        relative.display(),
                        e
                    ))
                })?;
        } else {
            let data = std::fs::read(&full).map_err(|e| {
                StrataError::Diff(format!("failed to read {}: {}", full.display(), e))
            })?;
            header.set_mode(0o644);
            header.set_size(data.len() as u64);
            builder
                .append_data(&mut header, relative, data.as_slice())
                .map_err(|e| {
                    StrataError::Diff(format!(
                        "failed to add file {} to layer: {}",
                        relative.display(),
                        e
                    ))
                })?;
        }
    }

    builder
        .into_inner()
        .map_err(|e| StrataError::Diff(format!("failed to finalize layer: {}", e)))
}
