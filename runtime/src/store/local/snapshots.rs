//! Materialized snapshot directories with a parent index.
//!
//! Snapshots are plain directories under `snapshots/`. Prepare copies the
//! parent's tree into a fresh scratch directory; commit renames the scratch
//! directory to its committed name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use strata_core::{Result, StrataError};

use crate::store::{Mount, Snapshotter};

use super::sanitize;

pub struct LocalSnapshotter {
    snapshots_dir: PathBuf,
    index_path: PathBuf,
    /// snapshot name/key → parent name ("" for none)
    parents: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalSnapshotter {
    pub fn new(root: &Path) -> Result<Self> {
        let snapshots_dir = root.join("snapshots");
        std::fs::create_dir_all(&snapshots_dir).map_err(|e| {
            StrataError::Snapshot(format!(
                "failed to create snapshot directory {}: {}",
                snapshots_dir.display(),
                e
            ))
        })?;

        let index_path = snapshots_dir.join("index.json");
        let parents = if index_path.exists() {
            let data = std::fs::read_to_string(&index_path).map_err(|e| {
                StrataError::Snapshot(format!("failed to read snapshot index: {}", e))
            })?;
            serde_json::from_str(&data)
                .map_err(|e| StrataError::Snapshot(format!("failed to parse snapshot index: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            snapshots_dir,
            index_path,
            parents: Arc::new(RwLock::new(parents)),
        })
    }

    /// Directory holding a snapshot's tree.
    pub(crate) fn dir(&self, name: &str) -> PathBuf {
        self.snapshots_dir.join(sanitize(name))
    }

    /// Parent name of a snapshot, empty string for none.
    pub(crate) async fn parent_of(&self, name: &str) -> Option<String> {
        let parents = self.parents.read().await;
        parents.get(name).cloned()
    }

    async fn save(&self) -> Result<()> {
        let parents = self.parents.read().await;
        let data = serde_json::to_string_pretty(&*parents)?;
        drop(parents);

        tokio::fs::write(&self.index_path, data)
            .await
            .map_err(|e| StrataError::Snapshot(format!("failed to write snapshot index: {}", e)))
    }
}

#[async_trait::async_trait]
impl Snapshotter for LocalSnapshotter {
    async fn prepare(&self, key: &str, parent: &str) -> Result<Mount> {
        let dir = self.dir(key);
        if dir.exists() {
            return Err(StrataError::AlreadyExists(format!("snapshot {}", key)));
        }

        if parent.is_empty() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                StrataError::Snapshot(format!("failed to create snapshot {}: {}", key, e))
            })?;
        } else {
            let parent_dir = self.dir(parent);
            if !parent_dir.exists() {
                return Err(StrataError::NotFound(format!("snapshot {}", parent)));
            }
            copy_dir_recursive(&parent_dir, &dir).map_err(|e| {
                StrataError::Snapshot(format!(
                    "failed to materialize parent {} for {}: {}",
                    parent, key, e
                ))
            })?;
        }

        {
            let mut parents = self.parents.write().await;
            parents.insert(key.to_string(), parent.to_string());
        }
        self.save().await?;

        Ok(Mount { path: dir })
    }

    async fn commit(&self, name: &str, key: &str) -> Result<()> {
        let key_dir = self.dir(key);
        if !key_dir.exists() {
            return Err(StrataError::NotFound(format!("snapshot {}", key)));
        }

        let name_dir = self.dir(name);
        if name_dir.exists() {
            return Err(StrataError::AlreadyExists(format!("snapshot {}", name)));
        }

        std::fs::rename(&key_dir, &name_dir).map_err(|e| {
            StrataError::Snapshot(format!("failed to commit snapshot {} as {}: {}", key, name, e))
        })?;

        {
            let mut parents = self.parents.write().await;
            let parent = parents.remove(key).unwrap_or_default();
            parents.insert(name.to_string(), parent);
        }
        self.save().await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let dir = self.dir(key);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| {
                StrataError::Snapshot(format!("failed to remove snapshot {}: {}", key, e))
            })?;
        }

        {
            let mut parents = self.parents.write().await;
            parents.remove(key);
        }
        self.save().await
    }
}

/// Recursively copy a directory tree.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_without_parent() {
        let tmp = TempDir::new().unwrap();
        let sn = LocalSnapshotter::new(tmp.path()).unwrap();

        let mount = sn.prepare("scratch-1", "").await.unwrap();
        assert!(mount.path.exists());
        assert_eq!(sn.parent_of("scratch-1").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_prepare_copies_parent_tree() {
        let tmp = TempDir::new().unwrap();
        let sn = LocalSnapshotter::new(tmp.path()).unwrap();

        let base = sn.prepare("base-key", "").await.unwrap();
        std::fs::write(base.path.join("etc.conf"), "base").unwrap();
        sn.commit("sha256:base", "base-key").await.unwrap();

        let mount = sn.prepare("scratch-2", "sha256:base").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(mount.path.join("etc.conf")).unwrap(),
            "base"
        );
    }

    #[tokio::test]
    async fn test_prepare_missing_parent_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let sn = LocalSnapshotter::new(tmp.path()).unwrap();
        let err = sn.prepare("scratch", "sha256:ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_commit_consumes_key() {
        let tmp = TempDir::new().unwrap();
        let sn = LocalSnapshotter::new(tmp.path()).unwrap();

        sn.prepare("scratch", "").await.unwrap();
        sn.commit("sha256:final", "scratch").await.unwrap();

        assert!(!sn.dir("scratch").exists());
        assert!(sn.dir("sha256:final").exists());
    }

    #[tokio::test]
    async fn test_commit_collision_is_already_exists() {
        let tmp = TempDir::new().unwrap();
        let sn = LocalSnapshotter::new(tmp.path()).unwrap();

        sn.prepare("a", "").await.unwrap();
        sn.commit("sha256:same", "a").await.unwrap();

        sn.prepare("b", "").await.unwrap();
        let err = sn.commit("sha256:same", "b").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_remove_is_tolerant_of_missing_key() {
        let tmp = TempDir::new().unwrap();
        let sn = LocalSnapshotter::new(tmp.path()).unwrap();

        sn.prepare("gone", "").await.unwrap();
        sn.remove("gone").await.unwrap();
        // Second remove is a no-op, not an error
        sn.remove("gone").await.unwrap();
    }
}
