//! Content-addressed blob storage on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use strata_core::{Result, StrataError};

use crate::oci::{digest_bytes, Descriptor};
use crate::store::{ContentInfo, ContentStore};

/// Blobs under `blobs/sha256/<hex>`, labels in a JSON sidecar index.
pub struct LocalContentStore {
    blobs_dir: PathBuf,
    labels_path: PathBuf,
    labels: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl LocalContentStore {
    pub fn new(root: &Path) -> Result<Self> {
        let blobs_dir = root.join("blobs").join("sha256");
        std::fs::create_dir_all(&blobs_dir).map_err(|e| {
            StrataError::Content(format!(
                "failed to create blob directory {}: {}",
                blobs_dir.display(),
                e
            ))
        })?;

        let labels_path = root.join("blobs").join("labels.json");
        let labels = if labels_path.exists() {
            let data = std::fs::read_to_string(&labels_path).map_err(|e| {
                StrataError::Content(format!("failed to read blob label index: {}", e))
            })?;
            serde_json::from_str(&data)
                .map_err(|e| StrataError::Content(format!("failed to parse blob label index: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            blobs_dir,
            labels_path,
            labels: Arc::new(RwLock::new(labels)),
        })
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
        self.blobs_dir.join(hex)
    }

    async fn save_labels(&self) -> Result<()> {
        let labels = self.labels.read().await;
        let data = serde_json::to_string_pretty(&*labels)?;
        drop(labels);

        tokio::fs::write(&self.labels_path, data).await.map_err(|e| {
            StrataError::Content(format!("failed to write blob label index: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl ContentStore for LocalContentStore {
    async fn info(&self, digest: &str) -> Result<ContentInfo> {
        let path = self.blob_path(digest);
        let meta = std::fs::metadata(&path)
            .map_err(|_| StrataError::NotFound(format!("content {}", digest)))?;

        let labels = self.labels.read().await;
        Ok(ContentInfo {
            digest: digest.to_string(),
            size: meta.len(),
            labels: labels.get(digest).cloned().unwrap_or_default(),
        })
    }

    async fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(digest);
        std::fs::read(&path).map_err(|_| StrataError::NotFound(format!("content {}", digest)))
    }

    async fn write_blob(
        &self,
        data: &[u8],
        descriptor: &Descriptor,
        labels: HashMap<String, String>,
    ) -> Result<()> {
        let actual = digest_bytes(data);
        if actual != descriptor.digest {
            return Err(StrataError::Consistency(format!(
                "blob digest mismatch: descriptor says {}, content is {}",
                descriptor.digest, actual
            )));
        }

        let path = self.blob_path(&descriptor.digest);
        if !path.exists() {
            std::fs::write(&path, data).map_err(|e| {
                StrataError::Content(format!("failed to write blob {}: {}", descriptor.digest, e))
            })?;
        }

        let mut index = self.labels.write().await;
        index
            .entry(descriptor.digest.clone())
            .or_default()
            .extend(labels);
        drop(index);

        self.save_labels().await
    }
}
