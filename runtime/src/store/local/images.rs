//! Image record index backed by a JSON file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use strata_core::{Result, StrataError};

use crate::store::{ImageRecord, ImageStore};

/// Named image records persisted in `images.json`.
pub struct LocalImageStore {
    index_path: PathBuf,
    index: Arc<RwLock<HashMap<String, ImageRecord>>>,
}

impl LocalImageStore {
    pub fn new(root: &Path) -> Result<Self> {
        let index_path = root.join("images.json");
        let index = if index_path.exists() {
            let data = std::fs::read_to_string(&index_path).map_err(|e| {
                StrataError::ImageStore(format!("failed to read image index: {}", e))
            })?;
            serde_json::from_str(&data)
                .map_err(|e| StrataError::ImageStore(format!("failed to parse image index: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            index_path,
            index: Arc::new(RwLock::new(index)),
        })
    }

    async fn save(&self) -> Result<()> {
        let index = self.index.read().await;
        let data = serde_json::to_string_pretty(&*index)?;
        drop(index);

        tokio::fs::write(&self.index_path, data)
            .await
            .map_err(|e| StrataError::ImageStore(format!("failed to write image index: {}", e)))
    }
}

#[async_trait::async_trait]
impl ImageStore for LocalImageStore {
    async fn get(&self, name: &str) -> Result<ImageRecord> {
        let index = self.index.read().await;
        index
            .get(name)
            .cloned()
            .ok_or_else(|| StrataError::NotFound(format!("image {}", name)))
    }

    async fn update(&self, record: &ImageRecord) -> Result<ImageRecord> {
        {
            let mut index = self.index.write().await;
            let existing = index
                .get_mut(&record.name)
                .ok_or_else(|| StrataError::NotFound(format!("image {}", record.name)))?;
            existing.target = record.target.clone();
            existing.updated_at = record.updated_at;
        }
        self.save().await?;
        self.get(&record.name).await
    }

    async fn create(&self, record: &ImageRecord) -> Result<ImageRecord> {
        {
            let mut index = self.index.write().await;
            if index.contains_key(&record.name) {
                return Err(StrataError::AlreadyExists(format!("image {}", record.name)));
            }
            index.insert(record.name.clone(), record.clone());
        }
        self.save().await?;
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<ImageRecord>> {
        let index = self.index.read().await;
        Ok(index.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{Descriptor, MEDIA_TYPE_MANIFEST};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(name: &str, digest: &str) -> ImageRecord {
        ImageRecord {
            name: name.to_string(),
            target: Descriptor {
                media_type: MEDIA_TYPE_MANIFEST.to_string(),
                digest: digest.to_string(),
                size: 1,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(tmp.path()).unwrap();

        store.create(&record("app:latest", "sha256:aaa")).await.unwrap();
        let fetched = store.get("app:latest").await.unwrap();
        assert_eq!(fetched.target.digest, "sha256:aaa");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(tmp.path()).unwrap();
        assert!(store.get("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(tmp.path()).unwrap();
        let err = store.update(&record("ghost", "sha256:aaa")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_replaces_target() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(tmp.path()).unwrap();

        store.create(&record("app:latest", "sha256:aaa")).await.unwrap();
        store.update(&record("app:latest", "sha256:bbb")).await.unwrap();

        let fetched = store.get("app:latest").await.unwrap();
        assert_eq!(fetched.target.digest, "sha256:bbb");
    }

    #[tokio::test]
    async fn test_create_duplicate_is_already_exists() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(tmp.path()).unwrap();

        store.create(&record("app:latest", "sha256:aaa")).await.unwrap();
        let err = store.create(&record("app:latest", "sha256:bbb")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_index_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = LocalImageStore::new(tmp.path()).unwrap();
            store.create(&record("app:latest", "sha256:aaa")).await.unwrap();
        }

        let store = LocalImageStore::new(tmp.path()).unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
