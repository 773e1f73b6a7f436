//! Lease index backed by a JSON file.
//!
//! Leases record GC protection for content and snapshots created
//! mid-pipeline. Release marks a lease inactive; reclaiming anything it
//! protected is the collector's job, after the recorded expiration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use strata_core::{Result, StrataError};

use crate::store::{Lease, LeaseManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    released: bool,
}

pub struct LocalLeaseManager {
    index_path: PathBuf,
    leases: Arc<RwLock<HashMap<String, LeaseRecord>>>,
}

impl LocalLeaseManager {
    pub fn new(root: &Path) -> Result<Self> {
        let index_path = root.join("leases.json");
        let leases = if index_path.exists() {
            let data = std::fs::read_to_string(&index_path)
                .map_err(|e| StrataError::Lease(format!("failed to read lease index: {}", e)))?;
            serde_json::from_str(&data)
                .map_err(|e| StrataError::Lease(format!("failed to parse lease index: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            index_path,
            leases: Arc::new(RwLock::new(leases)),
        })
    }

    async fn save(&self) -> Result<()> {
        let leases = self.leases.read().await;
        let data = serde_json::to_string_pretty(&*leases)?;
        drop(leases);

        tokio::fs::write(&self.index_path, data)
            .await
            .map_err(|e| StrataError::Lease(format!("failed to write lease index: {}", e)))
    }

    /// True if the lease exists and has been released.
    pub async fn is_released(&self, id: &str) -> Option<bool> {
        let leases = self.leases.read().await;
        leases.get(id).map(|l| l.released)
    }
}

#[async_trait::async_trait]
impl LeaseManager for LocalLeaseManager {
    async fn create(&self, id: &str, ttl: Duration) -> Result<Lease> {
        let now = Utc::now();
        let record = LeaseRecord {
            id: id.to_string(),
            created_at: now,
            expires_at: now + ttl,
            released: false,
        };

        {
            let mut leases = self.leases.write().await;
            if leases.get(id).is_some_and(|l| !l.released) {
                return Err(StrataError::AlreadyExists(format!("lease {}", id)));
            }
            leases.insert(id.to_string(), record.clone());
        }
        self.save().await?;

        Ok(Lease {
            id: record.id,
            expires_at: record.expires_at,
        })
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        {
            let mut leases = self.leases.write().await;
            let record = leases
                .get_mut(&lease.id)
                .ok_or_else(|| StrataError::NotFound(format!("lease {}", lease.id)))?;
            record.released = true;
        }
        self.save().await
    }
}
