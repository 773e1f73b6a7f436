//! Storage capability traits consumed by the squash pipeline.
//!
//! The pipeline does not implement content addressing, snapshotting, or
//! diffing itself; it orchestrates whatever backend provides these five
//! capabilities. A disk-backed implementation lives in [`local`].

pub mod local;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use strata_core::Result;

use crate::oci::Descriptor;

/// Label carried by diff content naming the uncompressed digest of the layer.
pub const LABEL_UNCOMPRESSED: &str = "uncompressed";

/// Label prefix pinning referenced content blobs against garbage collection.
pub const GC_REF_CONTENT: &str = "gc.ref.content";

/// Label prefix pinning a snapshot against garbage collection.
pub const GC_REF_SNAPSHOT: &str = "gc.ref.snapshot";

/// A named image record pointing at a manifest blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub target: Descriptor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata for a stored blob.
#[derive(Debug, Clone)]
pub struct ContentInfo {
    pub digest: String,
    pub size: u64,
    pub labels: HashMap<String, String>,
}

/// A writable filesystem handle produced by [`Snapshotter::prepare`].
#[derive(Debug, Clone)]
pub struct Mount {
    pub path: PathBuf,
}

/// A time-bounded token protecting content and snapshots from garbage
/// collection. Releasing a lease stops active protection; it does not
/// reclaim anything synchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

/// Named image records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Look up an image by name. `NotFound` if absent.
    async fn get(&self, name: &str) -> Result<ImageRecord>;

    /// Replace an existing record. `NotFound` if no record has this name.
    async fn update(&self, record: &ImageRecord) -> Result<ImageRecord>;

    /// Insert a new record. `AlreadyExists` if the name is taken.
    async fn create(&self, record: &ImageRecord) -> Result<ImageRecord>;

    /// All records, in no particular order.
    async fn list(&self) -> Result<Vec<ImageRecord>>;
}

/// Content-addressed blob storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Size and labels of a stored blob. `NotFound` if absent.
    async fn info(&self, digest: &str) -> Result<ContentInfo>;

    /// Full contents of a stored blob. `NotFound` if absent.
    async fn read_blob(&self, digest: &str) -> Result<Vec<u8>>;

    /// Store bytes under their descriptor's digest with the given labels.
    /// Idempotent: identical digest means identical bytes, so rewriting an
    /// existing blob is a no-op apart from label merging.
    async fn write_blob(
        &self,
        data: &[u8],
        descriptor: &Descriptor,
        labels: HashMap<String, String>,
    ) -> Result<()>;
}

/// Copy-on-write snapshot filesystem.
#[async_trait]
pub trait Snapshotter: Send + Sync {
    /// Create a writable scratch snapshot keyed by `key`, parented at the
    /// committed snapshot named `parent` (empty string for no parent).
    async fn prepare(&self, key: &str, parent: &str) -> Result<Mount>;

    /// Commit the scratch snapshot `key` under the committed name `name`,
    /// consuming the key. `AlreadyExists` if `name` is already committed.
    async fn commit(&self, name: &str, key: &str) -> Result<()>;

    /// Remove a scratch snapshot. Best-effort from the caller's view.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Layer application and diff computation.
#[async_trait]
pub trait DiffService: Send + Sync {
    /// Apply a layer blob onto a mount.
    async fn apply(&self, layer: &Descriptor, mount: &Mount) -> Result<()>;

    /// Compute the diff between the scratch snapshot `key` and its parent,
    /// writing the result to the content store. The resulting content
    /// carries an [`LABEL_UNCOMPRESSED`] label with the layer's diff ID.
    async fn create_diff(&self, key: &str) -> Result<Descriptor>;
}

/// Time-bounded garbage-collection protection.
#[async_trait]
pub trait LeaseManager: Send + Sync {
    /// Create a lease with the given id, expiring after `ttl`.
    async fn create(&self, id: &str, ttl: Duration) -> Result<Lease>;

    /// Stop active protection for a lease. Reclaims nothing.
    async fn release(&self, lease: &Lease) -> Result<()>;
}
