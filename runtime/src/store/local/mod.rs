//! Disk-backed implementation of the storage capabilities.
//!
//! Lays out a data root as:
//!
//! ```text
//! <root>/
//! ├── blobs/
//! │   ├── sha256/<hex>     (content-addressed blobs)
//! │   └── labels.json      (blob label index)
//! ├── snapshots/
//! │   ├── <name>/          (materialized snapshot directories)
//! │   └── index.json       (snapshot parent index)
//! ├── images.json          (image record index)
//! └── leases.json          (lease index)
//! ```

mod content;
mod diff;
mod images;
mod leases;
mod snapshots;

pub use content::LocalContentStore;
pub use diff::LocalDiffer;
pub use images::LocalImageStore;
pub use leases::LocalLeaseManager;
pub use snapshots::LocalSnapshotter;

use std::path::Path;
use std::sync::Arc;

use strata_core::Result;

/// Handles to one data root's worth of collaborators.
#[derive(Clone)]
pub struct LocalStore {
    pub images: Arc<LocalImageStore>,
    pub content: Arc<LocalContentStore>,
    pub snapshotter: Arc<LocalSnapshotter>,
    pub differ: Arc<LocalDiffer>,
    pub leases: Arc<LocalLeaseManager>,
}

impl LocalStore {
    /// Open (creating if needed) a data root.
    pub fn open(root: &Path) -> Result<Self> {
        let content = Arc::new(LocalContentStore::new(root)?);
        let snapshotter = Arc::new(LocalSnapshotter::new(root)?);
        let differ = Arc::new(LocalDiffer::new(content.clone(), snapshotter.clone()));
        let images = Arc::new(LocalImageStore::new(root)?);
        let leases = Arc::new(LocalLeaseManager::new(root)?);

        Ok(Self {
            images,
            content,
            snapshotter,
            differ,
            leases,
        })
    }
}

/// Turn a digest or snapshot name into a directory-safe file name.
pub(crate) fn sanitize(name: &str) -> String {
    name.replace([':', '/'], "_")
}
