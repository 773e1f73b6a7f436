//! The squash pipeline.
//!
//! Collapses the trailing layers of an image into one layer:
//! read source → select layers → acquire lease → derive base config →
//! diff & commit snapshot → derive commit config → write blobs →
//! upsert image → unpack → release lease.
//!
//! Every stage from base-config derivation through the blob writes runs
//! under one time-bounded lease, so content and snapshots created
//! mid-pipeline survive the host's garbage collector even if the process
//! is interrupted; abandoned intermediates age out when the lease expires.

pub mod committer;
pub mod config;
pub mod differ;
pub mod selector;
pub mod writer;

use std::sync::Arc;

use chrono::{Duration, Utc};

use strata_core::{Platform, Result, StrataError};

use crate::oci::{ImageConfig, Manifest};
use crate::store::{
    ContentStore, DiffService, ImageRecord, ImageStore, LeaseManager, Snapshotter,
};

/// Lease lifetime covering one squash invocation.
const LEASE_TTL_HOURS: i64 = 1;

/// Validated inputs for one squash invocation.
#[derive(Debug, Clone, Default)]
pub struct SquashOptions {
    /// Source image reference.
    pub source: String,
    /// Name for the squashed image.
    pub target: String,
    /// Squash the last N layers (used when `layer_digest` is empty).
    pub layer_count: usize,
    /// Squash from this layer digest onward (takes priority).
    pub layer_digest: String,
    /// Author for the new history entry; empty inherits the base author.
    pub author: String,
    /// Commit message for the new history entry.
    pub message: String,
}

/// Source image state read once at pipeline start.
struct SquashImage {
    record: ImageRecord,
    manifest: Manifest,
    config: ImageConfig,
}

/// The squash pipeline over a set of storage collaborators.
pub struct SquashRuntime {
    images: Arc<dyn ImageStore>,
    content: Arc<dyn ContentStore>,
    snapshotter: Arc<dyn Snapshotter>,
    differ: Arc<dyn DiffService>,
    leases: Arc<dyn LeaseManager>,
    snapshotter_name: String,
    platform: Platform,
}

impl SquashRuntime {
    pub fn new(
        images: Arc<dyn ImageStore>,
        content: Arc<dyn ContentStore>,
        snapshotter: Arc<dyn Snapshotter>,
        differ: Arc<dyn DiffService>,
        leases: Arc<dyn LeaseManager>,
        snapshotter_name: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            images,
            content,
            snapshotter,
            differ,
            leases,
            snapshotter_name: snapshotter_name.into(),
            platform,
        }
    }

    /// Run the pipeline, returning the new image record.
    pub async fn squash(&self, options: &SquashOptions) -> Result<ImageRecord> {
        let image = self.init_image(&options.source).await?;

        let squash_layers =
            selector::select_squash_layers(&image.manifest, &options.layer_digest, options.layer_count)?;
        let remaining = image.manifest.layers.len() - squash_layers.len();

        tracing::info!(
            source = %options.source,
            source_digest = %image.record.target.digest,
            target = %options.target,
            squashed = squash_layers.len(),
            retained = remaining,
            "squashing image"
        );

        let lease = self
            .leases
            .create(&uuid::Uuid::new_v4().to_string(), Duration::hours(LEASE_TTL_HOURS))
            .await
            .map_err(|e| StrataError::Lease(format!("failed to create lease for squash: {}", e)))?;

        let result = self
            .run_leased(options, &image, &squash_layers, remaining)
            .await;

        // Release stops active GC protection; it reclaims nothing, and a
        // failed release never replaces the pipeline's own outcome.
        if let Err(err) = self.leases.release(&lease).await {
            tracing::warn!(lease = %lease.id, error = %err, "failed to release squash lease");
        }

        result
    }

    /// The lease-protected stages of the pipeline.
    async fn run_leased(
        &self,
        options: &SquashOptions,
        image: &SquashImage,
        squash_layers: &[crate::oci::Descriptor],
        remaining: usize,
    ) -> Result<ImageRecord> {
        let base_config = config::base_image_config(&image.config, remaining)?;

        let (diff_desc, diff_id) = differ::apply_diff_layer(
            self.snapshotter.as_ref(),
            self.differ.as_ref(),
            self.content.as_ref(),
            &base_config,
            squash_layers,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to apply diff layer");
            e
        })?;

        let commit_config = config::commit_image_config(
            &base_config,
            &diff_id,
            &options.author,
            &options.message,
            &self.platform,
        );

        let (manifest_desc, _) = writer::write_image_contents(
            self.content.as_ref(),
            &self.snapshotter_name,
            &commit_config,
            &image.manifest.layers[..remaining],
            diff_desc,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to write image contents");
            e
        })?;

        let now = Utc::now();
        let record = committer::upsert_image(
            self.images.as_ref(),
            ImageRecord {
                name: options.target.clone(),
                target: manifest_desc,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        let new_manifest: Manifest =
            serde_json::from_slice(&self.content.read_blob(&record.target.digest).await?)?;
        committer::unpack_image(
            self.snapshotter.as_ref(),
            self.differ.as_ref(),
            &commit_config,
            &new_manifest.layers,
            &self.platform,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to unpack squashed image");
            e
        })?;

        Ok(record)
    }

    /// Read the source image record, manifest, and config.
    async fn init_image(&self, source: &str) -> Result<SquashImage> {
        let record = self.images.get(source).await?;
        let manifest: Manifest =
            serde_json::from_slice(&self.content.read_blob(&record.target.digest).await?)?;
        let config: ImageConfig =
            serde_json::from_slice(&self.content.read_blob(&manifest.config.digest).await?)?;

        Ok(SquashImage {
            record,
            manifest,
            config,
        })
    }
}
