//! Scratch-snapshot diffing: replay the squash-target layers onto the
//! retained filesystem state and commit the result under its chain ID.

use strata_core::{Result, StrataError};

use crate::oci::{chain_id, Descriptor, ImageConfig};
use crate::store::{ContentStore, DiffService, Snapshotter, LABEL_UNCOMPRESSED};

/// Apply `layers` on top of the base config's filesystem state, compute the
/// combined diff, and commit the snapshot under the new chain ID.
///
/// Returns the compressed diff descriptor and its uncompressed diff ID.
/// A commit that collides with an identically named snapshot is success:
/// bit-identical layer content converges on the same identity.
pub async fn apply_diff_layer(
    snapshotter: &dyn Snapshotter,
    differ: &dyn DiffService,
    content: &dyn ContentStore,
    base: &ImageConfig,
    layers: &[Descriptor],
) -> Result<(Descriptor, String)> {
    let key = unique_key();
    let parent = chain_id(&base.rootfs.diff_ids);

    let mount = snapshotter.prepare(&key, &parent).await?;

    let result = async {
        for layer in layers {
            differ.apply(layer, &mount).await?;
        }
        create_diff(differ, content, &key).await
    }
    .await;

    let (diff_desc, diff_id) = match result {
        Ok(diff) => diff,
        Err(err) => {
            // The lease still protects the scratch snapshot; the host GC
            // reclaims it if this cleanup fails.
            cleanup_scratch(snapshotter, &key).await;
            return Err(err);
        }
    };

    let mut chain = base.rootfs.diff_ids.clone();
    chain.push(diff_id.clone());
    let snapshot_id = chain_id(&chain);

    match snapshotter.commit(&snapshot_id, &key).await {
        Ok(()) => {}
        Err(err) if err.is_already_exists() => {
            tracing::debug!(snapshot = %snapshot_id, "snapshot already committed, converging");
        }
        Err(err) => {
            cleanup_scratch(snapshotter, &key).await;
            return Err(err);
        }
    }

    Ok((diff_desc, diff_id))
}

/// Compute the diff for a scratch snapshot and recover its diff ID from the
/// uncompressed-digest label on the resulting content.
async fn create_diff(
    differ: &dyn DiffService,
    content: &dyn ContentStore,
    key: &str,
) -> Result<(Descriptor, String)> {
    let descriptor = differ.create_diff(key).await?;
    let info = content.info(&descriptor.digest).await?;

    let diff_id = info
        .labels
        .get(LABEL_UNCOMPRESSED)
        .cloned()
        .ok_or_else(|| {
            StrataError::Consistency("invalid differ response with no diff ID".to_string())
        })?;

    Ok((
        Descriptor {
            media_type: descriptor.media_type,
            digest: descriptor.digest,
            size: info.size,
        },
        diff_id,
    ))
}

async fn cleanup_scratch(snapshotter: &dyn Snapshotter, key: &str) {
    if let Err(err) = snapshotter.remove(key).await {
        tracing::warn!(key, error = %err, "failed to clean up aborted scratch snapshot");
    }
}

/// A scratch-snapshot key unique across concurrent invocations.
pub(crate) fn unique_key() -> String {
    let nanos = chrono::Utc::now().timestamp_subsec_nanos();
    let suffix: [u8; 3] = rand::random();
    format!("{}-{}", nanos, hex::encode(suffix))
}
