//! Image record upsert and unpack of the squashed image.

use strata_core::{Platform, Result, StrataError};

use crate::oci::{chain_id, Descriptor, ImageConfig};
use crate::store::{DiffService, ImageRecord, ImageStore, Snapshotter};

use super::differ::unique_key;

/// Update the image record by name, creating it when absent.
///
/// Only a `NotFound` from the update turns into a create; any other
/// failure aborts.
pub async fn upsert_image(images: &dyn ImageStore, record: ImageRecord) -> Result<ImageRecord> {
    match images.update(&record).await {
        Ok(updated) => {
            tracing::info!(image = %record.name, "updated squashed image");
            Ok(updated)
        }
        Err(err) if err.is_not_found() => {
            let created = images.create(&record).await.map_err(|e| {
                StrataError::ImageStore(format!(
                    "failed to create new image {}: {}",
                    record.name, e
                ))
            })?;
            tracing::info!(image = %record.name, "created squashed image");
            Ok(created)
        }
        Err(err) => Err(StrataError::ImageStore(format!(
            "failed to update new image {}: {}",
            record.name, err
        ))),
    }
}

/// Materialize the image's full snapshot chain so the result is mountable.
///
/// Walks the diff-ID sequence link by link: prepare a scratch at the
/// parent chain ID, apply the matching layer, commit under the link's
/// chain ID. Links that already exist converge via `AlreadyExists`.
pub async fn unpack_image(
    snapshotter: &dyn Snapshotter,
    differ: &dyn DiffService,
    config: &ImageConfig,
    layers: &[Descriptor],
    host: &Platform,
) -> Result<()> {
    if config.architecture != host.architecture || config.os != host.os {
        return Err(StrataError::InvalidArgument(format!(
            "image platform {}/{} does not match host {}/{}",
            config.os, config.architecture, host.os, host.architecture
        )));
    }

    let diff_ids = &config.rootfs.diff_ids;
    if diff_ids.len() != layers.len() {
        return Err(StrataError::Consistency(format!(
            "config has {} diff IDs but manifest has {} layers",
            diff_ids.len(),
            layers.len()
        )));
    }

    for (i, layer) in layers.iter().enumerate() {
        let parent = chain_id(&diff_ids[..i]);
        let name = chain_id(&diff_ids[..=i]);
        let key = unique_key();

        let mount = snapshotter.prepare(&key, &parent).await?;
        if let Err(err) = differ.apply(layer, &mount).await {
            if let Err(remove_err) = snapshotter.remove(&key).await {
                tracing::warn!(key, error = %remove_err, "failed to clean up unpack scratch");
            }
            return Err(err);
        }

        match snapshotter.commit(&name, &key).await {
            Ok(()) => {}
            Err(err) if err.is_already_exists() => {
                if let Err(remove_err) = snapshotter.remove(&key).await {
                    tracing::warn!(key, error = %remove_err, "failed to clean up unpack scratch");
                }
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(chain = %chain_id(diff_ids), "unpacked squashed image");
    Ok(())
}
