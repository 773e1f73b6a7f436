//! Persisting the new config and manifest as labeled, content-addressed blobs.

use std::collections::HashMap;

use strata_core::Result;

use crate::oci::{chain_id, Descriptor, ImageConfig, Manifest, MEDIA_TYPE_CONFIG};
use crate::store::{ContentStore, GC_REF_CONTENT, GC_REF_SNAPSHOT};

/// Write the commit config and the new manifest to the content store.
///
/// The manifest blob is labeled with a `gc.ref.content.*` entry for the
/// config and every layer, pinning them transitively; the config blob is
/// labeled with a `gc.ref.snapshot.<snapshotter>` entry for the chain ID of
/// its diff IDs, pinning the committed snapshot.
///
/// Returns the manifest descriptor and the config digest.
pub async fn write_image_contents(
    content: &dyn ContentStore,
    snapshotter_name: &str,
    config: &ImageConfig,
    base_layers: &[Descriptor],
    diff_layer: Descriptor,
) -> Result<(Descriptor, String)> {
    let config_json = serde_json::to_vec(config)?;
    let config_desc = Descriptor::from_bytes(MEDIA_TYPE_CONFIG, &config_json);

    let mut layers = base_layers.to_vec();
    layers.push(diff_layer);

    let manifest = Manifest::new(config_desc.clone(), layers);
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;
    let manifest_desc = Descriptor::from_bytes(&manifest.media_type, &manifest_json);

    let mut manifest_labels = HashMap::new();
    manifest_labels.insert(
        format!("{}.0", GC_REF_CONTENT),
        config_desc.digest.clone(),
    );
    for (i, layer) in manifest.layers.iter().enumerate() {
        manifest_labels.insert(format!("{}.{}", GC_REF_CONTENT, i + 1), layer.digest.clone());
    }
    content
        .write_blob(&manifest_json, &manifest_desc, manifest_labels)
        .await?;

    let mut config_labels = HashMap::new();
    config_labels.insert(
        format!("{}.{}", GC_REF_SNAPSHOT, snapshotter_name),
        chain_id(&config.rootfs.diff_ids),
    );
    content
        .write_blob(&config_json, &config_desc, config_labels)
        .await?;

    Ok((manifest_desc, config_desc.digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{RootFs, MEDIA_TYPE_LAYER_GZIP, MEDIA_TYPE_MANIFEST};
    use crate::store::local::LocalContentStore;
    use crate::store::ContentStore;
    use tempfile::TempDir;

    fn layer(digest: &str) -> Descriptor {
        Descriptor {
            media_type: MEDIA_TYPE_LAYER_GZIP.to_string(),
            digest: digest.to_string(),
            size: 1,
        }
    }

    fn config_of(diff_ids: &[&str]) -> ImageConfig {
        ImageConfig {
            created: None,
            author: None,
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            config: None,
            rootfs: RootFs::layers(diff_ids.iter().map(|s| s.to_string()).collect()),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_manifest_labels_cover_config_and_every_layer() {
        let tmp = TempDir::new().unwrap();
        let store = LocalContentStore::new(tmp.path()).unwrap();

        let config = config_of(&["sha256:d0", "sha256:d1", "sha256:d2"]);
        let base = vec![layer("sha256:l0"), layer("sha256:l1")];
        let (manifest_desc, config_digest) =
            write_image_contents(&store, "overlayfs", &config, &base, layer("sha256:l2"))
                .await
                .unwrap();

        let info = store.info(&manifest_desc.digest).await.unwrap();
        let gc_labels: Vec<_> = info
            .labels
            .keys()
            .filter(|k| k.starts_with(GC_REF_CONTENT))
            .collect();
        // config (index 0) plus 3 layers
        assert_eq!(gc_labels.len(), 4);
        assert_eq!(info.labels.get("gc.ref.content.0").unwrap(), &config_digest);
        assert_eq!(info.labels.get("gc.ref.content.1").unwrap(), "sha256:l0");
        assert_eq!(info.labels.get("gc.ref.content.3").unwrap(), "sha256:l2");
    }

    #[tokio::test]
    async fn test_config_label_pins_snapshot_chain() {
        let tmp = TempDir::new().unwrap();
        let store = LocalContentStore::new(tmp.path()).unwrap();

        let config = config_of(&["sha256:d0", "sha256:d1"]);
        let (_, config_digest) =
            write_image_contents(&store, "overlayfs", &config, &[layer("sha256:l0")], layer("sha256:l1"))
                .await
                .unwrap();

        let info = store.info(&config_digest).await.unwrap();
        assert_eq!(
            info.labels.get("gc.ref.snapshot.overlayfs").unwrap(),
            &chain_id(&config.rootfs.diff_ids)
        );
    }

    #[tokio::test]
    async fn test_manifest_layers_preserve_order() {
        let tmp = TempDir::new().unwrap();
        let store = LocalContentStore::new(tmp.path()).unwrap();

        let config = config_of(&["sha256:d0", "sha256:d1", "sha256:d2"]);
        let base = vec![layer("sha256:l0"), layer("sha256:l1")];
        let (manifest_desc, _) =
            write_image_contents(&store, "overlayfs", &config, &base, layer("sha256:new"))
                .await
                .unwrap();

        let bytes = store.read_blob(&manifest_desc.digest).await.unwrap();
        let manifest: Manifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(manifest.media_type, MEDIA_TYPE_MANIFEST);
        let digests: Vec<&str> = manifest.layers.iter().map(|l| l.digest.as_str()).collect();
        assert_eq!(digests, vec!["sha256:l0", "sha256:l1", "sha256:new"]);
    }

    #[tokio::test]
    async fn test_writes_are_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalContentStore::new(tmp.path()).unwrap();

        let config = config_of(&["sha256:d0"]);
        let first = write_image_contents(&store, "overlayfs", &config, &[], layer("sha256:l0"))
            .await
            .unwrap();
        let second = write_image_contents(&store, "overlayfs", &config, &[], layer("sha256:l0"))
            .await
            .unwrap();
        assert_eq!(first.0.digest, second.0.digest);
        assert_eq!(first.1, second.1);
    }
}
