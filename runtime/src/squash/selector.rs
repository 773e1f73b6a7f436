//! Selection of the layer suffix to squash.

use strata_core::{Result, StrataError};

use crate::oci::{Descriptor, Manifest};

/// Pick the squash-target suffix of a manifest's layers.
///
/// A non-empty `layer_digest` takes priority: the suffix starts at the
/// first layer with that digest, and a digest absent from the manifest is
/// `NotFound`. Otherwise `layer_count` selects the last N layers and must
/// satisfy `1 < N <= total`. Anything else is `InvalidArgument`.
pub fn select_squash_layers(
    manifest: &Manifest,
    layer_digest: &str,
    layer_count: usize,
) -> Result<Vec<Descriptor>> {
    if !layer_digest.is_empty() {
        let start = manifest
            .layers
            .iter()
            .position(|layer| layer.digest == layer_digest)
            .ok_or_else(|| {
                StrataError::NotFound(format!(
                    "layer digest {} not found in the image",
                    layer_digest
                ))
            })?;
        return Ok(manifest.layers[start..].to_vec());
    }

    if layer_count > 1 && layer_count <= manifest.layers.len() {
        return Ok(manifest.layers[manifest.layers.len() - layer_count..].to_vec());
    }

    Err(StrataError::InvalidArgument(
        "invalid squash option: need a layer digest or a layer count in (1, total]".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{MEDIA_TYPE_CONFIG, MEDIA_TYPE_LAYER_GZIP, MEDIA_TYPE_MANIFEST};

    fn manifest_with_layers(count: usize) -> Manifest {
        Manifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_MANIFEST.to_string(),
            config: Descriptor {
                media_type: MEDIA_TYPE_CONFIG.to_string(),
                digest: "sha256:config".to_string(),
                size: 1,
            },
            layers: (0..count)
                .map(|i| Descriptor {
                    media_type: MEDIA_TYPE_LAYER_GZIP.to_string(),
                    digest: format!("sha256:layer{}", i),
                    size: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_count_selects_last_n_in_order() {
        let manifest = manifest_with_layers(5);
        let selected = select_squash_layers(&manifest, "", 3).unwrap();
        let digests: Vec<&str> = selected.iter().map(|d| d.digest.as_str()).collect();
        assert_eq!(digests, vec!["sha256:layer2", "sha256:layer3", "sha256:layer4"]);
    }

    #[test]
    fn test_count_may_cover_all_layers() {
        let manifest = manifest_with_layers(3);
        assert_eq!(select_squash_layers(&manifest, "", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_count_of_one_is_invalid() {
        let manifest = manifest_with_layers(1);
        let err = select_squash_layers(&manifest, "", 1).unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument(_)));
    }

    #[test]
    fn test_count_above_total_is_invalid() {
        let manifest = manifest_with_layers(2);
        let err = select_squash_layers(&manifest, "", 3).unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument(_)));
    }

    #[test]
    fn test_no_selector_is_invalid() {
        let manifest = manifest_with_layers(4);
        let err = select_squash_layers(&manifest, "", 0).unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument(_)));
    }

    #[test]
    fn test_digest_selects_suffix_from_match() {
        let manifest = manifest_with_layers(5);
        let selected = select_squash_layers(&manifest, "sha256:layer2", 0).unwrap();
        let digests: Vec<&str> = selected.iter().map(|d| d.digest.as_str()).collect();
        assert_eq!(digests, vec!["sha256:layer2", "sha256:layer3", "sha256:layer4"]);
    }

    #[test]
    fn test_digest_takes_priority_over_count() {
        let manifest = manifest_with_layers(5);
        let selected = select_squash_layers(&manifest, "sha256:layer4", 3).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_digest_absent_is_not_found() {
        let manifest = manifest_with_layers(3);
        let err = select_squash_layers(&manifest, "sha256:ghost", 0).unwrap_err();
        assert!(err.is_not_found());
    }
}
