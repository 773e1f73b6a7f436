//! Derivation of the base and commit image configs.

use chrono::Utc;

use strata_core::{Platform, Result, StrataError};

use crate::oci::{History, ImageConfig, RootFs};

/// Trim the original config down to the retained layers.
///
/// `diff_ids` keeps the first `remaining` entries. History is walked in
/// order: empty-layer entries are always kept; a non-empty entry is kept
/// while fewer than `remaining` of them have been kept, and the walk stops
/// at the first non-empty entry past that count, dropping everything after.
pub fn base_image_config(original: &ImageConfig, remaining: usize) -> Result<ImageConfig> {
    if remaining > original.rootfs.diff_ids.len() {
        return Err(StrataError::InvalidArgument(format!(
            "cannot retain {} layers, config has only {} diff IDs",
            remaining,
            original.rootfs.diff_ids.len()
        )));
    }

    let mut history = Vec::new();
    let mut kept = 0;
    for entry in &original.history {
        if entry.empty_layer {
            history.push(entry.clone());
            continue;
        }
        if kept + 1 <= remaining {
            history.push(entry.clone());
            kept += 1;
        } else {
            break;
        }
    }

    Ok(ImageConfig {
        created: Some(Utc::now()),
        author: original.author.clone(),
        architecture: original.architecture.clone(),
        os: original.os.clone(),
        config: original.config.clone(),
        rootfs: RootFs {
            fs_type: original.rootfs.fs_type.clone(),
            diff_ids: original.rootfs.diff_ids[..remaining].to_vec(),
        },
        history,
    })
}

/// Extend the base config with the newly squashed layer.
///
/// Appends the diff ID and one non-empty history entry. An explicit author
/// overrides the base author; architecture/OS fall back to the host
/// platform when the base leaves them empty.
pub fn commit_image_config(
    base: &ImageConfig,
    diff_id: &str,
    author: &str,
    message: &str,
    host: &Platform,
) -> ImageConfig {
    let created = Utc::now();

    let architecture = if base.architecture.is_empty() {
        tracing::warn!(architecture = %host.architecture, "config has no architecture, assuming host");
        host.architecture.clone()
    } else {
        base.architecture.clone()
    };
    let os = if base.os.is_empty() {
        tracing::warn!(os = %host.os, "config has no os, assuming host");
        host.os.clone()
    } else {
        base.os.clone()
    };

    let author = match author.trim() {
        "" => base.author.clone(),
        trimmed => Some(trimmed.to_string()),
    };
    let comment = message.trim().to_string();

    let mut diff_ids = base.rootfs.diff_ids.clone();
    diff_ids.push(diff_id.to_string());

    let mut history = base.history.clone();
    history.push(History {
        created: Some(created),
        author: author.clone(),
        created_by: None,
        comment: Some(comment),
        empty_layer: false,
    });

    ImageConfig {
        created: Some(created),
        author,
        architecture,
        os,
        config: base.config.clone(),
        rootfs: RootFs::layers(diff_ids),
        history,
    }
}
