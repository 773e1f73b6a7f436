//! `strata squash` collapses the trailing layers of an image into one.

use std::path::Path;

use clap::Args;

use strata_core::{Platform, Result, StrataError};
use strata_runtime::squash::{SquashOptions, SquashRuntime};
use strata_runtime::store::local::LocalStore;

#[derive(Args)]
pub struct SquashArgs {
    /// Source image reference
    pub source: String,

    /// Name for the squashed image
    pub target: String,

    /// The number of trailing layers to squash (must exceed 1)
    #[arg(short = 'c', long, default_value_t = 0)]
    pub layer_count: usize,

    /// Squash every layer from this digest onward
    #[arg(short = 'd', long, default_value = "")]
    pub layer_digest: String,

    /// Author (e.g., "Name <email@example.com>")
    #[arg(short, long, default_value = "")]
    pub author: String,

    /// Commit message
    #[arg(short, long, default_value = "")]
    pub message: String,
}

pub async fn execute(args: SquashArgs, root: &Path, experimental: bool) -> Result<()> {
    if !experimental {
        return Err(StrataError::InvalidArgument(
            "squash is an experimental feature, please enable experimental mode".to_string(),
        ));
    }

    let store = LocalStore::open(root)?;
    let runtime = SquashRuntime::new(
        store.images.clone(),
        store.content.clone(),
        store.snapshotter.clone(),
        store.differ.clone(),
        store.leases.clone(),
        "local",
        Platform::host(),
    );

    let record = runtime
        .squash(&SquashOptions {
            source: args.source,
            target: args.target,
            layer_count: args.layer_count,
            layer_digest: args.layer_digest,
            author: args.author,
            message: args.message,
        })
        .await?;

    println!("{}", record.target.digest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_requires_experimental_mode() {
        let tmp = TempDir::new().unwrap();
        let args = SquashArgs {
            source: "app:src".to_string(),
            target: "app:squashed".to_string(),
            layer_count: 2,
            layer_digest: String::new(),
            author: String::new(),
            message: String::new(),
        };

        let err = execute(args, tmp.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("experimental"));
        // The data root was never touched
        assert!(!tmp.path().join("blobs").exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let args = SquashArgs {
            source: "ghost:latest".to_string(),
            target: "app:squashed".to_string(),
            layer_count: 2,
            layer_digest: String::new(),
            author: String::new(),
            message: String::new(),
        };

        let err = execute(args, tmp.path(), true).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
