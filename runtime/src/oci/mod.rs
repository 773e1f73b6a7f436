//! OCI image data model for strata.
//!
//! Defines the content-addressed artifacts the squash pipeline reads and
//! writes (descriptors, manifests, image configs) and the chain-ID
//! identity computed over ordered diff-ID sequences. The pipeline hashes
//! the exact bytes it serializes, so the JSON shape of these types is part
//! of the contract.

pub mod identity;
mod spec;

pub use identity::chain_id;
pub use spec::{
    digest_bytes, Descriptor, History, ImageConfig, Manifest, RootFs, MEDIA_TYPE_CONFIG,
    MEDIA_TYPE_LAYER_GZIP, MEDIA_TYPE_MANIFEST,
};
