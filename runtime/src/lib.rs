//! Strata Runtime - image squash engine.
//!
//! This crate provides the OCI data model, the capability traits for the
//! storage collaborators (image store, content store, snapshotter, diff
//! service, lease manager), a local disk-backed implementation of those
//! capabilities, and the squash pipeline that orchestrates them.

pub mod oci;
pub mod squash;
pub mod store;
