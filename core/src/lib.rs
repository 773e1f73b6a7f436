//! Strata Core - Foundational Types
//!
//! This module provides the error taxonomy and host platform value shared
//! across the strata workspace.

pub mod error;
pub mod platform;

// Re-export commonly used types
pub use error::{Result, StrataError};
pub use platform::Platform;

/// Strata version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
