//! Host platform identification.
//!
//! Image configs carry an architecture/OS pair in the naming convention
//! used by registries ("amd64", "arm64", ...). The squash pipeline takes a
//! `Platform` value as input instead of querying the environment at the
//! point of use, so the fallback behavior is deterministic and testable.

use serde::{Deserialize, Serialize};

/// An architecture/OS pair in registry naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
}

impl Platform {
    pub fn new(architecture: impl Into<String>, os: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            os: os.into(),
        }
    }

    /// The platform of the running process.
    pub fn host() -> Self {
        Self {
            architecture: normalize_arch(std::env::consts::ARCH).to_string(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// Map Rust's architecture names onto registry convention.
fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
