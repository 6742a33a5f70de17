//! Build-time information
//!
//! Build metadata captured at compile time by `build.rs`, surfaced on the
//! service info endpoint.

use serde::Serialize;

/// Build timestamp (when the binary was compiled)
pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

/// Cargo optimization level (0, 1, 2, 3, s, z)
pub const CARGO_OPT_LEVEL: &str = env!("VERGEN_CARGO_OPT_LEVEL");

/// Target triple (e.g., x86_64-unknown-linux-gnu, x86_64-apple-darwin)
pub const CARGO_TARGET_TRIPLE: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Rust compiler version (e.g., 1.75.0)
pub const RUSTC_SEMVER: &str = env!("VERGEN_RUSTC_SEMVER");

/// Rust channel (stable, beta, or nightly)
pub const RUSTC_CHANNEL: &str = env!("VERGEN_RUSTC_CHANNEL");

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serializable snapshot of the build metadata
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildInfo {
    pub timestamp: &'static str,
    pub target: &'static str,
    pub opt_level: &'static str,
    pub rustc: &'static str,
    pub channel: &'static str,
}

/// Returns the build metadata of this binary
pub fn current() -> BuildInfo {
    BuildInfo {
        timestamp: BUILD_TIMESTAMP,
        target: CARGO_TARGET_TRIPLE,
        opt_level: CARGO_OPT_LEVEL,
        rustc: RUSTC_SEMVER,
        channel: RUSTC_CHANNEL,
    }
}

/// Returns a formatted build version string
///
/// Format: `{version} ({target_triple}-opt{opt_level})`
/// Example: `1.0.0 (x86_64-unknown-linux-gnu-opt3)`
pub fn version_string() -> String {
    format!("{VERSION} ({CARGO_TARGET_TRIPLE}-opt{CARGO_OPT_LEVEL})")
}
