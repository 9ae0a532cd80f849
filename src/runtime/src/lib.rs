//! ocibundle Runtime - bundle metadata and image inspection.
//!
//! Persists the metadata sidecar written next to unpacked bundles and
//! reconstructs an image's build history from its manifest and config.

pub mod bundle;
pub mod oci;

// Re-export common types
pub use bundle::{bundle_meta_path, read_bundle_meta, write_bundle_meta};
pub use oci::{stat, Blob, BlobResolver, HistoryStat, ManifestStat, OciLayout};

/// ocibundle Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
