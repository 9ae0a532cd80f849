//! ocibundle Core - Foundational Types
//!
//! Error types, bundle metadata records, ID mapping options and CLI
//! configuration shared by the runtime and CLI crates.

pub mod bundle;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use bundle::{parse_id_mapping, BundleMeta, MapOptions, BUNDLE_META_NAME};
pub use config::CliConfig;
pub use error::{BundleError, Result};

/// ocibundle version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
