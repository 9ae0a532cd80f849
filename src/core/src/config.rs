use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{BundleError, Result};

/// Environment variable overriding the default image layout directory.
pub const ENV_LAYOUT: &str = "OCIBUNDLE_LAYOUT";

/// Environment variable overriding the default tag.
pub const ENV_TAG: &str = "OCIBUNDLE_TAG";

/// Environment variable overriding the CREATED BY truncation width.
pub const ENV_TRUNCATE: &str = "OCIBUNDLE_TRUNCATE";

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// OCI image layout used when no `--layout` is given
    pub layout: PathBuf,

    /// Tag resolved in the layout's index when no `--tag` is given.
    /// `None` means "the only manifest in the index".
    pub tag: Option<String>,

    /// Maximum width of free-text columns before truncation
    pub truncate_width: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            layout: PathBuf::from("."),
            tag: None,
            truncate_width: 60,
        }
    }
}

impl CliConfig {
    /// Defaults overridden by `OCIBUNDLE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(layout) = lookup(ENV_LAYOUT).filter(|v| !v.is_empty()) {
            config.layout = PathBuf::from(layout);
        }
        if let Some(tag) = lookup(ENV_TAG).filter(|v| !v.is_empty()) {
            config.tag = Some(tag);
        }
        if let Some(width) = lookup(ENV_TRUNCATE).filter(|v| !v.is_empty()) {
            config.truncate_width = width.parse().map_err(|_| {
                BundleError::Config(format!("{} must be a positive integer, got '{}'", ENV_TRUNCATE, width))
            })?;
            if config.truncate_width == 0 {
                return Err(BundleError::Config(format!("{} must be non-zero", ENV_TRUNCATE)));
            }
        }

        tracing::debug!(?config, "loaded cli configuration");
        Ok(config)
    }
}
