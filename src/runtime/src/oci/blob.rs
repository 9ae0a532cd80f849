//! BlobResolver - the content-addressable storage seam.

use async_trait::async_trait;
use ocibundle_core::error::{BundleError, Result};
use oci_spec::image::{Descriptor, ImageConfiguration, ImageManifest, MediaType};

/// A blob decoded according to its descriptor's media type.
#[derive(Debug, Clone)]
pub enum Blob {
    Manifest(ImageManifest),
    Config(ImageConfiguration),
    Raw(Vec<u8>),
}

impl Blob {
    /// Decode raw bytes according to `media_type`.
    ///
    /// Manifests and image configurations are parsed; anything else is kept
    /// as opaque bytes.
    pub fn decode(media_type: &MediaType, digest: &str, data: Vec<u8>) -> Result<Self> {
        match media_type {
            MediaType::ImageManifest => serde_json::from_slice(&data)
                .map(Blob::Manifest)
                .map_err(|e| BundleError::resolution(digest, format!("failed to parse manifest: {}", e))),
            MediaType::ImageConfig => serde_json::from_slice(&data)
                .map(Blob::Config)
                .map_err(|e| BundleError::resolution(digest, format!("failed to parse image config: {}", e))),
            _ => Ok(Blob::Raw(data)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Blob::Manifest(_) => "manifest",
            Blob::Config(_) => "image config",
            Blob::Raw(_) => "raw blob",
        }
    }

    /// Unwrap a manifest, failing with a resolution error for other kinds.
    pub fn into_manifest(self, digest: &str) -> Result<ImageManifest> {
        match self {
            Blob::Manifest(manifest) => Ok(manifest),
            other => Err(BundleError::resolution(
                digest,
                format!("expected manifest, resolved {}", other.kind()),
            )),
        }
    }

    /// Unwrap an image configuration, failing with a resolution error for other kinds.
    pub fn into_config(self, digest: &str) -> Result<ImageConfiguration> {
        match self {
            Blob::Config(config) => Ok(config),
            other => Err(BundleError::resolution(
                digest,
                format!("expected image config, resolved {}", other.kind()),
            )),
        }
    }
}

/// Resolves content descriptors to decoded blobs.
///
/// Implementations are read-only and must be safe to share across tasks.
#[async_trait]
pub trait BlobResolver: Send + Sync {
    async fn resolve(&self, descriptor: &Descriptor) -> Result<Blob>;
}
