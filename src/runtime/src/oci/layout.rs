//! Read-only blob resolver over an OCI image layout on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ocibundle_core::error::{BundleError, Result};
use oci_spec::image::{Descriptor, ImageIndex, MediaType};
use sha2::{Digest, Sha256};

use super::blob::{Blob, BlobResolver};

/// Annotation carrying a manifest's tag inside `index.json`.
pub const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// An OCI image layout directory.
#[derive(Debug, Clone)]
pub struct OciLayout {
    /// Root directory of the OCI image layout
    root_dir: PathBuf,
}

impl OciLayout {
    /// Open an OCI image layout.
    ///
    /// The directory must contain `oci-layout`, `index.json` and `blobs/`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root_dir = path.as_ref().to_path_buf();
        if !root_dir.is_dir() {
            return Err(BundleError::NotFound { path: root_dir });
        }

        for entry in ["oci-layout", "index.json", "blobs"] {
            if !root_dir.join(entry).exists() {
                return Err(BundleError::Config(format!(
                    "Not a valid OCI layout: missing {} in {}",
                    entry,
                    root_dir.display()
                )));
            }
        }

        Ok(Self { root_dir })
    }

    /// Load the image index from index.json.
    pub fn index(&self) -> Result<ImageIndex> {
        let index_path = self.root_dir.join("index.json");
        let content = std::fs::read(&index_path)?;
        serde_json::from_slice(&content).map_err(|e| {
            BundleError::Parse(format!("failed to parse {}: {}", index_path.display(), e))
        })
    }

    /// Find the manifest descriptor for `tag` in index.json.
    ///
    /// Without a tag, the index must hold exactly one manifest. Nested
    /// indexes are not followed.
    pub fn resolve_reference(&self, tag: Option<&str>) -> Result<Descriptor> {
        let index = self.index()?;
        let manifests = index.manifests();

        let descriptor = match tag {
            Some(tag) => manifests
                .iter()
                .find(|d| {
                    d.annotations()
                        .as_ref()
                        .and_then(|a| a.get(REF_NAME_ANNOTATION))
                        .is_some_and(|name| name == tag)
                })
                .ok_or_else(|| {
                    BundleError::InvalidInput(format!(
                        "tag '{}' not found in {}",
                        tag,
                        self.root_dir.display()
                    ))
                })?,
            None => match manifests.as_slice() {
                [only] => only,
                [] => {
                    return Err(BundleError::InvalidInput(format!(
                        "no manifests in {}",
                        self.root_dir.display()
                    )))
                }
                _ => {
                    return Err(BundleError::InvalidInput(format!(
                        "{} manifests in {}; a tag is required",
                        manifests.len(),
                        self.root_dir.display()
                    )))
                }
            },
        };

        if descriptor.media_type() == &MediaType::ImageIndex {
            return Err(BundleError::InvalidInput(format!(
                "{} refers to a nested image index, which is not supported",
                descriptor.digest()
            )));
        }

        tracing::debug!(digest = %descriptor.digest(), tag = ?tag, "resolved reference");
        Ok(descriptor.clone())
    }

    /// Get the path to a blob by digest.
    fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        let (algorithm, hash) = digest.split_once(':').ok_or_else(|| {
            BundleError::resolution(digest, "digest is missing an algorithm prefix")
        })?;

        let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "+._-".contains(c));
        if !valid(algorithm) || !valid(hash) || hash.contains("..") {
            return Err(BundleError::resolution(digest, "malformed digest"));
        }

        Ok(self.root_dir.join("blobs").join(algorithm).join(hash))
    }
}

/// Check blob length and content digest against its descriptor.
fn verify_blob(descriptor: &Descriptor, data: &[u8]) -> Result<()> {
    let digest = descriptor.digest();

    if descriptor.size() >= 0 && data.len() as u64 != descriptor.size() as u64 {
        return Err(BundleError::resolution(
            digest.as_str(),
            format!(
                "size mismatch: blob is {} bytes, descriptor says {}",
                data.len(),
                descriptor.size()
            ),
        ));
    }

    match digest.split_once(':') {
        Some(("sha256", expected)) => {
            let actual = hex::encode(Sha256::digest(data));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(BundleError::resolution(
                    digest.as_str(),
                    format!("digest mismatch: blob has digest sha256:{}", actual),
                ));
            }
        }
        Some((algorithm, _)) => {
            tracing::debug!(%digest, algorithm, "skipping verification of unsupported digest algorithm");
        }
        None => {}
    }

    Ok(())
}

#[async_trait]
impl BlobResolver for OciLayout {
    async fn resolve(&self, descriptor: &Descriptor) -> Result<Blob> {
        let digest = descriptor.digest();
        let path = self.blob_path(digest)?;

        let data = tokio::fs::read(&path).await.map_err(|e| {
            BundleError::resolution(
                digest.as_str(),
                format!("failed to read blob {}: {}", path.display(), e),
            )
        })?;

        verify_blob(descriptor, &data)?;
        tracing::debug!(%digest, media_type = %descriptor.media_type(), bytes = data.len(), "resolved blob");

        Blob::decode(descriptor.media_type(), digest, data)
    }
}
