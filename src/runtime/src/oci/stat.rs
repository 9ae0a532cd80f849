//! Manifest history reconstruction.
//!
//! The image configuration lists one history entry per build instruction,
//! while the manifest lists only the layers that changed the filesystem.
//! Entries flagged `empty_layer` have no layer. Everything else consumes the
//! next `(layer, diff_id)` pair in order; there is no shared key, so the
//! pairing is purely positional.

use ocibundle_core::error::{BundleError, Result};
use oci_spec::image::{Descriptor, History, MediaType};
use serde::{Deserialize, Serialize};

use super::blob::BlobResolver;

/// Information about a single image manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestStat {
    /// One record per configuration history entry, oldest first.
    pub history: Vec<HistoryStat>,
}

/// A history entry paired with the layer it produced, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStat {
    /// Layer produced by this entry. `None` for empty-layer entries.
    pub layer: Option<Descriptor>,

    /// Digest of the uncompressed layer. `None` for empty-layer entries.
    pub diff_id: Option<String>,

    #[serde(flatten)]
    pub history: History,
}

impl HistoryStat {
    pub fn is_empty_layer(&self) -> bool {
        self.history.empty_layer().unwrap_or(false)
    }
}

/// Bounded cursor over the manifest layers and the config diff IDs.
///
/// Both sequences are walked with the same index; running off the end of
/// either one is an integrity failure, never a truncation.
#[derive(Debug)]
pub struct LayerCursor<'a> {
    layers: &'a [Descriptor],
    diff_ids: &'a [String],
    index: usize,
}

impl<'a> LayerCursor<'a> {
    pub fn new(layers: &'a [Descriptor], diff_ids: &'a [String]) -> Self {
        Self {
            layers,
            diff_ids,
            index: 0,
        }
    }

    /// Number of pairs consumed so far.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Layers not yet paired with a history entry.
    pub fn remaining_layers(&self) -> usize {
        self.layers.len().saturating_sub(self.index)
    }

    /// Take the pair at the cursor and move past it.
    ///
    /// `history_index` is only used to describe the failure.
    pub fn advance(&mut self, history_index: usize) -> Result<(&'a Descriptor, &'a String)> {
        let layer = self.layers.get(self.index);
        let diff_id = self.diff_ids.get(self.index);

        match (layer, diff_id) {
            (Some(layer), Some(diff_id)) => {
                self.index += 1;
                Ok((layer, diff_id))
            }
            _ => Err(BundleError::DataIntegrity(format!(
                "history entry {} needs layer {} but the manifest has {} layer(s) and the config has {} diff id(s)",
                history_index,
                self.index,
                self.layers.len(),
                self.diff_ids.len()
            ))),
        }
    }
}

/// Pair every history entry with its layer and diff ID.
pub fn align_history(
    history: &[History],
    layers: &[Descriptor],
    diff_ids: &[String],
) -> Result<ManifestStat> {
    let mut cursor = LayerCursor::new(layers, diff_ids);
    let mut stat = ManifestStat {
        history: Vec::with_capacity(history.len()),
    };

    for (idx, entry) in history.iter().enumerate() {
        let (layer, diff_id) = if entry.empty_layer().unwrap_or(false) {
            (None, None)
        } else {
            let (layer, diff_id) = cursor.advance(idx)?;
            (Some(layer.clone()), Some(diff_id.clone()))
        };

        stat.history.push(HistoryStat {
            layer,
            diff_id,
            history: entry.clone(),
        });
    }

    if cursor.remaining_layers() > 0 {
        tracing::warn!(
            paired = cursor.position(),
            layers = layers.len(),
            "manifest has layers with no matching history entry"
        );
    }

    Ok(stat)
}

/// Compute the [`ManifestStat`] for a manifest descriptor.
///
/// The descriptor must refer to an OCI image manifest; anything else is
/// rejected before the resolver is touched. The config is fetched only after
/// the manifest has been decoded.
pub async fn stat<R>(resolver: &R, manifest_descriptor: &Descriptor) -> Result<ManifestStat>
where
    R: BlobResolver + ?Sized,
{
    if manifest_descriptor.media_type() != &MediaType::ImageManifest {
        return Err(BundleError::InvalidInput(format!(
            "cannot stat a non-manifest descriptor {}: invalid media type '{}'",
            manifest_descriptor.digest(),
            manifest_descriptor.media_type()
        )));
    }

    let manifest_digest = manifest_descriptor.digest();
    tracing::debug!(digest = %manifest_digest, "resolving manifest");
    let manifest = resolver
        .resolve(manifest_descriptor)
        .await?
        .into_manifest(manifest_digest)?;

    let config_descriptor = manifest.config();
    tracing::debug!(digest = %config_descriptor.digest(), "resolving image config");
    let config = resolver
        .resolve(config_descriptor)
        .await?
        .into_config(config_descriptor.digest())?;

    align_history(config.history(), manifest.layers(), config.rootfs().diff_ids())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::blob::Blob;
    use async_trait::async_trait;
    use oci_spec::image::{ImageConfiguration, ImageManifest};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MANIFEST_DIGEST: &str =
        "sha256:1111111111111111111111111111111111111111111111111111111111111111";
    const CONFIG_DIGEST: &str =
        "sha256:2222222222222222222222222222222222222222222222222222222222222222";

    /// In-memory resolver that counts how often it is asked for a blob.
    struct MockResolver {
        blobs: HashMap<String, Blob>,
        calls: AtomicUsize,
    }

    impl MockResolver {
        fn new(manifest: ImageManifest, config: ImageConfiguration) -> Self {
            let mut blobs = HashMap::new();
            blobs.insert(MANIFEST_DIGEST.to_string(), Blob::Manifest(manifest));
            blobs.insert(CONFIG_DIGEST.to_string(), Blob::Config(config));
            Self {
                blobs,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobResolver for MockResolver {
        async fn resolve(&self, descriptor: &Descriptor) -> Result<Blob> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.blobs
                .get(descriptor.digest().as_str())
                .cloned()
                .ok_or_else(|| BundleError::resolution(descriptor.digest().as_str(), "blob not found"))
        }
    }

    fn layer_digest(n: usize) -> String {
        format!("sha256:{:064x}", 0xa0 + n)
    }

    fn diff_id(n: usize) -> String {
        format!("sha256:{:064x}", 0xd0 + n)
    }

    fn manifest_with_layers(count: usize) -> ImageManifest {
        let layers: Vec<String> = (0..count)
            .map(|n| {
                format!(
                    r#"{{"mediaType":"application/vnd.oci.image.layer.v1.tar+gzip","digest":"{}","size":{}}}"#,
                    layer_digest(n),
                    1000 + n
                )
            })
            .collect();
        let json = format!(
            r#"{{
                "schemaVersion": 2,
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "config": {{
                    "mediaType": "application/vnd.oci.image.config.v1+json",
                    "digest": "{}",
                    "size": 512
                }},
                "layers": [{}]
            }}"#,
            CONFIG_DIGEST,
            layers.join(",")
        );
        serde_json::from_str(&json).unwrap()
    }

    /// `empty` flags one history entry each; `diff_ids` is the diff id count.
    fn config_with_history(empty: &[bool], diff_ids: usize) -> ImageConfiguration {
        let history: Vec<String> = empty
            .iter()
            .enumerate()
            .map(|(i, e)| {
                format!(
                    r#"{{"created":"2024-01-0{}T00:00:00Z","created_by":"step {}","comment":"c{}","empty_layer":{}}}"#,
                    (i % 9) + 1,
                    i,
                    i,
                    e
                )
            })
            .collect();
        let ids: Vec<String> = (0..diff_ids).map(|n| format!("\"{}\"", diff_id(n))).collect();
        let json = format!(
            r#"{{
                "architecture": "amd64",
                "os": "linux",
                "rootfs": {{ "type": "layers", "diff_ids": [{}] }},
                "history": [{}]
            }}"#,
            ids.join(","),
            history.join(",")
        );
        serde_json::from_str(&json).unwrap()
    }

    fn manifest_descriptor() -> Descriptor {
        Descriptor::new(MediaType::ImageManifest, 700, MANIFEST_DIGEST)
    }

    #[tokio::test]
    async fn test_stat_all_layers_in_order() {
        let resolver = MockResolver::new(
            manifest_with_layers(3),
            config_with_history(&[false, false, false], 3),
        );

        let stat = stat(&resolver, &manifest_descriptor()).await.unwrap();

        assert_eq!(stat.history.len(), 3);
        for (i, record) in stat.history.iter().enumerate() {
            assert_eq!(record.layer.as_ref().unwrap().digest(), &layer_digest(i));
            assert_eq!(record.diff_id.as_deref(), Some(diff_id(i).as_str()));
            assert_eq!(record.history.created_by().as_deref(), Some(format!("step {i}").as_str()));
        }
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_stat_interleaved_empty_entries() {
        let resolver = MockResolver::new(
            manifest_with_layers(2),
            config_with_history(&[true, false, true, false], 2),
        );

        let stat = stat(&resolver, &manifest_descriptor()).await.unwrap();

        assert_eq!(stat.history.len(), 4);
        assert!(stat.history[0].layer.is_none());
        assert!(stat.history[0].diff_id.is_none());
        assert_eq!(stat.history[1].layer.as_ref().unwrap().digest(), &layer_digest(0));
        assert_eq!(stat.history[1].diff_id.as_deref(), Some(diff_id(0).as_str()));
        assert!(stat.history[2].layer.is_none());
        assert!(stat.history[2].diff_id.is_none());
        assert_eq!(stat.history[3].layer.as_ref().unwrap().digest(), &layer_digest(1));
        assert_eq!(stat.history[3].diff_id.as_deref(), Some(diff_id(1).as_str()));
    }

    #[tokio::test]
    async fn test_stat_presence_follows_empty_flag() {
        let flags = [true, false, false, true, true, false];
        let resolver = MockResolver::new(manifest_with_layers(3), config_with_history(&flags, 3));

        let stat = stat(&resolver, &manifest_descriptor()).await.unwrap();

        for (record, empty) in stat.history.iter().zip(flags) {
            assert_eq!(record.is_empty_layer(), empty);
            assert_eq!(record.layer.is_none(), empty);
            assert_eq!(record.diff_id.is_none(), empty);
        }
    }

    #[tokio::test]
    async fn test_stat_too_few_layers_is_integrity_error() {
        let resolver = MockResolver::new(
            manifest_with_layers(1),
            config_with_history(&[false, true, false], 2),
        );

        let err = stat(&resolver, &manifest_descriptor()).await.unwrap_err();

        assert!(matches!(err, BundleError::DataIntegrity(_)));
        assert!(err.to_string().contains("history entry 2"));
    }

    #[tokio::test]
    async fn test_stat_too_few_diff_ids_is_integrity_error() {
        let resolver = MockResolver::new(
            manifest_with_layers(2),
            config_with_history(&[false, false], 1),
        );

        let err = stat(&resolver, &manifest_descriptor()).await.unwrap_err();

        assert!(matches!(err, BundleError::DataIntegrity(_)));
    }

    #[tokio::test]
    async fn test_stat_tolerates_extra_layers() {
        let resolver = MockResolver::new(
            manifest_with_layers(3),
            config_with_history(&[false, true], 3),
        );

        let stat = stat(&resolver, &manifest_descriptor()).await.unwrap();

        assert_eq!(stat.history.len(), 2);
        assert_eq!(stat.history[0].layer.as_ref().unwrap().digest(), &layer_digest(0));
    }

    #[tokio::test]
    async fn test_stat_empty_history() {
        let resolver = MockResolver::new(manifest_with_layers(0), config_with_history(&[], 0));

        let stat = stat(&resolver, &manifest_descriptor()).await.unwrap();

        assert!(stat.history.is_empty());
    }

    #[tokio::test]
    async fn test_stat_rejects_non_manifest_without_resolving() {
        let resolver = MockResolver::new(manifest_with_layers(1), config_with_history(&[false], 1));
        let descriptor = Descriptor::new(MediaType::ImageConfig, 512, CONFIG_DIGEST);

        let err = stat(&resolver, &descriptor).await.unwrap_err();

        assert!(matches!(err, BundleError::InvalidInput(_)));
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_stat_rejects_index_media_type() {
        let resolver = MockResolver::new(manifest_with_layers(1), config_with_history(&[false], 1));
        let descriptor = Descriptor::new(MediaType::ImageIndex, 300, MANIFEST_DIGEST);

        let err = stat(&resolver, &descriptor).await.unwrap_err();

        assert!(err.to_string().contains("invalid media type"));
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_stat_manifest_resolution_failure() {
        let resolver = MockResolver {
            blobs: HashMap::new(),
            calls: AtomicUsize::new(0),
        };

        let err = stat(&resolver, &manifest_descriptor()).await.unwrap_err();

        assert!(matches!(err, BundleError::Resolution { ref digest, .. } if digest == MANIFEST_DIGEST));
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_stat_config_resolution_failure() {
        let mut resolver = MockResolver::new(manifest_with_layers(1), config_with_history(&[false], 1));
        resolver.blobs.remove(CONFIG_DIGEST);

        let err = stat(&resolver, &manifest_descriptor()).await.unwrap_err();

        assert!(matches!(err, BundleError::Resolution { ref digest, .. } if digest == CONFIG_DIGEST));
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_stat_manifest_digest_resolving_to_wrong_kind() {
        let mut resolver = MockResolver::new(manifest_with_layers(1), config_with_history(&[false], 1));
        resolver
            .blobs
            .insert(MANIFEST_DIGEST.to_string(), Blob::Raw(b"{}".to_vec()));

        let err = stat(&resolver, &manifest_descriptor()).await.unwrap_err();

        assert!(matches!(err, BundleError::Resolution { .. }));
        assert_eq!(resolver.calls(), 1);
    }

    #[test]
    fn test_cursor_checked_advance() {
        let layers = vec![Descriptor::new(MediaType::ImageLayerGzip, 10, layer_digest(0))];
        let diff_ids = vec![diff_id(0)];
        let mut cursor = LayerCursor::new(&layers, &diff_ids);

        let (layer, id) = cursor.advance(0).unwrap();
        assert_eq!(layer.digest(), &layer_digest(0));
        assert_eq!(id, &diff_id(0));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.remaining_layers(), 0);

        assert!(matches!(cursor.advance(1), Err(BundleError::DataIntegrity(_))));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_history_stat_json_shape() {
        let stat = align_history(
            config_with_history(&[true, false], 1).history(),
            manifest_with_layers(1).layers(),
            &[diff_id(0)],
        )
        .unwrap();

        let value = serde_json::to_value(&stat).unwrap();
        assert!(value["history"][0]["layer"].is_null());
        assert_eq!(value["history"][0]["empty_layer"], true);
        assert_eq!(value["history"][1]["created_by"], "step 1");
        assert_eq!(value["history"][1]["diff_id"], diff_id(0));
        assert_eq!(value["history"][1]["layer"]["digest"], layer_digest(0));
    }
}
