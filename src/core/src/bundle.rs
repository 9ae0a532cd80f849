//! Bundle metadata types.
//!
//! A bundle produced by unpacking an image carries a small JSON sidecar
//! (`ocibundle.json`) recording which manifest it came from and how file
//! ownership was remapped, so a later repack can reproduce the same settings.

use std::io::Write;

use oci_spec::image::Descriptor;
use oci_spec::runtime::{LinuxIdMapping, LinuxIdMappingBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// Name of the metadata file stored at the root of every bundle.
pub const BUNDLE_META_NAME: &str = "ocibundle.json";

/// Metadata about how an image was unpacked into a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Version of the tool that produced the bundle. Informational only.
    pub version: String,

    /// Descriptor of the image manifest the bundle was unpacked from.
    pub from_descriptor: Descriptor,

    /// Ownership remapping used during unpack. A repack should reuse these
    /// unless the caller deliberately overrides them.
    #[serde(default)]
    pub map_options: MapOptions,
}

impl BundleMeta {
    pub fn new(version: impl Into<String>, from_descriptor: Descriptor, map_options: MapOptions) -> Self {
        Self {
            version: version.into(),
            from_descriptor,
            map_options,
        }
    }

    /// Serialize as a single JSON document followed by a newline.
    ///
    /// Returns the number of bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let mut buf = serde_json::to_vec_pretty(self)?;
        buf.push(b'\n');
        writer.write_all(&buf)?;
        Ok(buf.len() as u64)
    }
}

/// UID/GID remapping options applied when extracting layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapOptions {
    #[serde(default)]
    pub uid_mappings: Vec<LinuxIdMapping>,

    #[serde(default)]
    pub gid_mappings: Vec<LinuxIdMapping>,

    /// Unpacked by an unprivileged user; ownership changes are emulated.
    #[serde(default)]
    pub rootless: bool,
}

impl MapOptions {
    /// Default options for a rootless unpack: container root maps to the
    /// invoking user and group, nothing else is mapped.
    pub fn rootless_for(uid: u32, gid: u32) -> Result<Self> {
        Ok(Self {
            uid_mappings: vec![id_mapping(0, uid, 1)?],
            gid_mappings: vec![id_mapping(0, gid, 1)?],
            rootless: true,
        })
    }
}

/// Build a single mapping entry.
pub fn id_mapping(container_id: u32, host_id: u32, size: u32) -> Result<LinuxIdMapping> {
    LinuxIdMappingBuilder::default()
        .container_id(container_id)
        .host_id(host_id)
        .size(size)
        .build()
        .map_err(|e| BundleError::InvalidInput(format!("invalid id mapping: {}", e)))
}

/// Parse an ID mapping of the form `container:host[:size]`.
///
/// `size` defaults to 1 and must be non-zero.
pub fn parse_id_mapping(s: &str) -> Result<LinuxIdMapping> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(BundleError::InvalidInput(format!(
            "invalid id mapping '{}': expected container:host[:size]",
            s
        )));
    }

    let field = |value: &str, name: &str| -> Result<u32> {
        value.parse::<u32>().map_err(|_| {
            BundleError::InvalidInput(format!("invalid id mapping '{}': bad {} '{}'", s, name, value))
        })
    };

    let container_id = field(parts[0], "container id")?;
    let host_id = field(parts[1], "host id")?;
    let size = match parts.get(2) {
        Some(v) => field(v, "size")?,
        None => 1,
    };
    if size == 0 {
        return Err(BundleError::InvalidInput(format!(
            "invalid id mapping '{}': size must be non-zero",
            s
        )));
    }

    id_mapping(container_id, host_id, size)
}
