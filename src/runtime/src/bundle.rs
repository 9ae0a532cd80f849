//! Persistent bundle metadata.
//!
//! The sidecar lives at `<bundle>/ocibundle.json` and is replaced with an
//! atomic write (write to a tmp file, sync, then rename) so readers never see
//! a partially written document. There is no locking here: callers must keep
//! to one writer per bundle.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use ocibundle_core::bundle::{BundleMeta, BUNDLE_META_NAME};
use ocibundle_core::error::{BundleError, Result};

/// Path of the metadata file inside `bundle`.
pub fn bundle_meta_path(bundle: &Path) -> PathBuf {
    bundle.join(BUNDLE_META_NAME)
}

/// Write `meta` to the bundle, replacing any existing metadata file.
pub fn write_bundle_meta(bundle: &Path, meta: &BundleMeta) -> Result<()> {
    let path = bundle_meta_path(bundle);
    let tmp_path = path.with_extension("json.tmp");

    if let Err(e) = write_synced(&tmp_path, meta) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(BundleError::Io(std::io::Error::new(
            e.kind(),
            format!(
                "failed to rename {} → {}: {}",
                tmp_path.display(),
                path.display(),
                e
            ),
        )));
    }

    tracing::debug!(
        path = %path.display(),
        digest = %meta.from_descriptor.digest(),
        "wrote bundle metadata"
    );
    Ok(())
}

fn write_synced(tmp_path: &Path, meta: &BundleMeta) -> Result<()> {
    let mut file = File::create(tmp_path).map_err(|e| {
        BundleError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to create {}: {}", tmp_path.display(), e),
        ))
    })?;
    meta.write_to(&mut file)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

/// Read the metadata file from the bundle.
///
/// A bundle without metadata yields [`BundleError::NotFound`].
pub fn read_bundle_meta(bundle: &Path) -> Result<BundleMeta> {
    let path = bundle_meta_path(bundle);

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(BundleError::NotFound { path });
        }
        Err(e) => {
            return Err(BundleError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open {}: {}", path.display(), e),
            )));
        }
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        if e.is_io() {
            BundleError::Io(std::io::Error::new(
                e.io_error_kind().unwrap_or(ErrorKind::Other),
                format!("failed to read {}: {}", path.display(), e),
            ))
        } else {
            BundleError::Parse(format!("failed to parse {}: {}", path.display(), e))
        }
    })
}
