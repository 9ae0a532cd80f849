//! OCI image support for ocibundle.
//!
//! - Blob resolution behind the [`BlobResolver`] trait
//! - A read-only resolver over an on-disk OCI image layout
//! - Manifest history reconstruction ([`stat`])
//!
//! # Layout
//!
//! ```text
//! image/
//! ├── oci-layout           (OCI layout marker)
//! ├── index.json           (Image index, tags via ref.name annotations)
//! └── blobs/
//!     └── sha256/
//!         ├── <manifest>   (Image manifest)
//!         ├── <config>     (Image configuration)
//!         └── <layers>     (Filesystem layers)
//! ```

pub mod blob;
pub mod layout;
pub mod stat;

pub use blob::{Blob, BlobResolver};
pub use layout::{OciLayout, REF_NAME_ANNOTATION};
pub use stat::{align_history, stat, HistoryStat, LayerCursor, ManifestStat};
