//! Image manifest and config handling
//!
//! This module turns externally supplied manifest and configuration blobs
//! into the derived fields of an [`Image`] record:
//!
//! - [`manifest`] parses schema 1, schema 2 / OCI manifests and manifest lists
//!   into one [`ParsedManifest`] variant
//! - [`config`] unpacks the image configuration blob
//! - [`metadata`] merges both into layers, size and structured metadata
//! - [`digest`] computes and verifies `algorithm:hex` content digests
//! - [`import`] ties the pieces together behind [`ImageImporter`]
//!
//! # Examples
//!
//! ```
//! use image_import::config::ImportConfig;
//! use image_import::image::{DigestRegistry, ImageImporter};
//!
//! let manifest = r#"{
//!     "schemaVersion": 2,
//!     "mediaType": "application/vnd.oci.image.manifest.v1+json",
//!     "config": {"size": 2, "digest": "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"},
//!     "layers": [{"size": 10, "digest": "sha256:d9d352c11bbd3880007953ed6eec1cbace76898828f3434984a0ca60672fdf5a"}]
//! }"#;
//!
//! let settings = ImportConfig::default();
//! let digests = DigestRegistry::default();
//! let derived = ImageImporter::new(&settings, &digests)
//!     .import("example", manifest, "", "{}")
//!     .unwrap();
//! assert_eq!(derived.image.size(), 10);
//! ```

pub mod config;
pub mod digest;
pub mod import;
pub mod manifest;
pub mod metadata;
pub mod model;
pub mod schema1;

pub use config::{ConfigMetadata, unpack_config};
pub use digest::{Digest, DigestAlgorithm, DigestRegistry};
pub use import::{Derived, ImageImporter};
pub use manifest::{Descriptor, ManifestKind, ParsedManifest, parse_manifest};
pub use metadata::{SynthesizedImage, synthesize};
pub use model::{
    DockerConfig, DockerImageMetadata, HistoryEntry, Image, ImageLayer, ImageManifest, ObjectMeta,
    RootFs,
};
