//! Manifest parsing
//!
//! Decodes schema 1, schema 2 / OCI image manifests and manifest lists /
//! indexes into a single [`ParsedManifest`] variant. Dispatch is driven by the
//! document itself (`schemaVersion`, `mediaType`, presence of `manifests`);
//! the declared media type stored alongside the manifest is only checked for
//! consistency.

use crate::error::{ImportError, Result};
use crate::image::digest::Digest;
use crate::image::model::{ImageLayer, ImageManifest};
use crate::image::schema1::{self, Schema1Image};
use serde::Deserialize;
use serde::de::IgnoredAny;

pub mod media_types {
    pub const DOCKER_SCHEMA1: &str = "application/vnd.docker.distribution.manifest.v1+json";
    pub const DOCKER_SCHEMA1_SIGNED: &str =
        "application/vnd.docker.distribution.manifest.v1+prettyjws";
    pub const DOCKER_SCHEMA2: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
    pub const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
    pub const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
    pub const DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
}

use media_types::*;

/// Manifest family a media type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Schema1,
    Image,
    List,
}

impl ManifestKind {
    /// Classify a declared media type. `Ok(None)` means the declared type
    /// carries no manifest information and dispatch relies on content alone.
    pub fn from_media_type(media_type: &str) -> Result<Option<Self>> {
        match media_type {
            "" | DOCKER_CONFIG => Ok(None),
            DOCKER_SCHEMA1 | DOCKER_SCHEMA1_SIGNED => Ok(Some(ManifestKind::Schema1)),
            DOCKER_SCHEMA2 | OCI_MANIFEST => Ok(Some(ManifestKind::Image)),
            DOCKER_MANIFEST_LIST | OCI_INDEX => Ok(Some(ManifestKind::List)),
            other => Err(ImportError::ManifestParse(format!(
                "Unsupported manifest media type: {}",
                other
            ))),
        }
    }
}

/// Content descriptor as found in schema 2 and OCI documents
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    pub size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub variant: Option<String>,
}

/// Schema-agnostic result of parsing a manifest
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedManifest {
    /// Legacy manifest with the image config embedded in its history
    Schema1(Schema1Image),
    /// Docker schema 2 or OCI image manifest
    Image {
        media_type: String,
        config: Descriptor,
        layers: Vec<ImageLayer>,
    },
    /// Manifest list or OCI index; layers live in the child manifests
    List {
        media_type: String,
        manifests: Vec<ImageManifest>,
    },
}

impl ParsedManifest {
    pub fn kind(&self) -> ManifestKind {
        match self {
            ParsedManifest::Schema1(_) => ManifestKind::Schema1,
            ParsedManifest::Image { .. } => ManifestKind::Image,
            ParsedManifest::List { .. } => ManifestKind::List,
        }
    }

    pub fn schema_version(&self) -> u32 {
        match self {
            ParsedManifest::Schema1(_) => 1,
            _ => 2,
        }
    }

    /// Layers ordered base to top; empty for lists
    pub fn layers(&self) -> &[ImageLayer] {
        match self {
            ParsedManifest::Schema1(image) => &image.layers,
            ParsedManifest::Image { layers, .. } => layers,
            ParsedManifest::List { .. } => &[],
        }
    }

    pub fn config_descriptor(&self) -> Option<&Descriptor> {
        match self {
            ParsedManifest::Image { config, .. } => Some(config),
            _ => None,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.layers().iter().map(|l| l.size).sum()
    }
}

#[derive(Deserialize)]
struct ManifestHeader {
    #[serde(rename = "schemaVersion")]
    schema_version: Option<i64>,
    #[serde(rename = "mediaType")]
    media_type: Option<String>,
    manifests: Option<IgnoredAny>,
}

#[derive(Deserialize)]
struct ImageManifestDocument {
    config: Descriptor,
    layers: Vec<Descriptor>,
}

#[derive(Deserialize)]
struct ManifestListDocument {
    manifests: Vec<ManifestListEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestListEntry {
    #[serde(default)]
    media_type: String,
    digest: String,
    size: i64,
    #[serde(default)]
    platform: Option<Platform>,
}

fn parse_error(err: serde_json::Error) -> ImportError {
    ImportError::ManifestParse(err.to_string())
}

/// Parse a raw manifest, using `declared_media_type` as a consistency check.
pub fn parse_manifest(raw: &[u8], declared_media_type: &str) -> Result<ParsedManifest> {
    let declared = ManifestKind::from_media_type(declared_media_type)?;
    let header: ManifestHeader = serde_json::from_slice(raw).map_err(parse_error)?;

    let schema_version = header.schema_version.ok_or_else(|| {
        ImportError::ManifestParse("Manifest is missing schemaVersion".to_string())
    })?;

    let detected = match schema_version {
        1 => ManifestKind::Schema1,
        2 => match header.media_type.as_deref() {
            Some(media_type) if !media_type.is_empty() => {
                match ManifestKind::from_media_type(media_type)? {
                    Some(ManifestKind::Schema1) | None => {
                        return Err(ImportError::ManifestParse(format!(
                            "Media type {} is not valid for schemaVersion 2",
                            media_type
                        )));
                    }
                    Some(kind) => kind,
                }
            }
            // OCI documents may omit mediaType; an index is recognised by its
            // manifests array
            _ if header.manifests.is_some() => ManifestKind::List,
            _ => ManifestKind::Image,
        },
        other => {
            return Err(ImportError::ManifestParse(format!(
                "Unsupported manifest schemaVersion {}",
                other
            )));
        }
    };

    if let Some(declared) = declared {
        if declared != detected {
            return Err(ImportError::ManifestParse(format!(
                "Declared media type {} does not match manifest content ({:?})",
                declared_media_type, detected
            )));
        }
    }

    let media_type = header
        .media_type
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| match detected {
            ManifestKind::Schema1 => DOCKER_SCHEMA1.to_string(),
            ManifestKind::Image => OCI_MANIFEST.to_string(),
            ManifestKind::List => OCI_INDEX.to_string(),
        });

    match detected {
        ManifestKind::Schema1 => schema1::parse(raw).map(ParsedManifest::Schema1),
        ManifestKind::Image => parse_image_manifest(raw, media_type),
        ManifestKind::List => parse_manifest_list(raw, media_type),
    }
}

fn parse_image_manifest(raw: &[u8], media_type: String) -> Result<ParsedManifest> {
    let document: ImageManifestDocument = serde_json::from_slice(raw).map_err(parse_error)?;

    check_descriptor("config", &document.config.digest, document.config.size)?;

    let layers = document
        .layers
        .into_iter()
        .enumerate()
        .map(|(index, layer)| {
            let size = check_descriptor(&format!("layers[{}]", index), &layer.digest, layer.size)?;
            let media_type = if layer.media_type.is_empty() {
                DOCKER_LAYER.to_string()
            } else {
                layer.media_type
            };
            Ok(ImageLayer {
                name: layer.digest,
                size,
                media_type,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedManifest::Image {
        media_type,
        config: document.config,
        layers,
    })
}

fn parse_manifest_list(raw: &[u8], media_type: String) -> Result<ParsedManifest> {
    let document: ManifestListDocument = serde_json::from_slice(raw).map_err(parse_error)?;

    let manifests = document
        .manifests
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let size =
                check_descriptor(&format!("manifests[{}]", index), &entry.digest, entry.size)?;
            let platform = entry.platform.unwrap_or_default();
            Ok(ImageManifest {
                digest: entry.digest,
                media_type: entry.media_type,
                manifest_size: size,
                architecture: platform.architecture,
                os: platform.os,
                variant: platform.variant.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedManifest::List {
        media_type,
        manifests,
    })
}

/// Validate a descriptor's digest and size, returning the size unsigned
fn check_descriptor(field: &str, digest: &str, size: i64) -> Result<u64> {
    if !Digest::is_digest_shaped(digest) {
        return Err(ImportError::ManifestParse(format!(
            "{} has an invalid digest: {:?}",
            field, digest
        )));
    }
    u64::try_from(size).map_err(|_| {
        ImportError::ManifestParse(format!("{} has a negative size: {}", field, size))
    })
}
