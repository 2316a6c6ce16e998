//! Image configuration blob unpacking

use crate::error::{ImportError, Result};
use crate::image::digest::{Digest, DigestRegistry};
use crate::image::model::{DockerConfig, HistoryEntry, RootFs};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Structured view of an image configuration blob.
///
/// An absent config unpacks to the zero value with `digest` unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMetadata {
    /// Digest of the raw blob
    pub digest: Option<Digest>,
    pub architecture: String,
    pub os: String,
    pub variant: String,
    pub created: Option<DateTime<Utc>>,
    pub author: String,
    pub comment: String,
    pub container: String,
    pub docker_version: String,
    pub config: Option<DockerConfig>,
    pub container_config: DockerConfig,
    pub history: Vec<HistoryEntry>,
    pub root_fs: Option<RootFs>,
}

impl ConfigMetadata {
    pub fn is_present(&self) -> bool {
        self.digest.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageConfigDocument {
    architecture: String,
    os: String,
    variant: String,
    created: Option<DateTime<Utc>>,
    author: String,
    comment: String,
    container: String,
    docker_version: String,
    config: Option<DockerConfig>,
    container_config: Option<DockerConfig>,
    history: Option<Vec<HistoryEntry>>,
    rootfs: Option<RootFs>,
}

/// Decode a raw config blob. The digest is computed with `algorithm`, which
/// should be the algorithm of the manifest's config descriptor.
pub fn unpack_config(
    raw: &str,
    algorithm: &str,
    digests: &DigestRegistry,
) -> Result<ConfigMetadata> {
    if raw.trim().is_empty() {
        return Ok(ConfigMetadata::default());
    }

    let document: ImageConfigDocument =
        serde_json::from_str(raw).map_err(|e| ImportError::ConfigParse(e.to_string()))?;
    let digest = digests.compute(algorithm, raw.as_bytes())?;

    tracing::debug!(
        digest = %digest,
        architecture = %document.architecture,
        os = %document.os,
        "Unpacked image config"
    );

    Ok(ConfigMetadata {
        digest: Some(digest),
        architecture: document.architecture,
        os: document.os,
        variant: document.variant,
        created: document.created,
        author: document.author,
        comment: document.comment,
        container: document.container,
        docker_version: document.docker_version,
        config: document.config,
        container_config: document.container_config.unwrap_or_default(),
        history: document.history.unwrap_or_default(),
        root_fs: document.rootfs,
    })
}
