//! Legacy schema 1 manifests
//!
//! Schema 1 embeds one `v1Compatibility` JSON document per history entry,
//! newest first. Layer order is reconstructed from the id/parent chain of
//! those documents; `fsLayers[i]` supplies the blob for `history[i]`.

use crate::error::{ImportError, Result};
use crate::image::digest::{Digest, EMPTY_TAR_BLOB_DIGEST};
use crate::image::manifest::media_types::DOCKER_LAYER;
use crate::image::model::{DockerConfig, DockerImageMetadata, HistoryEntry, ImageLayer};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Layers and embedded metadata recovered from a schema 1 manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Schema1Image {
    /// Ordered oldest ancestor first
    pub layers: Vec<ImageLayer>,
    pub metadata: DockerImageMetadata,
}

#[derive(Deserialize)]
struct Schema1Document {
    #[serde(rename = "fsLayers")]
    fs_layers: Vec<FsLayer>,
    history: Vec<HistoryItem>,
    #[serde(default)]
    architecture: String,
}

#[derive(Deserialize)]
struct FsLayer {
    #[serde(rename = "blobSum")]
    blob_sum: String,
}

#[derive(Deserialize)]
struct HistoryItem {
    #[serde(rename = "v1Compatibility")]
    v1_compatibility: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct V1Compatibility {
    id: String,
    parent: String,
    created: Option<DateTime<Utc>>,
    author: String,
    comment: String,
    container: String,
    docker_version: String,
    architecture: String,
    os: String,
    config: Option<DockerConfig>,
    container_config: Option<DockerConfig>,
    throwaway: bool,
    #[serde(alias = "Size")]
    size: Option<i64>,
}

impl V1Compatibility {
    fn created_by(&self) -> String {
        self.container_config
            .as_ref()
            .and_then(|c| c.cmd.as_ref())
            .map(|cmd| cmd.join(" "))
            .unwrap_or_default()
    }
}

fn invalid(message: String) -> ImportError {
    ImportError::ManifestParse(message)
}

pub fn parse(raw: &[u8]) -> Result<Schema1Image> {
    let document: Schema1Document =
        serde_json::from_slice(raw).map_err(|e| invalid(e.to_string()))?;

    if document.history.is_empty() {
        return Err(invalid("Schema 1 manifest has no history".to_string()));
    }
    if document.history.len() != document.fs_layers.len() {
        return Err(invalid(format!(
            "Schema 1 manifest has {} history entries but {} fsLayers",
            document.history.len(),
            document.fs_layers.len()
        )));
    }

    let entries = document
        .history
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let entry: V1Compatibility = serde_json::from_str(&item.v1_compatibility)
                .map_err(|e| invalid(format!("history[{}].v1Compatibility: {}", index, e)))?;
            if entry.id.is_empty() {
                return Err(invalid(format!("history[{}] has no id", index)));
            }
            Ok(entry)
        })
        .collect::<Result<Vec<_>>>()?;

    check_chain(&entries)?;

    let mut layers = Vec::new();
    let mut history = Vec::with_capacity(entries.len());
    // Entries are newest first; walk from the root ancestor up
    for (index, entry) in entries.iter().enumerate().rev() {
        let blob = &document.fs_layers[index].blob_sum;
        if !Digest::is_digest_shaped(blob) {
            return Err(invalid(format!("fsLayers[{}] has an invalid blobSum", index)));
        }
        let size = match entry.size {
            Some(size) => u64::try_from(size).map_err(|_| {
                invalid(format!("history[{}] has a negative size: {}", index, size))
            })?,
            None => 0,
        };

        let empty = entry.throwaway || blob == EMPTY_TAR_BLOB_DIGEST;
        history.push(HistoryEntry {
            created: entry.created,
            created_by: entry.created_by(),
            author: entry.author.clone(),
            comment: entry.comment.clone(),
            empty_layer: empty,
        });
        if empty {
            continue;
        }
        layers.push(ImageLayer {
            name: blob.clone(),
            size,
            media_type: DOCKER_LAYER.to_string(),
        });
    }

    let top = &entries[0];
    let architecture = if top.architecture.is_empty() {
        document.architecture
    } else {
        top.architecture.clone()
    };
    let metadata = DockerImageMetadata {
        id: top.id.clone(),
        parent: top.parent.clone(),
        comment: top.comment.clone(),
        created: top.created,
        container: top.container.clone(),
        container_config: top.container_config.clone().unwrap_or_default(),
        docker_version: top.docker_version.clone(),
        author: top.author.clone(),
        config: top.config.clone(),
        architecture,
        os: top.os.clone(),
        size: layers.iter().map(|l| l.size).sum(),
        history,
        ..Default::default()
    };

    Ok(Schema1Image { layers, metadata })
}

/// Each entry's parent must be the id of the entry after it, ending at a root.
fn check_chain(entries: &[V1Compatibility]) -> Result<()> {
    for (index, pair) in entries.windows(2).enumerate() {
        if pair[0].parent != pair[1].id {
            return Err(invalid(format!(
                "history[{}] parent {:?} does not match history[{}] id {:?}",
                index,
                pair[0].parent,
                index + 1,
                pair[1].id
            )));
        }
    }
    match entries.last() {
        Some(root) if !root.parent.is_empty() => Err(invalid(format!(
            "Oldest history entry {} still names parent {}",
            root.id, root.parent
        ))),
        _ => Ok(()),
    }
}
