//! Metadata synthesis
//!
//! Combines parsed manifest output with unpacked config output into the
//! derived fields of an image record. The manifest contributes layers, sizes
//! and child manifests; the config contributes everything else.

use crate::image::config::ConfigMetadata;
use crate::image::manifest::ParsedManifest;
use crate::image::model::{DockerImageMetadata, ImageLayer, ImageManifest};

/// Derived state ready to be written onto an image record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesizedImage {
    pub metadata: DockerImageMetadata,
    /// Ordered base to top
    pub layers: Vec<ImageLayer>,
    pub manifests: Vec<ImageManifest>,
}

impl SynthesizedImage {
    pub fn size(&self) -> u64 {
        self.metadata.size
    }
}

pub fn synthesize(manifest: &ParsedManifest, config: &ConfigMetadata) -> SynthesizedImage {
    match manifest {
        ParsedManifest::Schema1(image) => {
            if config.is_present() {
                tracing::debug!("Ignoring config blob supplied with a schema 1 manifest");
            }
            SynthesizedImage {
                metadata: image.metadata.clone(),
                layers: image.layers.clone(),
                manifests: Vec::new(),
            }
        }
        ParsedManifest::Image { layers, .. } => {
            let mut metadata = metadata_from_config(config);
            metadata.size = manifest.total_size();
            SynthesizedImage {
                metadata,
                layers: layers.clone(),
                manifests: Vec::new(),
            }
        }
        ParsedManifest::List { manifests, .. } => SynthesizedImage {
            metadata: DockerImageMetadata::default(),
            layers: Vec::new(),
            manifests: manifests.clone(),
        },
    }
}

fn metadata_from_config(config: &ConfigMetadata) -> DockerImageMetadata {
    DockerImageMetadata {
        id: config
            .digest
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        comment: config.comment.clone(),
        created: config.created,
        container: config.container.clone(),
        container_config: config.container_config.clone(),
        docker_version: config.docker_version.clone(),
        author: config.author.clone(),
        config: config.config.clone(),
        architecture: config.architecture.clone(),
        os: config.os.clone(),
        variant: config.variant.clone(),
        history: config.history.clone(),
        root_fs: config.root_fs.clone(),
        ..Default::default()
    }
}
