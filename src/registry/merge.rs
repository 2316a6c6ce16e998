//! Update merge policy
//!
//! Pure decision and assembly functions over two immutable snapshots: the
//! stored image and the incoming candidate. Mutable reference metadata always
//! follows the candidate; content-addressed fields either stay exactly as
//! stored or are replaced in full by freshly derived values.

use crate::error::{ImportError, Result};
use crate::image::metadata::SynthesizedImage;
use crate::image::model::Image;
use serde::Serialize;

/// Where the derived fields of a merged record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// No manifest; derived fields are whatever the caller supplied on create
    Absent,
    /// Carried over unchanged from the stored record
    Kept,
    /// Recomputed from the candidate's manifest
    Replaced,
}

/// What an update has to do with the candidate's manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Candidate manifest is empty or identical; stored derived state stands
    KeepExisting,
    /// Candidate carries a new manifest that must be verified and derived
    Rederive,
}

pub fn plan_update(existing: &Image, candidate: &Image) -> Result<UpdatePlan> {
    if existing.name() != candidate.name() {
        return Err(ImportError::Validation(format!(
            "Image name cannot change on update: {} -> {}",
            existing.name(),
            candidate.name()
        )));
    }

    if !candidate.has_manifest()
        || candidate.docker_image_manifest == existing.docker_image_manifest
    {
        Ok(UpdatePlan::KeepExisting)
    } else {
        Ok(UpdatePlan::Rederive)
    }
}

/// Candidate's mutable fields over the stored manifest, config and every
/// derived field. Caller-supplied metadata on the candidate is discarded.
pub fn keep_existing(existing: &Image, candidate: Image) -> Image {
    Image {
        metadata: candidate.metadata,
        docker_image_reference: candidate.docker_image_reference,
        docker_image_metadata: existing.docker_image_metadata.clone(),
        docker_image_manifest_media_type: existing.docker_image_manifest_media_type.clone(),
        docker_image_manifest: existing.docker_image_manifest.clone(),
        docker_image_config: existing.docker_image_config.clone(),
        docker_image_layers: existing.docker_image_layers.clone(),
        docker_image_manifests: existing.docker_image_manifests.clone(),
    }
}

/// Candidate record with its derived fields replaced wholesale by `derived`.
pub fn apply_derived(mut candidate: Image, derived: SynthesizedImage) -> Image {
    candidate.docker_image_metadata = derived.metadata;
    candidate.docker_image_layers = derived.layers;
    candidate.docker_image_manifests = derived.manifests;
    candidate
}
