//! Create/Update preparation for image records
//!
//! [`ImageStrategy`] is what the surrounding object store calls before it
//! persists an image. It receives the stored record (if any) and the incoming
//! candidate and returns the record to persist, or an error that rejects the
//! request. It never calls back into the store.

use crate::config::{ImportConfig, ManifestListPolicy};
use crate::error::{ImportError, Result};
use crate::image::digest::{Digest, DigestRegistry};
use crate::image::import::{Derived, ImageImporter};
use crate::image::model::{Image, ImageManifest};
use crate::registry::fetcher::ManifestFetcher;
use crate::registry::merge::{self, Provenance, UpdatePlan};
use std::sync::Arc;

/// Record to persist plus where its derived fields came from
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub image: Image,
    pub derived: Provenance,
}

#[derive(Clone, Default)]
pub struct ImageStrategy {
    config: ImportConfig,
    digests: DigestRegistry,
    fetcher: Option<Arc<dyn ManifestFetcher>>,
}

impl ImageStrategy {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            digests: DigestRegistry::default(),
            fetcher: None,
        }
    }

    pub fn with_digests(mut self, digests: DigestRegistry) -> Self {
        self.digests = digests;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Boundary entry point: create when nothing is stored, update otherwise
    pub async fn prepare(&self, existing: Option<&Image>, candidate: Image) -> Result<MergeOutcome> {
        match existing {
            Some(existing) => self.prepare_for_update(existing, candidate).await,
            None => self.prepare_for_create(candidate).await,
        }
    }

    pub async fn prepare_for_create(&self, candidate: Image) -> Result<MergeOutcome> {
        if !candidate.has_manifest() {
            tracing::debug!(name = candidate.name(), "Creating image without a manifest");
            return Ok(MergeOutcome {
                image: candidate,
                derived: Provenance::Absent,
            });
        }

        let image = self.derive_into(candidate).await?;
        tracing::info!(
            name = image.name(),
            layers = image.docker_image_layers.len(),
            size = image.docker_image_metadata.size,
            "Imported image manifest"
        );
        Ok(MergeOutcome {
            image,
            derived: Provenance::Replaced,
        })
    }

    pub async fn prepare_for_update(
        &self,
        existing: &Image,
        candidate: Image,
    ) -> Result<MergeOutcome> {
        match merge::plan_update(existing, &candidate)? {
            UpdatePlan::KeepExisting => {
                tracing::debug!(name = existing.name(), "Keeping stored manifest and metadata");
                Ok(MergeOutcome {
                    image: merge::keep_existing(existing, candidate),
                    derived: if existing.has_manifest() {
                        Provenance::Kept
                    } else {
                        Provenance::Absent
                    },
                })
            }
            UpdatePlan::Rederive => {
                let image = self.derive_into(candidate).await?;
                tracing::info!(
                    name = image.name(),
                    layers = image.docker_image_layers.len(),
                    size = image.docker_image_metadata.size,
                    "Replaced image manifest"
                );
                Ok(MergeOutcome {
                    image,
                    derived: Provenance::Replaced,
                })
            }
        }
    }

    async fn derive_into(&self, candidate: Image) -> Result<Image> {
        let importer = ImageImporter::new(&self.config, &self.digests);
        let mut derived = importer.import(
            candidate.name(),
            &candidate.docker_image_manifest,
            &candidate.docker_image_manifest_media_type,
            &candidate.docker_image_config,
        )?;

        if derived.is_list() {
            derived = self.handle_list(derived).await?;
        }
        Ok(merge::apply_derived(candidate, derived.image))
    }

    async fn handle_list(&self, list: Derived) -> Result<Derived> {
        let reject = |digest: &str, reason: &str| ImportError::UnresolvedManifestList {
            digest: digest.to_string(),
            reason: reason.to_string(),
        };

        match self.config.manifest_list_policy {
            ManifestListPolicy::Accept => {
                tracing::debug!(
                    manifests = list.image.manifests.len(),
                    "Storing manifest list without resolving a child"
                );
                Ok(list)
            }
            ManifestListPolicy::Reject => {
                Err(reject("", "manifest lists are not accepted as image manifests"))
            }
            ManifestListPolicy::Resolve => {
                let child = self
                    .select_child(&list.image.manifests)
                    .ok_or_else(|| reject("", "manifest list has no entries"))?
                    .clone();
                let fetcher = self
                    .fetcher
                    .as_ref()
                    .ok_or_else(|| reject(&child.digest, "no manifest fetcher configured"))?;

                let resolved = tokio::time::timeout(
                    self.config.fetch_timeout(),
                    self.resolve_child(fetcher.as_ref(), &child),
                )
                .await
                .map_err(|_| reject(&child.digest, "fetch timed out"))?
                .map_err(|err| match err {
                    ImportError::Fetch(reason) => reject(&child.digest, &reason),
                    other => other,
                })?;

                let mut image = resolved.image;
                image.manifests = list.image.manifests;
                Ok(Derived {
                    manifest: list.manifest,
                    image,
                })
            }
        }
    }

    /// Entry for the preferred platform, else the first entry
    fn select_child<'m>(&self, manifests: &'m [ImageManifest]) -> Option<&'m ImageManifest> {
        let preferred = &self.config.preferred_platform;
        manifests
            .iter()
            .find(|m| preferred.matches(&m.os, &m.architecture, &m.variant))
            .or_else(|| manifests.first())
    }

    async fn resolve_child(
        &self,
        fetcher: &dyn ManifestFetcher,
        child: &ImageManifest,
    ) -> Result<Derived> {
        tracing::info!(
            digest = %child.digest,
            platform = %format!("{}/{}", child.os, child.architecture),
            "Resolving manifest list entry"
        );

        let expected: Digest = child
            .digest
            .parse()
            .map_err(|_| ImportError::ManifestParse(format!("Invalid child digest {}", child.digest)))?;
        let fetched = fetcher.fetch_manifest(&child.digest).await?;
        self.digests.verify(&expected, fetched.content.as_bytes())?;

        let importer = ImageImporter::new(&self.config, &self.digests);
        let media_type = if fetched.media_type.is_empty() {
            child.media_type.as_str()
        } else {
            fetched.media_type.as_str()
        };
        // Parse once without config to learn the config digest
        let bare = importer.derive(&fetched.content, media_type, "")?;
        if bare.is_list() {
            return Err(ImportError::ManifestParse(format!(
                "Manifest list entry {} is itself a list",
                child.digest
            )));
        }

        let config = match bare.manifest.config_descriptor() {
            Some(descriptor) => {
                let blob = fetcher.fetch_blob(&descriptor.digest).await?;
                String::from_utf8(blob).map_err(|e| {
                    ImportError::ConfigParse(format!("Config blob is not UTF-8: {}", e))
                })?
            }
            None => return Ok(bare),
        };
        importer.derive(&fetched.content, media_type, &config)
    }
}
