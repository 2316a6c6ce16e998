//! In-memory image store
//!
//! A small keyed store that runs every write through [`ImageStrategy`] and
//! [`validate_image`], the same order a real object store would. Used by the
//! CLI and by tests that need create/update round trips.

use crate::error::{ImportError, Result};
use crate::image::model::Image;
use crate::registry::merge::Provenance;
use crate::registry::strategy::ImageStrategy;
use crate::registry::validation::validate_image;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub struct MemoryImageStore {
    strategy: ImageStrategy,
    images: RwLock<HashMap<String, Image>>,
    generated: AtomicU64,
}

impl MemoryImageStore {
    pub fn new(strategy: ImageStrategy) -> Self {
        Self {
            strategy,
            images: RwLock::new(HashMap::new()),
            generated: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Image> {
        self.images
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ImportError::NotFound(name.to_string()))
    }

    pub async fn list(&self) -> Vec<Image> {
        let mut images: Vec<Image> = self.images.read().await.values().cloned().collect();
        images.sort_by(|a, b| a.name().cmp(b.name()));
        images
    }

    pub async fn create(&self, candidate: Image) -> Result<(Image, Provenance)> {
        let outcome = self.strategy.prepare(None, candidate).await?;
        let mut image = outcome.image;
        validate_image(&image, true)?;

        if image.name().is_empty() {
            let n = self
                .generated
                .fetch_add(1, Ordering::Relaxed);
            image.metadata.name = format!("{}{:05}", image.metadata.generate_name, n);
        }

        let mut images = self.images.write().await;
        if images.contains_key(image.name()) {
            return Err(ImportError::AlreadyExists(image.name().to_string()));
        }
        image.metadata.resource_version = "1".to_string();
        images.insert(image.name().to_string(), image.clone());

        tracing::info!(name = image.name(), derived = ?outcome.derived, "Created image");
        Ok((image, outcome.derived))
    }

    /// Insert a record as it was already persisted elsewhere, without running
    /// it through the strategy. A missing `resourceVersion` becomes "1".
    pub async fn seed(&self, mut image: Image) -> Result<Image> {
        if image.metadata.resource_version.is_empty() {
            image.metadata.resource_version = "1".to_string();
        }
        let mut images = self.images.write().await;
        if images.contains_key(image.name()) {
            return Err(ImportError::AlreadyExists(image.name().to_string()));
        }
        images.insert(image.name().to_string(), image.clone());
        Ok(image)
    }

    /// Replace the stored record. An empty `resourceVersion` on the candidate
    /// skips the caller's version check; the swap itself is still guarded
    /// against writes that land while the merge runs.
    pub async fn update(&self, candidate: Image) -> Result<(Image, Provenance)> {
        let existing = self.get(candidate.name()).await?;

        let expected = &candidate.metadata.resource_version;
        if !expected.is_empty() && *expected != existing.metadata.resource_version {
            return Err(conflict(candidate.name(), expected, &existing.metadata.resource_version));
        }

        // No lock held here, resolving a list may wait on the network
        let outcome = self.strategy.prepare(Some(&existing), candidate).await?;
        let mut image = outcome.image;
        validate_image(&image, false)?;

        let mut images = self.images.write().await;
        let stored = images
            .get(image.name())
            .ok_or_else(|| ImportError::NotFound(image.name().to_string()))?;
        if stored.metadata.resource_version != existing.metadata.resource_version {
            return Err(conflict(
                image.name(),
                &existing.metadata.resource_version,
                &stored.metadata.resource_version,
            ));
        }

        let version: u64 = existing.metadata.resource_version.parse().unwrap_or(0);
        image.metadata.resource_version = (version + 1).to_string();
        images.insert(image.name().to_string(), image.clone());

        tracing::info!(name = image.name(), derived = ?outcome.derived, "Updated image");
        Ok((image, outcome.derived))
    }

    pub async fn delete(&self, name: &str) -> Result<Image> {
        self.images
            .write()
            .await
            .remove(name)
            .ok_or_else(|| ImportError::NotFound(name.to_string()))
    }
}

fn conflict(name: &str, expected: &str, stored: &str) -> ImportError {
    ImportError::Conflict(format!(
        "{}: resourceVersion {} does not match stored {}",
        name, expected, stored
    ))
}
