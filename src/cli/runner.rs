//! Subcommand execution
//!
//! Reads JSON inputs from disk, runs them through the library and writes the
//! resulting record as pretty JSON to stdout. Logs go to stderr.

use crate::cli::args::{Args, Command};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::image::model::Image;
use crate::registry::fetcher::RegistryFetcherBuilder;
use crate::registry::memory::MemoryImageStore;
use crate::registry::merge::Provenance;
use crate::registry::strategy::ImageStrategy;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// What a subcommand prints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub image: Image,
    pub derived: Provenance,
}

pub struct Runner {
    args: Args,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    pub async fn run(&self) -> Result<()> {
        let output = self.execute().await?;
        let json = serde_json::to_string_pretty(&output)?;
        println!("{}", json);
        Ok(())
    }

    pub async fn execute(&self) -> Result<RunOutput> {
        let config = self.load_config()?;
        tracing::debug!(
            policy = ?config.manifest_list_policy,
            platform = %config.preferred_platform,
            "Loaded import settings"
        );

        match &self.args.command {
            Command::Inspect {
                manifest,
                config: config_path,
                media_type,
                name,
            } => {
                let manifest = read_text(manifest)?;
                let blob = match config_path {
                    Some(path) => read_text(path)?,
                    None => String::new(),
                };

                let mut candidate = Image::default();
                candidate.metadata.name = name.clone();
                candidate.docker_image_manifest = manifest;
                candidate.docker_image_manifest_media_type = media_type.clone();
                candidate.docker_image_config = blob;

                // No record validation: inspect only reports what would be derived
                let outcome = self
                    .strategy(config)?
                    .prepare_for_create(candidate)
                    .await?;
                Ok(RunOutput {
                    image: outcome.image,
                    derived: outcome.derived,
                })
            }
            Command::Create { image } => {
                let candidate: Image = read_json(image)?;
                let store = MemoryImageStore::new(self.strategy(config)?);
                let (image, derived) = store.create(candidate).await?;
                Ok(RunOutput {
                    image,
                    derived,
                })
            }
            Command::Update { existing, image } => {
                let existing: Image = read_json(existing)?;
                let candidate: Image = read_json(image)?;

                let store = MemoryImageStore::new(self.strategy(config)?);
                store.seed(existing).await?;
                let (image, derived) = store.update(candidate).await?;
                Ok(RunOutput { image, derived })
            }
        }
    }

    fn load_config(&self) -> Result<ImportConfig> {
        match &self.args.settings {
            Some(path) => ImportConfig::from_file(path),
            None => ImportConfig::from_env(),
        }
    }

    fn strategy(&self, config: ImportConfig) -> Result<ImageStrategy> {
        let strategy = ImageStrategy::new(config);
        match (&self.args.registry, &self.args.repository) {
            (Some(registry), Some(repository)) => {
                let fetcher = RegistryFetcherBuilder::new(registry.clone(), repository.clone())
                    .with_token(self.args.token.clone())
                    .with_skip_tls(self.args.skip_tls)
                    .build()?;
                tracing::info!(registry = %registry, repository = %repository, "Manifest lists resolve against registry");
                Ok(strategy.with_fetcher(Arc::new(fetcher)))
            }
            _ => Ok(strategy),
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ImportError::Configuration(format!("Cannot read {}: {}", path.display(), e))
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| {
        ImportError::Configuration(format!("Invalid JSON in {}: {}", path.display(), e))
    })
}
