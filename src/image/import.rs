//! Derivation of an image record's content-addressed fields
//!
//! [`ImageImporter`] runs the digest check, manifest parser, config unpacker
//! and synthesizer over a raw manifest/config pair. It is pure: nothing here
//! touches shared state or performs I/O.

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::image::config::{ConfigMetadata, unpack_config};
use crate::image::digest::{Digest, DigestRegistry};
use crate::image::manifest::{ParsedManifest, parse_manifest};
use crate::image::metadata::{SynthesizedImage, synthesize};

/// Everything derived from one manifest/config pair
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub manifest: ParsedManifest,
    pub image: SynthesizedImage,
}

impl Derived {
    pub fn is_list(&self) -> bool {
        matches!(self.manifest, ParsedManifest::List { .. })
    }
}

pub struct ImageImporter<'a> {
    config: &'a ImportConfig,
    digests: &'a DigestRegistry,
}

impl<'a> ImageImporter<'a> {
    pub fn new(config: &'a ImportConfig, digests: &'a DigestRegistry) -> Self {
        Self { config, digests }
    }

    /// Verify `manifest` against a digest-shaped `name`, then derive layers and
    /// metadata from it and the optional `config` blob.
    pub fn import(
        &self,
        name: &str,
        manifest: &str,
        media_type: &str,
        config: &str,
    ) -> Result<Derived> {
        self.digests.verify_manifest(name, manifest.as_bytes())?;
        self.derive(manifest, media_type, config)
    }

    /// Derive without binding the manifest to an image name. Used for child
    /// manifests, whose digest is checked against the list descriptor instead.
    pub fn derive(&self, manifest: &str, media_type: &str, config: &str) -> Result<Derived> {
        self.check_size(manifest.len())?;
        let parsed = parse_manifest(manifest.as_bytes(), media_type)?;
        let unpacked = self.unpack(&parsed, config)?;
        let image = synthesize(&parsed, &unpacked);

        tracing::debug!(
            schema_version = parsed.schema_version(),
            layers = image.layers.len(),
            size = image.size(),
            "Derived image metadata from manifest"
        );

        Ok(Derived {
            manifest: parsed,
            image,
        })
    }

    fn unpack(&self, parsed: &ParsedManifest, config: &str) -> Result<ConfigMetadata> {
        let descriptor = match parsed.config_descriptor() {
            Some(descriptor) => descriptor,
            None => return unpack_config(config, "sha256", self.digests),
        };

        // Parsed manifests only carry digest-shaped descriptors
        let expected: Digest = descriptor
            .digest
            .parse()
            .map_err(|_| ImportError::ManifestParse(format!("Invalid config digest {}", descriptor.digest)))?;
        let unpacked = unpack_config(config, expected.algorithm(), self.digests)?;

        if self.config.verify_config_digest {
            if let Some(actual) = &unpacked.digest {
                if actual.hex() != expected.hex() {
                    return Err(ImportError::DigestMismatch {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
            }
        }
        Ok(unpacked)
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.config.max_manifest_bytes {
            return Err(ImportError::ManifestParse(format!(
                "Manifest is {} bytes, larger than the {} byte limit",
                len, self.config.max_manifest_bytes
            )));
        }
        Ok(())
    }
}
