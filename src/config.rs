//! Import settings, loaded from defaults, the environment or a JSON file

use crate::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// What to do when a manifest list or index is supplied as an image manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestListPolicy {
    /// Store the list; child descriptors are recorded, layers stay empty
    #[default]
    Accept,
    /// Fetch the child manifest for the preferred platform and derive from it
    Resolve,
    /// Refuse lists outright
    Reject,
}

impl FromStr for ManifestListPolicy {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "accept" => Ok(ManifestListPolicy::Accept),
            "resolve" => Ok(ManifestListPolicy::Resolve),
            "reject" => Ok(ManifestListPolicy::Reject),
            other => Err(ImportError::Configuration(format!(
                "Unknown manifest list policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            os: "linux".to_string(),
            architecture: "amd64".to_string(),
            variant: None,
        }
    }
}

impl Platform {
    pub fn matches(&self, os: &str, architecture: &str, variant: &str) -> bool {
        self.os == os
            && self.architecture == architecture
            && self.variant.as_deref().is_none_or(|v| v == variant)
    }
}

impl FromStr for Platform {
    type Err = ImportError;

    /// Parses `os/arch[/variant]`
    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Platform {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() && !variant.is_empty() => {
                Ok(Platform {
                    os: os.to_string(),
                    architecture: arch.to_string(),
                    variant: Some(variant.to_string()),
                })
            }
            _ => Err(ImportError::Configuration(format!(
                "Invalid platform {:?}, expected os/arch[/variant]",
                value
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub manifest_list_policy: ManifestListPolicy,
    pub preferred_platform: Platform,
    pub fetch_timeout_secs: u64,
    /// Require a supplied config blob to hash to the manifest's config digest.
    /// Off by default: the image ID is the blob's own digest either way.
    pub verify_config_digest: bool,
    pub max_manifest_bytes: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            manifest_list_policy: ManifestListPolicy::Accept,
            preferred_platform: Platform::default(),
            fetch_timeout_secs: 30,
            verify_config_digest: false,
            max_manifest_bytes: 4 * 1024 * 1024,
        }
    }
}

impl ImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest_list_policy(mut self, policy: ManifestListPolicy) -> Self {
        self.manifest_list_policy = policy;
        self
    }

    pub fn with_preferred_platform(mut self, platform: Platform) -> Self {
        self.preferred_platform = platform;
        self
    }

    pub fn with_fetch_timeout(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_verify_config_digest(mut self, verify: bool) -> Self {
        self.verify_config_digest = verify;
        self
    }

    pub fn with_max_manifest_bytes(mut self, max: usize) -> Self {
        self.max_manifest_bytes = max;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Defaults overlaid with `IMAGE_IMPORT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(policy) = env::var("IMAGE_IMPORT_LIST_POLICY") {
            config.manifest_list_policy = policy.parse()?;
        }
        if let Ok(platform) = env::var("IMAGE_IMPORT_PLATFORM") {
            config.preferred_platform = platform.parse()?;
        }
        if let Ok(timeout) = env::var("IMAGE_IMPORT_FETCH_TIMEOUT") {
            config.fetch_timeout_secs = timeout.parse().map_err(|_| {
                ImportError::Configuration(format!("Invalid IMAGE_IMPORT_FETCH_TIMEOUT: {}", timeout))
            })?;
        }
        if let Ok(verify) = env::var("IMAGE_IMPORT_VERIFY_CONFIG_DIGEST") {
            config.verify_config_digest = verify != "false" && verify != "0";
        }
        if let Ok(max) = env::var("IMAGE_IMPORT_MAX_MANIFEST_BYTES") {
            config.max_manifest_bytes = max.parse().map_err(|_| {
                ImportError::Configuration(format!("Invalid IMAGE_IMPORT_MAX_MANIFEST_BYTES: {}", max))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: ImportConfig = serde_json::from_str(&data).map_err(|e| {
            ImportError::Configuration(format!("Invalid settings file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(ImportError::Configuration(
                "Fetch timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_manifest_bytes == 0 {
            return Err(ImportError::Configuration(
                "Maximum manifest size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
