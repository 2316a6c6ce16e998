//! Child manifest retrieval for manifest lists
//!
//! Resolving a manifest list needs one platform manifest and its config blob
//! from somewhere outside this crate. [`ManifestFetcher`] is that seam;
//! [`RegistryFetcher`] implements it over the Docker Registry HTTP API v2.

use crate::error::{ImportError, Result};
use crate::image::manifest::media_types;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use url::Url;

/// A manifest as returned by a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedManifest {
    pub media_type: String,
    pub content: String,
}

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the manifest stored under `digest`
    async fn fetch_manifest(&self, digest: &str) -> Result<FetchedManifest>;

    /// Fetch a blob (used for config blobs) stored under `digest`
    async fn fetch_blob(&self, digest: &str) -> Result<Vec<u8>>;
}

pub struct RegistryFetcherBuilder {
    address: String,
    repository: String,
    token: Option<String>,
    skip_tls: bool,
}

impl RegistryFetcherBuilder {
    pub fn new(address: String, repository: String) -> Self {
        Self {
            address,
            repository,
            token: None,
            skip_tls: false,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn build(self) -> Result<RegistryFetcher> {
        if self.repository.is_empty() {
            return Err(ImportError::Configuration(
                "Repository cannot be empty".to_string(),
            ));
        }
        let base = Url::parse(&self.address)?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ImportError::Configuration(format!(
                "Invalid registry address: {}. Must start with http:// or https://",
                self.address
            )));
        }

        let client = if self.skip_tls {
            Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?
        } else {
            Client::new()
        };

        Ok(RegistryFetcher {
            client,
            base,
            repository: self.repository,
            token: self.token,
        })
    }
}

/// Fetches manifests and blobs from one repository of a v2 registry
pub struct RegistryFetcher {
    client: Client,
    base: Url,
    repository: String,
    token: Option<String>,
}

impl RegistryFetcher {
    fn endpoint(&self, kind: &str, digest: &str) -> Result<Url> {
        let path = format!("v2/{}/{}/{}", self.repository, kind, digest);
        Ok(self.base.join(&path)?)
    }

    async fn get(&self, url: Url, accept: &str) -> Result<reqwest::Response> {
        tracing::debug!(url = %url, "Fetching from registry");

        let mut request = self.client.get(url.clone()).header(ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(ImportError::Fetch(format!("{} not found", url))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ImportError::Fetch(format!(
                "Access to {} denied ({})",
                url,
                response.status()
            ))),
            status => Err(ImportError::Fetch(format!(
                "Fetching {} failed (status {})",
                url, status
            ))),
        }
    }
}

#[async_trait]
impl ManifestFetcher for RegistryFetcher {
    async fn fetch_manifest(&self, digest: &str) -> Result<FetchedManifest> {
        let accept = [
            media_types::DOCKER_SCHEMA2,
            media_types::OCI_MANIFEST,
            media_types::DOCKER_MANIFEST_LIST,
            media_types::OCI_INDEX,
        ]
        .join(", ");

        let response = self.get(self.endpoint("manifests", digest)?, &accept).await?;
        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_default();
        let content = response.text().await?;

        Ok(FetchedManifest {
            media_type,
            content,
        })
    }

    async fn fetch_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let response = self
            .get(self.endpoint("blobs", digest)?, "application/octet-stream")
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}
